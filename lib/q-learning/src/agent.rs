/*
 * Copyright (C) 2023 Asim Ihsan
 * SPDX-License-Identifier: AGPL-3.0-only
 *
 * This program is free software: you can redistribute it and/or modify it under
 * the terms of the GNU Affero General Public License as published by the Free
 * Software Foundation, version 3.
 *
 * This program is distributed in the hope that it will be useful, but WITHOUT ANY
 * WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A
 * PARTICULAR PURPOSE. See the GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License along
 * with this program. If not, see <https://www.gnu.org/licenses/>
 */

//! Epsilon-greedy agent over a [crate::QTable].

use rand::Rng as _;

use crate::{Action, ConfigError, Float, Hyperparameters, QTable, Rng, State};

/// Result of asking a trained agent what it would do in a state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PolicyLookup<_Action: Action> {
    /// The state has been learned about; `action` has the highest Q-value.
    Known {
        /// Best known action.
        action: _Action,
        /// Q-value of that action, i.e. how confident the agent is.
        q_value: Float,
    },
    /// The state was never updated, so there is nothing to report.
    NoData,
}

/// A Q-learning agent: a [QTable] plus an epsilon-greedy policy over a fixed action set.
///
/// Notice that, like the Environment, the agent is not aware of the other side. It only sees
/// states, actions and rewards.
#[derive(Debug, Clone)]
pub struct QLearningAgent<_State: State, _Action: Action> {
    table: QTable<_State::Key, _Action>,
    actions: Vec<_Action>,
    hyperparameters: Hyperparameters,
}

impl<_State, _Action> QLearningAgent<_State, _Action>
where
    _State: State,
    _Action: Action,
{
    /// Create an agent with an empty table. Fails if `actions` is empty or a hyperparameter is out
    /// of range.
    pub fn new(actions: Vec<_Action>, hyperparameters: Hyperparameters) -> Result<Self, ConfigError> {
        if actions.is_empty() {
            return Err(ConfigError::EmptyActionSet);
        }
        hyperparameters.validate()?;
        tracing::debug!(
            actions = actions.len(),
            learning_rate = hyperparameters.learning_rate,
            discount_factor = hyperparameters.discount_factor,
            exploration_rate = hyperparameters.exploration_rate,
            "created q-learning agent"
        );
        Ok(Self {
            table: QTable::new(
                hyperparameters.learning_rate,
                hyperparameters.discount_factor,
            ),
            actions,
            hyperparameters,
        })
    }

    /// The fixed action set.
    pub fn actions(&self) -> &[_Action] {
        &self.actions
    }

    /// Hyperparameters the agent was built with.
    pub fn hyperparameters(&self) -> Hyperparameters {
        self.hyperparameters
    }

    /// Learned values.
    pub fn table(&self) -> &QTable<_State::Key, _Action> {
        &self.table
    }

    /// Epsilon-greedy choice. Explores (uniformly random action) with probability ε, and also
    /// whenever nothing has been learned about `state` yet; otherwise exploits the best known
    /// action.
    pub fn choose_action(&self, state: &_State, rng: &mut Rng) -> _Action {
        if rng.gen::<Float>() < self.hyperparameters.exploration_rate {
            return self.random_action(rng);
        }
        match self.table.best_action(&state.key()) {
            Some(action) => action,
            None => self.random_action(rng),
        }
    }

    fn random_action(&self, rng: &mut Rng) -> _Action {
        // actions is never empty, see new()
        self.actions[rng.gen_range(0..self.actions.len())]
    }

    /// Learn from one transition. Returns the updated Q-value of (state, action).
    pub fn learn(
        &mut self,
        state: &_State,
        action: _Action,
        reward: Float,
        next_state: &_State,
    ) -> Float {
        self.table
            .update(&state.key(), action, reward, &next_state.key())
    }

    /// Best known action for `state` and its Q-value, or NoData. Read only.
    pub fn best_action_for(&self, state: &_State) -> PolicyLookup<_Action> {
        self.lookup(&state.key())
    }

    /// Same as [QLearningAgent::best_action_for] but by key, for probing states that were
    /// never sampled.
    pub fn lookup(&self, key: &_State::Key) -> PolicyLookup<_Action> {
        match self.table.best_entry(key) {
            Some((action, q_value)) => PolicyLookup::Known { action, q_value },
            None => PolicyLookup::NoData,
        }
    }

    /// Greedy policy over every known state: (state, best action, Q-value).
    pub fn policy(&self) -> Vec<(_State::Key, _Action, Float)> {
        self.table
            .entries()
            .filter_map(|(key, values)| {
                values
                    .best()
                    .map(|(action, q_value)| (key.clone(), action, q_value))
            })
            .collect()
    }
}
