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

//! The training loop.

use crate::{
    ConfigError, Environment, Float, Hyperparameters, QLearningAgent, Rng, TrainingConfig,
};

/// One (state, action, reward, next_state) step. Only lives for the duration of the step.
#[derive(Debug, Clone, Copy)]
pub struct Transition<'a, _State, _Action> {
    /// State the action was chosen in.
    pub state: &'a _State,
    /// Chosen action.
    pub action: _Action,
    /// Reward the environment gave for it.
    pub reward: Float,
    /// Independently sampled next state.
    pub next_state: &'a _State,
}

/// Progress snapshot taken at a checkpoint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Checkpoint {
    /// Steps completed so far.
    pub step: usize,
    /// Steps completed as a percentage of the run.
    pub percent: Float,
    /// Reward of the most recent step.
    pub last_reward: Float,
}

/// Summary of a training run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingReport {
    /// Number of steps performed.
    pub steps: usize,
    /// Q-table updates performed during the run.
    pub updates: u64,
    /// Sum of all rewards received.
    pub cumulative_reward: Float,
    /// Progress snapshots, in order.
    pub checkpoints: Vec<Checkpoint>,
}

impl TrainingReport {
    /// Average reward per step, 0.0 for an empty run.
    pub fn mean_reward(&self) -> Float {
        if self.steps == 0 {
            0.0
        } else {
            self.cumulative_reward / self.steps as Float
        }
    }
}

/// A Trainer runs a single agent against an environment for a fixed number of steps.
///
/// Each step samples a state, lets the agent choose, scores the choice, samples an independent
/// next state and lets the agent learn from the transition. Nothing is carried over between
/// steps except what the agent learned.
pub struct Trainer<_Environment: Environment> {
    environment: _Environment,
    agent: QLearningAgent<_Environment::State, _Environment::Action>,
    steps: usize,
    checkpoints: usize,
}

impl<_Environment: Environment> Trainer<_Environment> {
    /// Build a fresh agent from `config` using the environment's action set. Fails on a bad
    /// configuration, before any step runs.
    pub fn new(environment: _Environment, config: &TrainingConfig) -> Result<Self, ConfigError> {
        let steps = config.step_limit.resolve(environment.dataset_size())?;
        let agent = QLearningAgent::new(environment.actions(), config.hyperparameters)?;
        Ok(Self::with_agent(
            environment,
            agent,
            steps,
            config.checkpoints,
        ))
    }

    /// Train an existing agent for `steps` more steps.
    pub fn with_agent(
        environment: _Environment,
        agent: QLearningAgent<_Environment::State, _Environment::Action>,
        steps: usize,
        checkpoints: usize,
    ) -> Self {
        Self {
            environment,
            agent,
            steps,
            checkpoints,
        }
    }

    /// Steps performed by each call to [Trainer::run].
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// The environment being trained against.
    pub fn environment(&self) -> &_Environment {
        &self.environment
    }

    /// The agent being trained.
    pub fn agent(&self) -> &QLearningAgent<_Environment::State, _Environment::Action> {
        &self.agent
    }

    /// Give up the trained agent.
    pub fn into_agent(self) -> QLearningAgent<_Environment::State, _Environment::Action> {
        self.agent
    }

    /// Run exactly [Trainer::steps] steps.
    pub fn run(&mut self, rng: &mut Rng) -> TrainingReport {
        self.run_with_observer(rng, |_| {})
    }

    /// Run exactly [Trainer::steps] steps, showing every transition to `observer` before the
    /// agent learns from it.
    pub fn run_with_observer<F>(&mut self, rng: &mut Rng, mut observer: F) -> TrainingReport
    where
        F: FnMut(&Transition<'_, _Environment::State, _Environment::Action>),
    {
        let interval = match self.checkpoints {
            0 => 0,
            checkpoints => self.steps / checkpoints,
        };
        tracing::info!(steps = self.steps, "training started");

        let updates_before = self.agent.table().update_count();
        let mut report = TrainingReport::default();
        for step in 1..=self.steps {
            let state = self.environment.sample_state(rng);
            let action = self.agent.choose_action(&state, rng);
            let reward = self.environment.reward(&state, &action);
            let next_state = self.environment.sample_state(rng);
            observer(&Transition {
                state: &state,
                action,
                reward,
                next_state: &next_state,
            });
            self.agent.learn(&state, action, reward, &next_state);

            report.steps += 1;
            report.cumulative_reward += reward;

            if interval > 0 && step % interval == 0 && step / interval <= self.checkpoints {
                let checkpoint = Checkpoint {
                    step,
                    percent: 100.0 * step as Float / self.steps as Float,
                    last_reward: reward,
                };
                tracing::info!(
                    step,
                    total = self.steps,
                    last_reward = reward,
                    "progress: {:.0}%",
                    checkpoint.percent
                );
                report.checkpoints.push(checkpoint);
            }
        }

        report.updates = self.agent.table().update_count() - updates_before;
        tracing::info!(
            steps = report.steps,
            mean_reward = report.mean_reward(),
            states = self.agent.table().len(),
            "training complete"
        );
        report
    }
}

/// Train a fresh agent on `environment` for `step_count` steps and return it.
pub fn run_training<_Environment: Environment>(
    environment: &_Environment,
    actions: Vec<_Environment::Action>,
    hyperparameters: Hyperparameters,
    step_count: usize,
    rng: &mut Rng,
) -> Result<QLearningAgent<_Environment::State, _Environment::Action>, ConfigError> {
    let agent = QLearningAgent::new(actions, hyperparameters)?;
    let mut trainer = Trainer::with_agent(environment, agent, step_count, 0);
    trainer.run(rng);
    Ok(trainer.into_agent())
}
