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

#![warn(missing_docs)]

//! Tabular Q-learning.
//!
//! An [Environment] hands out independent state samples and scores (state, action) pairs. A
//! [QLearningAgent] keeps a [QTable] of action values, picks actions epsilon-greedily and learns
//! from each transition with the temporal-difference rule. A [Trainer] drives the two for a fixed
//! number of steps.
//!
//! See:
//! - Chapter 22: Reinforcement Learning, section 22.3 Active Reinforcement Learning

use std::fmt::Debug;
use std::hash::Hash;

use serde::Serialize;

pub mod agent;
pub mod config;
pub mod error;
pub mod rules;
pub mod table;
pub mod trainer;

pub use agent::{PolicyLookup, QLearningAgent};
pub use config::{Hyperparameters, StepLimitKind, TrainingConfig};
pub use error::ConfigError;
pub use rules::{Rule, RuleBook};
pub use table::{ActionValues, QTable};
pub use trainer::{run_training, Checkpoint, Trainer, TrainingReport, Transition};

/// Scalar type used for rewards and Q-values.
pub type Float = f64;

/// Random number generator used for sampling and exploration. Seed it for reproducible runs.
pub type Rng = rand_pcg::Pcg64;

/// Hash map used for the Q-table.
pub type HashMap<K, V> = rustc_hash::FxHashMap<K, V>;

/// An Action is one member of the fixed set of choices an Environment offers.
pub trait Action: Clone + Copy + PartialEq + Eq + Hash + Debug + Serialize {}

/// Key under which a State's action values are stored. Two states with equal features must
/// produce equal keys, and distinct feature combinations must produce distinct keys.
pub trait StateKey: Clone + PartialEq + Eq + Hash + Debug + Serialize {}

impl<T> StateKey for T where T: Clone + PartialEq + Eq + Hash + Debug + Serialize {}

/// A State is a snapshot of the features the agent observes at decision time.
///
/// States are never mutated. The agent only ever looks at a State through its key, so features
/// that should not influence the decision (e.g. who checked in) can stay out of the key.
pub trait State: Clone + Debug {
    /// Structural key for this state.
    type Key: StateKey;

    /// Derive the key for this state.
    fn key(&self) -> Self::Key;
}

/// An Environment defines the world the agent learns about: what states look like, which actions
/// exist, and how well an action fits a state.
///
/// Notice that the Environment is not aware of the agent, and keeps no per-episode state. Every
/// call to `sample_state` is independent of the previous one.
pub trait Environment {
    /// States produced by this environment.
    type State: State;

    /// Actions available in this environment.
    type Action: Action;

    /// The fixed, non-empty set of actions. Must return the same actions, in the same order, for
    /// the lifetime of the environment.
    fn actions(&self) -> Vec<Self::Action>;

    /// Draw one state from the environment's distribution.
    fn sample_state(&self, rng: &mut Rng) -> Self::State;

    /// Reward for taking `action` in `state`. This is a pure function of its inputs and never
    /// fails: states the rules don't recognise get a fallback reward.
    fn reward(&self, state: &Self::State, action: &Self::Action) -> Float;

    /// Number of records backing the environment, if it samples from a dataset. Used to resolve
    /// epoch based step limits.
    fn dataset_size(&self) -> Option<usize> {
        None
    }
}

impl<_Environment> Environment for &_Environment
where
    _Environment: Environment,
{
    type State = _Environment::State;
    type Action = _Environment::Action;

    fn actions(&self) -> Vec<Self::Action> {
        (**self).actions()
    }

    fn sample_state(&self, rng: &mut Rng) -> Self::State {
        (**self).sample_state(rng)
    }

    fn reward(&self, state: &Self::State, action: &Self::Action) -> Float {
        (**self).reward(state, action)
    }

    fn dataset_size(&self) -> Option<usize> {
        (**self).dataset_size()
    }
}
