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

//! Hyperparameters and training run configuration.

use serde::{Deserialize, Serialize};

use crate::{ConfigError, Float};

/// Datasets with more records than this train for fewer epochs under [StepLimitKind::AutoEpochs].
pub const LARGE_DATASET_RECORDS: usize = 50_000;

/// Epochs used by [StepLimitKind::AutoEpochs] for datasets above [LARGE_DATASET_RECORDS].
pub const LARGE_DATASET_EPOCHS: usize = 2;

/// Epochs used by [StepLimitKind::AutoEpochs] otherwise.
pub const SMALL_DATASET_EPOCHS: usize = 30;

/// Q-learning hyperparameters. Fixed for the lifetime of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Hyperparameters {
    /// α, in (0, 1].
    pub learning_rate: Float,
    /// γ, in [0, 1].
    pub discount_factor: Float,
    /// ε, in [0, 1].
    pub exploration_rate: Float,
}

impl Hyperparameters {
    /// Bundle the three hyperparameters. Call [Hyperparameters::validate] before use.
    pub fn new(learning_rate: Float, discount_factor: Float, exploration_rate: Float) -> Self {
        Self {
            learning_rate,
            discount_factor,
            exploration_rate,
        }
    }

    /// Check that every value is finite and within its range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check("learning_rate", self.learning_rate, "(0, 1]", |v| {
            v > 0.0 && v <= 1.0
        })?;
        check("discount_factor", self.discount_factor, "[0, 1]", |v| {
            (0.0..=1.0).contains(&v)
        })?;
        check("exploration_rate", self.exploration_rate, "[0, 1]", |v| {
            (0.0..=1.0).contains(&v)
        })
    }
}

fn check(
    name: &'static str,
    value: Float,
    range: &'static str,
    in_range: impl Fn(Float) -> bool,
) -> Result<(), ConfigError> {
    if !value.is_finite() {
        return Err(ConfigError::NonFinite { name, value });
    }
    if !in_range(value) {
        return Err(ConfigError::OutOfRange { name, range, value });
    }
    Ok(())
}

impl Default for Hyperparameters {
    fn default() -> Self {
        Self::new(0.1, 0.9, 0.1)
    }
}

/// How many training steps to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepLimitKind {
    /// A fixed number of steps.
    Steps(usize),
    /// Dataset size times this many epochs.
    Epochs(usize),
    /// Epochs picked from the dataset size: [LARGE_DATASET_EPOCHS] for large datasets,
    /// [SMALL_DATASET_EPOCHS] otherwise.
    AutoEpochs,
}

impl StepLimitKind {
    /// Number of steps for an environment with `dataset_size` records (None if the environment is
    /// not backed by a dataset).
    pub fn resolve(&self, dataset_size: Option<usize>) -> Result<usize, ConfigError> {
        match (*self, dataset_size) {
            (StepLimitKind::Steps(steps), _) => Ok(steps),
            (StepLimitKind::Epochs(epochs), Some(records)) => epoch_steps(records, epochs),
            (StepLimitKind::AutoEpochs, Some(records)) => {
                let epochs = if records > LARGE_DATASET_RECORDS {
                    LARGE_DATASET_EPOCHS
                } else {
                    SMALL_DATASET_EPOCHS
                };
                epoch_steps(records, epochs)
            }
            (StepLimitKind::Epochs(_) | StepLimitKind::AutoEpochs, None) => {
                Err(ConfigError::EpochsWithoutDataset)
            }
        }
    }
}

fn epoch_steps(records: usize, epochs: usize) -> Result<usize, ConfigError> {
    records
        .checked_mul(epochs)
        .ok_or(ConfigError::StepLimitOverflow { records, epochs })
}

/// Everything needed to set up a training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Agent hyperparameters.
    pub hyperparameters: Hyperparameters,
    /// Number of training steps.
    pub step_limit: StepLimitKind,
    /// Number of progress reports spread evenly over the run. 0 disables progress reports.
    pub checkpoints: usize,
    /// Seed for the random number generator.
    pub seed: u64,
}

impl TrainingConfig {
    /// Parse a configuration from JSON. Missing fields take their default values.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            hyperparameters: Hyperparameters::default(),
            step_limit: StepLimitKind::Steps(20_000),
            checkpoints: 10,
            seed: 42,
        }
    }
}
