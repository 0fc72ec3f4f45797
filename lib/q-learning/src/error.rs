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

//! Errors raised while setting up training.

use crate::Float;

/// Configuration error. Raised when an agent or trainer is constructed, never mid-run.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// The action set is empty, so there is nothing to choose from.
    #[error("action set is empty")]
    EmptyActionSet,

    /// A hyperparameter is NaN or infinite.
    #[error("{name} must be finite, got {value}")]
    NonFinite {
        /// Name of the hyperparameter.
        name: &'static str,
        /// Offending value.
        value: Float,
    },

    /// A hyperparameter is outside its allowed range.
    #[error("{name} must be in {range}, got {value}")]
    OutOfRange {
        /// Name of the hyperparameter.
        name: &'static str,
        /// Allowed range, in interval notation.
        range: &'static str,
        /// Offending value.
        value: Float,
    },

    /// An epoch based step limit was used with an environment that does not sample from a
    /// dataset.
    #[error("epoch based step limit needs an environment backed by a dataset")]
    EpochsWithoutDataset,

    /// Records times epochs does not fit in a step count.
    #[error("{records} records times {epochs} epochs overflows the step count")]
    StepLimitOverflow {
        /// Dataset size.
        records: usize,
        /// Requested epochs.
        epochs: usize,
    },
}
