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

//! NPC dialogue scenarios for the `q-learning` crate.
//!
//! Two environments are provided. [plaza::PlazaWorld] is a small simulated town where an NPC
//! learns what to say to a player depending on where they meet and what the player did before.
//! [check_in::CheckInWorld] replays venue check-in records and teaches the NPC which offer suits
//! each kind of venue and time of day.

pub mod check_in;
pub mod plaza;

pub use check_in::{
    CategoryPopularity, CheckIn, CheckInError, CheckInWorld, NpcOffer, RulePreset, TimeOfDay,
    VenueKey,
};
pub use plaza::{DialogueIntent, Location, PlayerHistory, PlazaState, PlazaWorld};
