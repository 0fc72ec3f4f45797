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

//! A simulated town plaza. Every step the NPC meets a player at a random location with a random
//! history and picks one of three dialogue intents.

use std::fmt::Display;

use q_learning::{Action, Environment, Float, Rng, Rule, RuleBook, State};
use rand::Rng as _;
use serde::{Deserialize, Serialize};

/// Where the NPC meets the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Location {
    /// Busy central square.
    Plaza,

    /// Inside the museum.
    Museum,

    /// A street with nobody around.
    DesertedStreet,
}

impl Location {
    /// All locations.
    pub const ALL: [Location; 3] = [Location::Plaza, Location::Museum, Location::DesertedStreet];
}

impl Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Location::Plaza => write!(f, "plaza"),
            Location::Museum => write!(f, "museum"),
            Location::DesertedStreet => write!(f, "deserted street"),
        }
    }
}

/// What the NPC knows about the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PlayerHistory {
    /// First time the player shows up.
    Newcomer,

    /// The player already finished the first quest.
    CompletedFirstQuest,

    /// The player walked past the NPC last time.
    IgnoredNpcBefore,
}

impl PlayerHistory {
    /// All player histories.
    pub const ALL: [PlayerHistory; 3] = [
        PlayerHistory::Newcomer,
        PlayerHistory::CompletedFirstQuest,
        PlayerHistory::IgnoredNpcBefore,
    ];
}

impl Display for PlayerHistory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlayerHistory::Newcomer => write!(f, "newcomer"),
            PlayerHistory::CompletedFirstQuest => write!(f, "completed first quest"),
            PlayerHistory::IgnoredNpcBefore => write!(f, "ignored npc before"),
        }
    }
}

/// What the NPC opens the conversation with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DialogueIntent {
    /// Say hello.
    FriendlyGreeting,

    /// Hand out a quest.
    OfferQuest,

    /// Share something about the surroundings.
    LocalTip,
}

impl DialogueIntent {
    /// All intents, in the order the agent is given them.
    pub const ALL: [DialogueIntent; 3] = [
        DialogueIntent::FriendlyGreeting,
        DialogueIntent::OfferQuest,
        DialogueIntent::LocalTip,
    ];
}

impl Action for DialogueIntent {}

impl Display for DialogueIntent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DialogueIntent::FriendlyGreeting => write!(f, "friendly greeting"),
            DialogueIntent::OfferQuest => write!(f, "offer quest"),
            DialogueIntent::LocalTip => write!(f, "local tip"),
        }
    }
}

/// One encounter. The state is its own key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlazaState {
    /// Where the encounter happens.
    pub location: Location,

    /// The player's history with the NPC.
    pub history: PlayerHistory,
}

impl PlazaState {
    /// New encounter.
    pub fn new(location: Location, history: PlayerHistory) -> Self {
        Self { location, history }
    }
}

impl State for PlazaState {
    type Key = PlazaState;

    fn key(&self) -> Self::Key {
        *self
    }
}

impl Display for PlazaState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} / {}", self.location, self.history)
    }
}

/// The plaza environment. Encounters are drawn uniformly from every (location, history) pair.
pub struct PlazaWorld {
    rules: RuleBook<PlazaState, DialogueIntent>,
}

impl PlazaWorld {
    /// Plaza with the standard town rules.
    pub fn new() -> Self {
        Self {
            rules: town_rules(),
        }
    }

    /// The reward rules in use.
    pub fn rules(&self) -> &RuleBook<PlazaState, DialogueIntent> {
        &self.rules
    }
}

impl Default for PlazaWorld {
    fn default() -> Self {
        Self::new()
    }
}

fn town_rules() -> RuleBook<PlazaState, DialogueIntent> {
    use DialogueIntent::*;

    RuleBook::new(0.0)
        .rule(
            Rule::new("deserted street", |state: &PlazaState| {
                state.location == Location::DesertedStreet
            })
            .otherwise(-3.0),
        )
        .rule(
            Rule::new("newcomer in the plaza", |state: &PlazaState| {
                state.location == Location::Plaza && state.history == PlayerHistory::Newcomer
            })
            .effect(OfferQuest, 10.0)
            .effect(FriendlyGreeting, 3.0)
            .effect(LocalTip, 1.0),
        )
        .rule(
            Rule::new("plaza", |state: &PlazaState| state.location == Location::Plaza)
                .effect(OfferQuest, -5.0)
                .effect(FriendlyGreeting, 3.0)
                .effect(LocalTip, 1.0),
        )
        .rule(
            Rule::new("museum", |state: &PlazaState| state.location == Location::Museum)
                .effect(LocalTip, 7.0)
                .effect(OfferQuest, -2.0)
                .effect(FriendlyGreeting, 2.0),
        )
        .bonus(
            Rule::new("greeting a player who ignored us", |state: &PlazaState| {
                state.history == PlayerHistory::IgnoredNpcBefore
            })
            .effect(FriendlyGreeting, 1.0),
        )
}

impl Environment for PlazaWorld {
    type State = PlazaState;
    type Action = DialogueIntent;

    fn actions(&self) -> Vec<DialogueIntent> {
        DialogueIntent::ALL.to_vec()
    }

    fn sample_state(&self, rng: &mut Rng) -> PlazaState {
        let location = Location::ALL[rng.gen_range(0..Location::ALL.len())];
        let history = PlayerHistory::ALL[rng.gen_range(0..PlayerHistory::ALL.len())];
        PlazaState::new(location, history)
    }

    fn reward(&self, state: &PlazaState, action: &DialogueIntent) -> Float {
        self.rules.evaluate(state, action)
    }
}
