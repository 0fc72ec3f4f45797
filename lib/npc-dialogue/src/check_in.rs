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

//! Venue check-ins. Each record says which kind of venue a user checked in at and roughly when.
//! The NPC learns which offer fits a (venue category, time of day) pair. Rewards come from
//! keyword rules on the category text plus a bonus for popular categories.

use std::fmt::Display;

use q_learning::{
    Action, Environment, Float, HashMap, PolicyLookup, QLearningAgent, Rng, Rule, RuleBook, State,
};
use rand::seq::SliceRandom;
use rand::Rng as _;
use serde::{Deserialize, Serialize};

/// Reward before any rule applies.
pub const BASELINE_REWARD: Float = -1.0;

/// A category is a hotspot when its share of all check-ins is strictly above this.
pub const HOTSPOT_SHARE: Float = 0.01;

/// Added to every offer made at a hotspot.
pub const HOTSPOT_BONUS: Float = 2.0;

/// Check-in world error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CheckInError {
    /// There is nothing to sample from.
    #[error("no check-in records")]
    NoRecords,
}

/// Coarse time of day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeOfDay {
    /// 05:00 to 11:59.
    Morning,

    /// 12:00 to 17:59.
    Afternoon,

    /// Everything else.
    Night,
}

impl TimeOfDay {
    /// Bucket an hour of the day. Hours that are not valid clock hours count as night.
    pub fn from_hour(hour: i64) -> Self {
        match hour {
            5..=11 => TimeOfDay::Morning,
            12..=17 => TimeOfDay::Afternoon,
            _ => TimeOfDay::Night,
        }
    }
}

impl Display for TimeOfDay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimeOfDay::Morning => write!(f, "morning"),
            TimeOfDay::Afternoon => write!(f, "afternoon"),
            TimeOfDay::Night => write!(f, "night"),
        }
    }
}

/// One check-in record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CheckIn {
    /// Who checked in.
    pub user_id: u64,

    /// Free text category of the venue, e.g. "History Museum".
    pub venue_category: String,

    /// When they checked in.
    pub time_of_day: TimeOfDay,
}

impl CheckIn {
    /// New check-in record.
    pub fn new(user_id: u64, venue_category: impl Into<String>, time_of_day: TimeOfDay) -> Self {
        Self {
            user_id,
            venue_category: venue_category.into(),
            time_of_day,
        }
    }
}

/// What the agent learns about: the venue category and time of day. The user is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VenueKey {
    /// Venue category, verbatim.
    pub venue_category: String,

    /// Time of day bucket.
    pub time_of_day: TimeOfDay,
}

impl VenueKey {
    /// New key.
    pub fn new(venue_category: impl Into<String>, time_of_day: TimeOfDay) -> Self {
        Self {
            venue_category: venue_category.into(),
            time_of_day,
        }
    }
}

impl Display for VenueKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.venue_category, self.time_of_day)
    }
}

impl State for CheckIn {
    type Key = VenueKey;

    fn key(&self) -> Self::Key {
        VenueKey::new(self.venue_category.clone(), self.time_of_day)
    }
}

/// Offers an NPC can make to a player at a venue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NpcOffer {
    /// Send the player on a fight.
    CombatMission,

    /// Walk the player through local history.
    HistoricalTour,

    /// Give the player something to eat or drink.
    EnergyItem,

    /// Buy and sell items.
    TradeItems,

    /// Chat and share rumours.
    Gossip,
}

impl NpcOffer {
    /// The three classic offers.
    pub const CLASSIC: [NpcOffer; 3] = [
        NpcOffer::CombatMission,
        NpcOffer::HistoricalTour,
        NpcOffer::EnergyItem,
    ];

    /// All five offers.
    pub const EXTENDED: [NpcOffer; 5] = [
        NpcOffer::CombatMission,
        NpcOffer::HistoricalTour,
        NpcOffer::EnergyItem,
        NpcOffer::TradeItems,
        NpcOffer::Gossip,
    ];
}

impl Action for NpcOffer {}

impl Display for NpcOffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NpcOffer::CombatMission => write!(f, "combat mission"),
            NpcOffer::HistoricalTour => write!(f, "historical tour"),
            NpcOffer::EnergyItem => write!(f, "energy item"),
            NpcOffer::TradeItems => write!(f, "trade items"),
            NpcOffer::Gossip => write!(f, "gossip"),
        }
    }
}

const CULTURE: &[&str] = &["museum", "art", "history", "library", "monument", "park"];
const SPORT: &[&str] = &["gym", "stadium", "fitness", "sport", "soccer"];
const CLASSIC_FOOD: &[&str] = &["cafe", "coffee", "food", "restaurant", "shop", "store"];
const EXTENDED_FOOD: &[&str] = &["cafe", "coffee", "food", "restaurant", "bakery"];
const COMMERCE: &[&str] = &["shop", "store", "mall", "market", "plaza"];
const NIGHTLIFE: &[&str] = &["bar", "club", "pub", "lounge", "night"];

/// Which offers and keyword rules to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RulePreset {
    /// Three offers, three keyword groups. Shops count as food.
    #[default]
    Classic,

    /// Five offers, five keyword groups including commerce and nightlife.
    Extended,
}

impl RulePreset {
    /// The action set for this preset.
    pub fn offers(&self) -> Vec<NpcOffer> {
        match self {
            RulePreset::Classic => NpcOffer::CLASSIC.to_vec(),
            RulePreset::Extended => NpcOffer::EXTENDED.to_vec(),
        }
    }

    /// Keyword rules over a baseline of [BASELINE_REWARD], plus the hotspot bonus for the
    /// categories `popularity` considers hotspots.
    pub fn rules(&self, popularity: CategoryPopularity) -> RuleBook<CheckIn, NpcOffer> {
        use NpcOffer::*;

        let book = RuleBook::new(BASELINE_REWARD);
        let book = match self {
            RulePreset::Classic => book
                .rule(
                    keyword_rule("culture", CULTURE)
                        .effect(HistoricalTour, 10.0)
                        .effect(CombatMission, -5.0),
                )
                .rule(
                    keyword_rule("sport", SPORT)
                        .effect(CombatMission, 10.0)
                        .effect(HistoricalTour, -5.0),
                )
                .rule(keyword_rule("food", CLASSIC_FOOD).effect(EnergyItem, 8.0)),
            RulePreset::Extended => book
                .rule(
                    keyword_rule("culture", CULTURE)
                        .effect(HistoricalTour, 10.0)
                        .effect(CombatMission, -5.0),
                )
                .rule(
                    keyword_rule("sport", SPORT)
                        .effect(CombatMission, 10.0)
                        .effect(Gossip, -2.0),
                )
                .rule(
                    keyword_rule("food", EXTENDED_FOOD)
                        .effect(EnergyItem, 10.0)
                        .effect(Gossip, 5.0),
                )
                .rule(
                    keyword_rule("commerce", COMMERCE)
                        .effect(TradeItems, 10.0)
                        .effect(EnergyItem, 2.0),
                )
                .rule(
                    keyword_rule("nightlife", NIGHTLIFE)
                        .effect(Gossip, 10.0)
                        .effect(TradeItems, -2.0),
                ),
        };
        book.bonus(
            Rule::new("hotspot", move |check_in: &CheckIn| {
                popularity.is_hotspot(&check_in.venue_category)
            })
            .otherwise(HOTSPOT_BONUS),
        )
    }
}

/// Matches when the lower-cased category contains any of the keywords.
fn keyword_rule(name: &str, keywords: &'static [&'static str]) -> Rule<CheckIn, NpcOffer> {
    Rule::new(name, move |check_in: &CheckIn| {
        let category = check_in.venue_category.to_lowercase();
        keywords.iter().any(|keyword| category.contains(keyword))
    })
}

/// How often each venue category occurs. Categories keep the order they were first seen in.
#[derive(Debug, Clone, Default)]
pub struct CategoryPopularity {
    counts: Vec<(String, usize)>,
    index: HashMap<String, usize>,
    total: usize,
}

impl CategoryPopularity {
    /// Count the categories of `records`.
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a CheckIn>) -> Self {
        let mut popularity = Self::default();
        for record in records {
            popularity.add(&record.venue_category);
        }
        popularity
    }

    fn add(&mut self, category: &str) {
        match self.index.get(category) {
            Some(&i) => self.counts[i].1 += 1,
            None => {
                self.index.insert(category.to_string(), self.counts.len());
                self.counts.push((category.to_string(), 1));
            }
        }
        self.total += 1;
    }

    /// Number of check-ins counted.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Number of distinct categories.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// True if nothing was counted.
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Check-ins at `category`.
    pub fn count(&self, category: &str) -> usize {
        self.index.get(category).map_or(0, |&i| self.counts[i].1)
    }

    /// Fraction of all check-ins at `category`; 0.0 for unknown categories.
    pub fn share(&self, category: &str) -> Float {
        if self.total == 0 {
            return 0.0;
        }
        self.count(category) as Float / self.total as Float
    }

    /// Whether `category` earns the hotspot bonus.
    pub fn is_hotspot(&self, category: &str) -> bool {
        self.share(category) > HOTSPOT_SHARE
    }

    /// Distinct categories in first-seen order.
    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.counts.iter().map(|(category, _)| category.as_str())
    }

    /// The `n` most common categories with their share, most common first. Ties keep first-seen
    /// order.
    pub fn top(&self, n: usize) -> Vec<(&str, Float)> {
        let mut counts: Vec<&(String, usize)> = self.counts.iter().collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1));
        counts
            .into_iter()
            .take(n)
            .map(|(category, count)| (category.as_str(), *count as Float / self.total as Float))
            .collect()
    }
}

/// The check-in environment. Every sample is a uniformly drawn record.
pub struct CheckInWorld {
    records: Vec<CheckIn>,
    preset: RulePreset,
    popularity: CategoryPopularity,
    rules: RuleBook<CheckIn, NpcOffer>,
}

impl CheckInWorld {
    /// Build the world over `records`. Category popularity is computed once, here.
    pub fn new(records: Vec<CheckIn>, preset: RulePreset) -> Result<Self, CheckInError> {
        if records.is_empty() {
            return Err(CheckInError::NoRecords);
        }
        let popularity = CategoryPopularity::from_records(&records);
        let rules = preset.rules(popularity.clone());
        tracing::debug!(
            records = records.len(),
            categories = popularity.len(),
            ?preset,
            "check-in world ready"
        );
        Ok(Self {
            records,
            preset,
            popularity,
            rules,
        })
    }

    /// The records being sampled.
    pub fn records(&self) -> &[CheckIn] {
        &self.records
    }

    /// The rule preset in use.
    pub fn preset(&self) -> RulePreset {
        self.preset
    }

    /// Category counts over all records.
    pub fn popularity(&self) -> &CategoryPopularity {
        &self.popularity
    }

    /// The reward rules in use.
    pub fn rules(&self) -> &RuleBook<CheckIn, NpcOffer> {
        &self.rules
    }

    /// Look up the learned offer for up to `count` distinct, randomly chosen categories, as if
    /// the player showed up in the afternoon.
    pub fn probe(
        &self,
        agent: &QLearningAgent<CheckIn, NpcOffer>,
        count: usize,
        rng: &mut Rng,
    ) -> Vec<(String, PolicyLookup<NpcOffer>)> {
        let categories: Vec<&str> = self.popularity.categories().collect();
        categories
            .choose_multiple(rng, count)
            .map(|category| {
                let key = VenueKey::new(*category, TimeOfDay::Afternoon);
                (category.to_string(), agent.lookup(&key))
            })
            .collect()
    }
}

impl Environment for CheckInWorld {
    type State = CheckIn;
    type Action = NpcOffer;

    fn actions(&self) -> Vec<NpcOffer> {
        self.preset.offers()
    }

    fn sample_state(&self, rng: &mut Rng) -> CheckIn {
        self.records[rng.gen_range(0..self.records.len())].clone()
    }

    fn reward(&self, state: &CheckIn, action: &NpcOffer) -> Float {
        self.rules.evaluate(state, action)
    }

    fn dataset_size(&self) -> Option<usize> {
        Some(self.records.len())
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;
    use q_learning::{Rng, StepLimitKind, Trainer, TrainingConfig};
    use rand::SeedableRng;

    use super::NpcOffer::*;
    use super::*;

    fn new_rng() -> Rng {
        rand_pcg::Pcg64::seed_from_u64(42)
    }

    fn records(categories: &[(&str, usize)], time_of_day: TimeOfDay) -> Vec<CheckIn> {
        let mut records = Vec::new();
        for (category, count) in categories {
            for _ in 0..*count {
                records.push(CheckIn::new(records.len() as u64, *category, time_of_day));
            }
        }
        records
    }

    fn reward(book: &RuleBook<CheckIn, NpcOffer>, category: &str, offer: NpcOffer) -> Float {
        book.evaluate(&CheckIn::new(1, category, TimeOfDay::Afternoon), &offer)
    }

    #[test]
    fn test_time_of_day_boundaries() {
        assert_eq!(TimeOfDay::from_hour(0), TimeOfDay::Night);
        assert_eq!(TimeOfDay::from_hour(4), TimeOfDay::Night);
        assert_eq!(TimeOfDay::from_hour(5), TimeOfDay::Morning);
        assert_eq!(TimeOfDay::from_hour(11), TimeOfDay::Morning);
        assert_eq!(TimeOfDay::from_hour(12), TimeOfDay::Afternoon);
        assert_eq!(TimeOfDay::from_hour(17), TimeOfDay::Afternoon);
        assert_eq!(TimeOfDay::from_hour(18), TimeOfDay::Night);
        assert_eq!(TimeOfDay::from_hour(23), TimeOfDay::Night);
        assert_eq!(TimeOfDay::from_hour(-3), TimeOfDay::Night);
        assert_eq!(TimeOfDay::from_hour(24), TimeOfDay::Night);
    }

    #[test]
    fn test_museum_hotspot() {
        let world = CheckInWorld::new(
            records(&[("History Museum", 50), ("Gym", 50)], TimeOfDay::Afternoon),
            RulePreset::Classic,
        )
        .unwrap();
        assert_abs_diff_eq!(reward(world.rules(), "History Museum", HistoricalTour), 11.0);
        assert_abs_diff_eq!(reward(world.rules(), "History Museum", CombatMission), -4.0);
        assert_abs_diff_eq!(reward(world.rules(), "History Museum", EnergyItem), 1.0);
    }

    #[test]
    fn test_museum_without_hotspot() {
        let world = CheckInWorld::new(
            records(&[("History Museum", 1), ("Gym", 199)], TimeOfDay::Afternoon),
            RulePreset::Classic,
        )
        .unwrap();
        assert_abs_diff_eq!(reward(world.rules(), "History Museum", HistoricalTour), 9.0);
        assert_abs_diff_eq!(reward(world.rules(), "History Museum", CombatMission), -6.0);
    }

    #[test]
    fn test_hotspot_threshold_is_strict() {
        let world = CheckInWorld::new(
            records(&[("Museum", 1), ("Gym", 99)], TimeOfDay::Afternoon),
            RulePreset::Classic,
        )
        .unwrap();
        assert_eq!(world.popularity().share("Museum"), 0.01);
        assert!(!world.popularity().is_hotspot("Museum"));
        assert_abs_diff_eq!(reward(world.rules(), "Museum", HistoricalTour), 9.0);
    }

    #[test]
    fn test_unknown_category_gets_baseline() {
        let world = CheckInWorld::new(
            records(&[("Gym", 10)], TimeOfDay::Morning),
            RulePreset::Classic,
        )
        .unwrap();
        assert_eq!(world.popularity().share("Laundromat"), 0.0);
        for offer in NpcOffer::CLASSIC {
            assert_abs_diff_eq!(reward(world.rules(), "Laundromat", offer), BASELINE_REWARD);
        }
    }

    #[test]
    fn test_classic_precedence() {
        let book = RulePreset::Classic.rules(CategoryPopularity::default());
        // culture is checked before food
        assert_abs_diff_eq!(reward(&book, "Art Cafe", HistoricalTour), 9.0);
        assert_abs_diff_eq!(reward(&book, "Art Cafe", EnergyItem), -1.0);
        assert_abs_diff_eq!(reward(&book, "Coffee Shop", EnergyItem), 7.0);
        assert_abs_diff_eq!(reward(&book, "Clothing Store", EnergyItem), 7.0);
        assert_abs_diff_eq!(reward(&book, "SOCCER Field", CombatMission), 9.0);
        assert_abs_diff_eq!(reward(&book, "Bar", CombatMission), -1.0);
    }

    #[test]
    fn test_extended_precedence() {
        let book = RulePreset::Extended.rules(CategoryPopularity::default());
        assert_abs_diff_eq!(reward(&book, "Coffee Shop", EnergyItem), 9.0);
        assert_abs_diff_eq!(reward(&book, "Coffee Shop", Gossip), 4.0);
        assert_abs_diff_eq!(reward(&book, "Coffee Shop", TradeItems), -1.0);
        assert_abs_diff_eq!(reward(&book, "Shoe Store", TradeItems), 9.0);
        assert_abs_diff_eq!(reward(&book, "Shoe Store", EnergyItem), 1.0);
        assert_abs_diff_eq!(reward(&book, "Sports Bar", CombatMission), 9.0);
        assert_abs_diff_eq!(reward(&book, "Sports Bar", Gossip), -3.0);
        assert_abs_diff_eq!(reward(&book, "Nightclub", Gossip), 9.0);
        assert_abs_diff_eq!(reward(&book, "Nightclub", TradeItems), -3.0);
    }

    #[test]
    fn test_presets_offer_sets() {
        assert_eq!(RulePreset::Classic.offers(), NpcOffer::CLASSIC.to_vec());
        assert_eq!(RulePreset::Extended.offers().len(), 5);
    }

    #[test]
    fn test_no_records() {
        assert_eq!(
            CheckInWorld::new(vec![], RulePreset::Classic).err(),
            Some(CheckInError::NoRecords)
        );
    }

    #[test]
    fn test_popularity() {
        let popularity = CategoryPopularity::from_records(&records(
            &[("Bar", 2), ("Gym", 5), ("Park", 2), ("Cafe", 1)],
            TimeOfDay::Night,
        ));
        assert_eq!(popularity.total(), 10);
        assert_eq!(popularity.len(), 4);
        assert_eq!(
            popularity.categories().collect::<Vec<_>>(),
            vec!["Bar", "Gym", "Park", "Cafe"]
        );
        let top = popularity.top(3);
        assert_eq!(
            top.iter().map(|(category, _)| *category).collect::<Vec<_>>(),
            vec!["Gym", "Bar", "Park"]
        );
        assert_abs_diff_eq!(top[0].1, 0.5);
    }

    #[test]
    fn test_state_key_ignores_user() {
        let a = CheckIn::new(1, "Gym", TimeOfDay::Morning);
        let b = CheckIn::new(2, "Gym", TimeOfDay::Morning);
        let c = CheckIn::new(1, "Gym", TimeOfDay::Night);
        assert_eq!(a.key(), b.key());
        assert_ne!(a.key(), c.key());
    }

    #[test]
    fn test_records_from_json() {
        let json = r#"[
            {"user_id": 470, "venue_category": "Arts & Crafts Store", "time_of_day": "night"},
            {"user_id": 979, "venue_category": "Bridge", "time_of_day": "morning"}
        ]"#;
        let records: Vec<CheckIn> = serde_json::from_str(json).unwrap();
        assert_eq!(records[0], CheckIn::new(470, "Arts & Crafts Store", TimeOfDay::Night));
        assert_eq!(records[1].time_of_day, TimeOfDay::Morning);
    }

    #[test]
    fn test_auto_epochs_use_record_count() {
        let world = CheckInWorld::new(
            records(&[("Gym", 4), ("Park", 6)], TimeOfDay::Morning),
            RulePreset::Classic,
        )
        .unwrap();
        let config = TrainingConfig {
            step_limit: StepLimitKind::AutoEpochs,
            ..TrainingConfig::default()
        };
        assert_eq!(Trainer::new(&world, &config).unwrap().steps(), 300);
    }

    #[test]
    fn test_learned_policy_and_probe() {
        let world = CheckInWorld::new(
            records(
                &[("History Museum", 30), ("Gym", 30), ("Cafe", 30)],
                TimeOfDay::Afternoon,
            ),
            RulePreset::Classic,
        )
        .unwrap();
        let config = TrainingConfig {
            step_limit: StepLimitKind::Steps(5_000),
            ..TrainingConfig::default()
        };
        let mut rng = new_rng();
        let mut trainer = Trainer::new(&world, &config).unwrap();
        trainer.run(&mut rng);

        let mut probed = world.probe(trainer.agent(), 10, &mut rng);
        probed.sort_by(|a, b| a.0.cmp(&b.0));
        let best: Vec<(String, NpcOffer)> = probed
            .into_iter()
            .map(|(category, lookup)| match lookup {
                PolicyLookup::Known { action, .. } => (category, action),
                PolicyLookup::NoData => panic!("no data for {}", category),
            })
            .collect();
        assert_eq!(
            best,
            vec![
                ("Cafe".to_string(), EnergyItem),
                ("Gym".to_string(), CombatMission),
                ("History Museum".to_string(), HistoricalTour),
            ]
        );
    }

    #[test]
    fn test_probe_without_afternoon_data() {
        let world = CheckInWorld::new(
            records(&[("Gym", 5), ("Park", 5)], TimeOfDay::Morning),
            RulePreset::Extended,
        )
        .unwrap();
        let config = TrainingConfig {
            step_limit: StepLimitKind::Steps(100),
            ..TrainingConfig::default()
        };
        let mut rng = new_rng();
        let mut trainer = Trainer::new(&world, &config).unwrap();
        trainer.run(&mut rng);

        let probed = world.probe(trainer.agent(), 1, &mut rng);
        assert_eq!(probed.len(), 1);
        assert_eq!(probed[0].1, PolicyLookup::NoData);
    }

    proptest! {
        #[test]
        fn test_reward_is_bounded(category in ".*", offer in 0..5usize) {
            let world = CheckInWorld::new(
                vec![CheckIn::new(1, category.clone(), TimeOfDay::Night)],
                RulePreset::Extended,
            )
            .unwrap();
            let value = reward(world.rules(), &category, NpcOffer::EXTENDED[offer]);
            prop_assert!((-6.0..=11.0).contains(&value));
        }
    }
}
