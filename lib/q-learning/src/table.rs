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

//! The Q-table: learned action values per state, and the temporal-difference update.
//!
//! Reads of anything never updated are 0.0 and never create entries.

use serde::Serialize;

use crate::{Action, Float, HashMap, StateKey};

/// Action values recorded for one state, kept in the order the actions were first updated.
///
/// The order matters: when two actions share the maximum value the one recorded first wins, which
/// keeps the greedy choice stable within a run.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionValues<_Action: Action> {
    values: Vec<(_Action, Float)>,
}

impl<_Action: Action> ActionValues<_Action> {
    fn new() -> Self {
        Self { values: Vec::new() }
    }

    /// Value recorded for `action`, if any.
    pub fn get(&self, action: &_Action) -> Option<Float> {
        self.values
            .iter()
            .find(|(recorded, _)| recorded == action)
            .map(|(_, value)| *value)
    }

    fn value_mut(&mut self, action: _Action) -> &mut Float {
        let index = match self.values.iter().position(|(recorded, _)| *recorded == action) {
            Some(index) => index,
            None => {
                self.values.push((action, 0.0));
                self.values.len() - 1
            }
        };
        &mut self.values[index].1
    }

    /// Action with the highest value and that value. First recorded wins ties.
    pub fn best(&self) -> Option<(_Action, Float)> {
        let mut best: Option<(_Action, Float)> = None;
        for (action, value) in &self.values {
            match best {
                Some((_, best_value)) if *value <= best_value => {}
                _ => best = Some((*action, *value)),
            }
        }
        best
    }

    /// All recorded actions, highest value first.
    pub fn ranked(&self) -> Vec<(_Action, Float)> {
        let mut ranked = self.values.clone();
        // stable sort, ties keep recording order
        ranked.sort_by(|(_, a), (_, b)| b.total_cmp(a));
        ranked
    }

    /// Recorded (action, value) pairs in recording order.
    pub fn iter(&self) -> impl Iterator<Item = &(_Action, Float)> {
        self.values.iter()
    }

    /// Number of recorded actions.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True if no action has been recorded.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// QTable maps a state key to the values of the actions taken in that state.
///
/// Any (state, action) pair that was never updated reads as 0.0. Reads never create entries; a
/// state gets an entry the first time one of its actions is updated, and entries are never
/// removed.
#[derive(Debug, Clone)]
pub struct QTable<_Key: StateKey, _Action: Action> {
    states: HashMap<_Key, ActionValues<_Action>>,
    learning_rate: Float,
    discount_factor: Float,
    updates: u64,
}

impl<_Key, _Action> QTable<_Key, _Action>
where
    _Key: StateKey,
    _Action: Action,
{
    /// Create an empty table. `learning_rate` is α and `discount_factor` is γ in the update rule.
    ///
    /// The values are trusted here; [crate::QLearningAgent::new] validates them.
    pub fn new(learning_rate: Float, discount_factor: Float) -> Self {
        Self {
            states: HashMap::default(),
            learning_rate,
            discount_factor,
            updates: 0,
        }
    }

    /// Value of `action` in state `key`, or 0.0 if it was never updated.
    pub fn get(&self, key: &_Key, action: &_Action) -> Float {
        self.states
            .get(key)
            .and_then(|values| values.get(action))
            .unwrap_or(0.0)
    }

    /// Recorded action values for state `key`, or None if the state was never updated.
    pub fn action_values(&self, key: &_Key) -> Option<&ActionValues<_Action>> {
        self.states.get(key)
    }

    /// Action with the highest value in state `key`, together with its value. None if the state
    /// has no recorded actions; what to do then is up to the caller.
    pub fn best_entry(&self, key: &_Key) -> Option<(_Action, Float)> {
        self.states.get(key).and_then(ActionValues::best)
    }

    /// Action with the highest value in state `key`.
    pub fn best_action(&self, key: &_Key) -> Option<_Action> {
        self.best_entry(key).map(|(action, _)| action)
    }

    /// max_a Q(key, a), or 0.0 if the state has no recorded actions.
    pub fn max_value(&self, key: &_Key) -> Float {
        self.best_entry(key).map_or(0.0, |(_, value)| value)
    }

    /// Apply the temporal-difference update and return the new value:
    ///
    /// Q(s,a) ← Q(s,a) + α · [r + γ · max_a' Q(s',a') − Q(s,a)]
    ///
    /// See Chapter 22, section 22.3.3 Temporal-difference Q-learning.
    pub fn update(&mut self, key: &_Key, action: _Action, reward: Float, next_key: &_Key) -> Float {
        let max_next = self.max_value(next_key);
        let cell = self
            .states
            .entry(key.clone())
            .or_insert_with(ActionValues::new)
            .value_mut(action);
        let current = *cell;
        let td_target = reward + self.discount_factor * max_next;
        *cell = current + self.learning_rate * (td_target - current);
        self.updates += 1;
        *cell
    }

    /// Learning rate α.
    pub fn learning_rate(&self) -> Float {
        self.learning_rate
    }

    /// Discount factor γ.
    pub fn discount_factor(&self) -> Float {
        self.discount_factor
    }

    /// Number of updates applied so far.
    pub fn update_count(&self) -> u64 {
        self.updates
    }

    /// Number of states with at least one recorded action.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// True if nothing has been learned yet.
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// All states and their action values, in no particular order.
    pub fn entries(&self) -> impl Iterator<Item = (&_Key, &ActionValues<_Action>)> {
        self.states.iter()
    }

    /// Serializable copy of the table with each state's actions ranked highest first.
    pub fn snapshot(&self) -> TableSnapshot<_Key, _Action> {
        TableSnapshot {
            learning_rate: self.learning_rate,
            discount_factor: self.discount_factor,
            updates: self.updates,
            states: self
                .states
                .iter()
                .map(|(key, values)| StateSnapshot {
                    state: key.clone(),
                    actions: values
                        .ranked()
                        .into_iter()
                        .map(|(action, q_value)| ActionValueSnapshot { action, q_value })
                        .collect(),
                })
                .collect(),
        }
    }

    /// Pretty printed JSON of [QTable::snapshot].
    pub fn serialize_table(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.snapshot())
    }
}

/// Serializable view of a [QTable].
#[derive(Debug, Clone, Serialize)]
pub struct TableSnapshot<_Key: StateKey, _Action: Action> {
    /// Learning rate α.
    pub learning_rate: Float,
    /// Discount factor γ.
    pub discount_factor: Float,
    /// Number of updates applied.
    pub updates: u64,
    /// One entry per known state.
    pub states: Vec<StateSnapshot<_Key, _Action>>,
}

/// Serializable view of one state's action values.
#[derive(Debug, Clone, Serialize)]
pub struct StateSnapshot<_Key: StateKey, _Action: Action> {
    /// State key.
    pub state: _Key,
    /// Recorded actions, highest value first.
    pub actions: Vec<ActionValueSnapshot<_Action>>,
}

/// Serializable (action, value) pair.
#[derive(Debug, Clone, Serialize)]
pub struct ActionValueSnapshot<_Action: Action> {
    /// Action.
    pub action: _Action,
    /// Q-value.
    pub q_value: Float,
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;

    use super::*;
    use crate::testing::{Lever, Room};

    type LeverTable = QTable<Room, Lever>;

    #[test]
    fn test_unseen_pairs_read_as_zero() {
        let table = LeverTable::new(0.1, 0.9);
        assert_eq!(table.get(&Room(0), &Lever::Left), 0.0);
        assert_eq!(table.get(&Room(7), &Lever::Right), 0.0);
        assert_eq!(table.best_entry(&Room(0)), None);
        assert_eq!(table.max_value(&Room(0)), 0.0);
        assert!(table.is_empty());
    }

    #[test]
    fn test_reads_do_not_create_entries() {
        let table = LeverTable::new(0.1, 0.9);
        let _ = table.get(&Room(1), &Lever::Left);
        let _ = table.best_action(&Room(1));
        let _ = table.action_values(&Room(1));
        assert!(table.is_empty());
        assert_eq!(table.update_count(), 0);
    }

    // Q(s,a) = 0, α = 0.1, γ = 0.9, r = 10 and nothing known about s':
    // 0 + 0.1 * (10 + 0.9 * 0 - 0) = 1.0
    #[test]
    fn test_first_update_from_empty_table() {
        let mut table = LeverTable::new(0.1, 0.9);
        let value = table.update(&Room(0), Lever::Right, 10.0, &Room(1));
        assert_abs_diff_eq!(value, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(table.get(&Room(0), &Lever::Right), 1.0, epsilon = 1e-12);
        assert_eq!(table.get(&Room(0), &Lever::Left), 0.0);
        assert_eq!(table.update_count(), 1);
    }

    // 1.0 + 0.1 * (10 + 0.9 * 0 - 1.0) = 1.9
    #[test]
    fn test_second_update_on_same_cell() {
        let mut table = LeverTable::new(0.1, 0.9);
        table.update(&Room(0), Lever::Right, 10.0, &Room(1));
        let value = table.update(&Room(0), Lever::Right, 10.0, &Room(1));
        assert_abs_diff_eq!(value, 1.9, epsilon = 1e-12);
        assert_eq!(table.update_count(), 2);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_update_bootstraps_from_best_next_value() {
        let mut table = LeverTable::new(0.5, 0.5);
        table.update(&Room(1), Lever::Left, 4.0, &Room(9)); // Q(1, Left) = 2.0
        table.update(&Room(1), Lever::Right, -4.0, &Room(9)); // Q(1, Right) = -2.0
        // 0 + 0.5 * (1 + 0.5 * 2.0 - 0) = 1.0
        let value = table.update(&Room(0), Lever::Left, 1.0, &Room(1));
        assert_abs_diff_eq!(value, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_update_with_same_state_as_next_uses_value_before_update() {
        let mut table = LeverTable::new(0.1, 0.9);
        table.update(&Room(0), Lever::Right, 10.0, &Room(5)); // 1.0
        // 1.0 + 0.1 * (10 + 0.9 * 1.0 - 1.0) = 1.99
        let value = table.update(&Room(0), Lever::Right, 10.0, &Room(0));
        assert_abs_diff_eq!(value, 1.99, epsilon = 1e-12);
    }

    #[test]
    fn test_best_action_ties_go_to_first_recorded() {
        let mut table = LeverTable::new(1.0, 0.0);
        table.update(&Room(0), Lever::Right, 3.0, &Room(1));
        table.update(&Room(0), Lever::Left, 3.0, &Room(1));
        assert_eq!(table.best_action(&Room(0)), Some(Lever::Right));

        table.update(&Room(2), Lever::Left, 3.0, &Room(1));
        table.update(&Room(2), Lever::Right, 3.0, &Room(1));
        assert_eq!(table.best_action(&Room(2)), Some(Lever::Left));
    }

    #[test]
    fn test_negative_values_are_still_best() {
        let mut table = LeverTable::new(1.0, 0.0);
        table.update(&Room(0), Lever::Left, -3.0, &Room(1));
        table.update(&Room(0), Lever::Right, -5.0, &Room(1));
        assert_eq!(table.best_entry(&Room(0)), Some((Lever::Left, -3.0)));
        assert_eq!(table.max_value(&Room(0)), -3.0);
    }

    #[test]
    fn test_ranked_orders_highest_first() {
        let mut table = LeverTable::new(1.0, 0.0);
        table.update(&Room(0), Lever::Left, 1.0, &Room(1));
        table.update(&Room(0), Lever::Right, 2.0, &Room(1));
        let ranked = table.action_values(&Room(0)).unwrap().ranked();
        assert_eq!(ranked, vec![(Lever::Right, 2.0), (Lever::Left, 1.0)]);
    }

    #[test]
    fn test_serialize_table() {
        let mut table = LeverTable::new(1.0, 0.0);
        table.update(&Room(3), Lever::Left, 1.5, &Room(1));
        let json: serde_json::Value = serde_json::from_str(&table.serialize_table().unwrap()).unwrap();
        assert_eq!(json["updates"], 1);
        assert_eq!(json["states"][0]["state"], 3);
        assert_eq!(json["states"][0]["actions"][0]["action"], "Left");
        assert_eq!(json["states"][0]["actions"][0]["q_value"], 1.5);
    }

    proptest! {
        // The new value always lies between the old value and the TD target.
        #[test]
        fn test_update_stays_between_current_and_target(
            first_reward in -100.0f64..100.0,
            reward in -100.0f64..100.0,
            learning_rate in 0.01f64..=1.0,
            discount_factor in 0.0f64..=1.0,
        ) {
            let mut table = LeverTable::new(learning_rate, discount_factor);
            let current = table.update(&Room(0), Lever::Left, first_reward, &Room(1));
            let target = reward + discount_factor * table.max_value(&Room(2));
            let new_value = table.update(&Room(0), Lever::Left, reward, &Room(2));
            let low = current.min(target);
            let high = current.max(target);
            prop_assert!(new_value >= low - 1e-9 && new_value <= high + 1e-9);
        }

        #[test]
        fn test_best_entry_is_argmax(
            left in -100.0f64..100.0,
            right in -100.0f64..100.0,
        ) {
            let mut table = LeverTable::new(1.0, 0.0);
            table.update(&Room(0), Lever::Left, left, &Room(1));
            table.update(&Room(0), Lever::Right, right, &Room(1));
            let (_, best) = table.best_entry(&Room(0)).unwrap();
            prop_assert_eq!(best, left.max(right));
        }
    }
}
