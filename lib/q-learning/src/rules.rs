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

//! Data-driven reward rules.

use std::fmt::{Debug, Formatter};

use crate::{Action, Float};

/// A reward rule: a condition on the state plus the reward contribution of each action when the
/// condition holds. Actions without an explicit effect get the rule's `otherwise` value.
pub struct Rule<_State, _Action: Action> {
    name: String,
    condition: Box<dyn Fn(&_State) -> bool>,
    effects: Vec<(_Action, Float)>,
    otherwise: Float,
}

impl<_State, _Action: Action> Rule<_State, _Action> {
    /// New rule with no effects, i.e. contributing 0.0 for every action.
    pub fn new(name: impl Into<String>, condition: impl Fn(&_State) -> bool + 'static) -> Self {
        Self {
            name: name.into(),
            condition: Box::new(condition),
            effects: Vec::new(),
            otherwise: 0.0,
        }
    }

    /// Contribute `value` when `action` is taken. A later effect for the same action replaces
    /// the earlier one.
    pub fn effect(mut self, action: _Action, value: Float) -> Self {
        self.effects.retain(|(existing, _)| *existing != action);
        self.effects.push((action, value));
        self
    }

    /// Contribute `value` for actions without an explicit effect.
    pub fn otherwise(mut self, value: Float) -> Self {
        self.otherwise = value;
        self
    }

    /// Name used in logs and debug output.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True if the rule applies to `state`.
    pub fn matches(&self, state: &_State) -> bool {
        (self.condition)(state)
    }

    /// Contribution of `action` when the rule applies.
    pub fn contribution(&self, action: &_Action) -> Float {
        self.effects
            .iter()
            .find(|(candidate, _)| candidate == action)
            .map_or(self.otherwise, |(_, value)| *value)
    }
}

impl<_State, _Action: Action> Debug for Rule<_State, _Action> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule")
            .field("name", &self.name)
            .field("effects", &self.effects)
            .field("otherwise", &self.otherwise)
            .finish()
    }
}

/// RuleBook scores (state, action) pairs with an ordered list of rules.
///
/// reward = baseline + (contribution of the first matching rule, if any) + (contribution of
/// every matching bonus rule)
///
/// Rules are checked in the order they were added and at most one of them applies. Bonus rules
/// are independent of each other and of the main rules. A state no rule recognises simply gets
/// the baseline plus whatever bonuses apply; evaluating never fails.
#[derive(Debug)]
pub struct RuleBook<_State, _Action: Action> {
    baseline: Float,
    rules: Vec<Rule<_State, _Action>>,
    bonuses: Vec<Rule<_State, _Action>>,
}

impl<_State, _Action: Action> RuleBook<_State, _Action> {
    /// Empty rule book that scores everything as `baseline`.
    pub fn new(baseline: Float) -> Self {
        Self {
            baseline,
            rules: Vec::new(),
            bonuses: Vec::new(),
        }
    }

    /// Append a rule, with lower priority than every rule added before it.
    pub fn rule(mut self, rule: Rule<_State, _Action>) -> Self {
        self.rules.push(rule);
        self
    }

    /// Append a bonus rule.
    pub fn bonus(mut self, bonus: Rule<_State, _Action>) -> Self {
        self.bonuses.push(bonus);
        self
    }

    /// Reward when no rule matches and no bonus applies.
    pub fn baseline(&self) -> Float {
        self.baseline
    }

    /// The rule that decides `state`, if any.
    pub fn matching_rule(&self, state: &_State) -> Option<&Rule<_State, _Action>> {
        self.rules.iter().find(|rule| rule.matches(state))
    }

    /// Reward for taking `action` in `state`.
    pub fn evaluate(&self, state: &_State, action: &_Action) -> Float {
        let rule = self
            .matching_rule(state)
            .map_or(0.0, |rule| rule.contribution(action));
        let bonus: Float = self
            .bonuses
            .iter()
            .filter(|bonus| bonus.matches(state))
            .map(|bonus| bonus.contribution(action))
            .sum();
        self.baseline + rule + bonus
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Lever, Room};

    fn rule_book() -> RuleBook<Room, Lever> {
        RuleBook::new(-1.0)
            .rule(
                Rule::new("low rooms", |room: &Room| room.0 < 2)
                    .effect(Lever::Left, 10.0)
                    .effect(Lever::Right, -5.0),
            )
            .rule(Rule::new("even rooms", |room: &Room| room.0 % 2 == 0).otherwise(3.0))
            .bonus(Rule::new("room five", |room: &Room| room.0 == 5).otherwise(2.0))
    }

    #[test]
    fn test_first_matching_rule_wins() {
        let rules = rule_book();
        // room 0 matches both rules, only the first applies
        assert_eq!(rules.matching_rule(&Room(0)).unwrap().name(), "low rooms");
        assert_eq!(rules.evaluate(&Room(0), &Lever::Left), 9.0);
        assert_eq!(rules.evaluate(&Room(0), &Lever::Right), -6.0);
        assert_eq!(rules.evaluate(&Room(4), &Lever::Right), 2.0);
    }

    #[test]
    fn test_no_match_falls_back_to_baseline() {
        let rules = rule_book();
        assert!(rules.matching_rule(&Room(7)).is_none());
        assert_eq!(rules.evaluate(&Room(7), &Lever::Left), -1.0);
        assert_eq!(rules.evaluate(&Room(7), &Lever::Right), rules.baseline());
    }

    #[test]
    fn test_bonus_applies_on_top() {
        let rules = rule_book();
        assert_eq!(rules.evaluate(&Room(5), &Lever::Left), 1.0);
        assert_eq!(rules.evaluate(&Room(5), &Lever::Right), 1.0);
    }

    #[test]
    fn test_later_effect_replaces_earlier() {
        let rule = Rule::<Room, Lever>::new("any", |_| true)
            .effect(Lever::Left, 1.0)
            .effect(Lever::Left, 4.0);
        assert_eq!(rule.contribution(&Lever::Left), 4.0);
        assert_eq!(rule.contribution(&Lever::Right), 0.0);
    }
}
