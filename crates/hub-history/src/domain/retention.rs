//! # Retention Rules
//!
//! Decide which values are persisted.
//!
//! ## Matching
//!
//! Rules are grouped by value name. The list for the exact name is searched
//! first, then the list for the wildcard name `""`. Within a list the first
//! rule whose agent and thing match wins; an empty agent or thing matches
//! any. List order is the order the rules were supplied in.
//!
//! ## Defaults
//!
//! | Rule set | Value without matching rule |
//! |----------|-----------------------------|
//! | no rules at all | retained |
//! | at least one rule | not retained |

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use shared_types::ThingValue;
use std::collections::BTreeMap;

/// A single retention policy entry.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetentionRule {
    /// Value name. Empty matches any name.
    #[serde(default)]
    pub name: String,
    /// Publishing agent. Empty matches any agent.
    #[serde(default)]
    pub agent_id: String,
    /// Thing. Empty matches any thing.
    #[serde(default)]
    pub thing_id: String,
    /// Whether matching values are persisted.
    pub retain: bool,
}

impl RetentionRule {
    /// Create a rule.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        agent_id: impl Into<String>,
        thing_id: impl Into<String>,
        retain: bool,
    ) -> Self {
        Self {
            name: name.into(),
            agent_id: agent_id.into(),
            thing_id: thing_id.into(),
            retain,
        }
    }

    /// Whether the agent and thing of this rule match.
    #[must_use]
    pub fn applies_to(&self, agent_id: &str, thing_id: &str) -> bool {
        (self.agent_id.is_empty() || self.agent_id == agent_id)
            && (self.thing_id.is_empty() || self.thing_id == thing_id)
    }
}

/// Rules keyed by value name. The key `""` holds rules for any name.
pub type RetentionRuleSet = BTreeMap<String, Vec<RetentionRule>>;

/// Set each rule's name to the key of the list holding it.
#[must_use]
pub fn restamp(mut rules: RetentionRuleSet) -> RetentionRuleSet {
    for (name, list) in rules.iter_mut() {
        for rule in list.iter_mut() {
            rule.name.clone_from(name);
        }
    }
    rules
}

/// Total number of rules in a set.
#[must_use]
pub fn rule_count(rules: &RetentionRuleSet) -> usize {
    rules.values().map(Vec::len).sum()
}

/// Holds the active rule set.
///
/// The set is replaced as a whole; matching sees either the old or the new
/// set, never a mix.
#[derive(Debug, Default)]
pub struct RetentionEngine {
    rules: RwLock<RetentionRuleSet>,
}

impl RetentionEngine {
    /// Create an engine with the given rules.
    #[must_use]
    pub fn new(rules: RetentionRuleSet) -> Self {
        Self {
            rules: RwLock::new(restamp(rules)),
        }
    }

    /// First rule applying to a value with this address and name.
    #[must_use]
    pub fn find_rule(&self, agent_id: &str, thing_id: &str, name: &str) -> Option<RetentionRule> {
        let rules = self.rules.read();
        Self::find_in(&rules, agent_id, thing_id, name).cloned()
    }

    fn find_in<'a>(
        rules: &'a RetentionRuleSet,
        agent_id: &str,
        thing_id: &str,
        name: &str,
    ) -> Option<&'a RetentionRule> {
        let exact = rules
            .get(name)
            .and_then(|list| list.iter().find(|r| r.applies_to(agent_id, thing_id)));
        if exact.is_some() {
            return exact;
        }
        rules
            .get("")
            .and_then(|list| list.iter().find(|r| r.applies_to(agent_id, thing_id)))
    }

    /// Whether a value is to be persisted.
    #[must_use]
    pub fn is_retained(&self, tv: &ThingValue) -> bool {
        let rules = self.rules.read();
        if rule_count(&rules) == 0 {
            return true;
        }
        Self::find_in(&rules, &tv.agent_id, &tv.thing_id, &tv.name).is_some_and(|r| r.retain)
    }

    /// Copy of the active rules.
    #[must_use]
    pub fn rules(&self) -> RetentionRuleSet {
        self.rules.read().clone()
    }

    /// Number of active rules.
    #[must_use]
    pub fn len(&self) -> usize {
        rule_count(&self.rules.read())
    }

    /// True when no rule is active.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Replace all rules. Returns the number of rules installed.
    pub fn replace(&self, rules: RetentionRuleSet) -> usize {
        let rules = restamp(rules);
        let count = rule_count(&rules);
        *self.rules.write() = rules;
        count
    }
}
