//! # Hub Events
//!
//! Events carried by the bus and the filter subscribers use to select them.

use serde::{Deserialize, Serialize};
use shared_types::{ThingValue, ValueKind};

/// Events published on the hub bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HubEvent {
    /// A Thing published a single value.
    ValuePublished(ThingValue),

    /// A batch of values, typically replayed by an agent after reconnecting.
    ValuesPublished(Vec<ThingValue>),
}

impl HubEvent {
    /// The values carried by this event.
    #[must_use]
    pub fn values(&self) -> &[ThingValue] {
        match self {
            Self::ValuePublished(tv) => std::slice::from_ref(tv),
            Self::ValuesPublished(list) => list,
        }
    }

    /// Number of values carried.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values().len()
    }

    /// True for an empty batch.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values().is_empty()
    }
}

/// Filter for subscribing to specific values.
///
/// Empty fields match anything. A batch event matches when any of its
/// values matches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    /// Value kinds to include.
    pub kinds: Vec<ValueKind>,
    /// Only values from this agent.
    pub agent_id: Option<String>,
    /// Only values of this thing.
    pub thing_id: Option<String>,
    /// Value names to include.
    pub names: Vec<String>,
}

impl EventFilter {
    /// Create a filter that accepts all events.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Create a filter for specific value kinds.
    #[must_use]
    pub fn kinds(kinds: Vec<ValueKind>) -> Self {
        Self {
            kinds,
            ..Self::default()
        }
    }

    /// Create a filter for the values of one Thing.
    #[must_use]
    pub fn for_thing(agent_id: impl Into<String>, thing_id: impl Into<String>) -> Self {
        Self {
            agent_id: Some(agent_id.into()),
            thing_id: Some(thing_id.into()),
            ..Self::default()
        }
    }

    /// Restrict to the given names.
    #[must_use]
    pub fn with_names(mut self, names: Vec<String>) -> Self {
        self.names = names;
        self
    }

    /// Check if a single value matches this filter.
    #[must_use]
    pub fn matches_value(&self, tv: &ThingValue) -> bool {
        let kind_match = self.kinds.is_empty() || self.kinds.contains(&tv.value_kind);
        let agent_match = self.agent_id.as_deref().map_or(true, |a| a == tv.agent_id);
        let thing_match = self.thing_id.as_deref().map_or(true, |t| t == tv.thing_id);
        let name_match = self.names.is_empty() || self.names.iter().any(|n| *n == tv.name);

        kind_match && agent_match && thing_match && name_match
    }

    /// Check if an event matches this filter.
    #[must_use]
    pub fn matches(&self, event: &HubEvent) -> bool {
        event.values().iter().any(|tv| self.matches_value(tv))
    }
}
