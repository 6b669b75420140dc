//! # Core Domain Entities
//!
//! Defines the values Things publish to the hub.
//!
//! ## Addressing
//!
//! A Thing is addressed by its publishing agent and its own id. The address
//! `"{agent_id}/{thing_id}"` names the storage bucket holding its history.

use serde::{Deserialize, Serialize};
use serde_with::{base64::Base64, serde_as};
use std::borrow::Cow;
use std::collections::HashMap;

/// Reserved event name for a bulk properties update.
///
/// The payload of such an event is a JSON object mapping property names
/// to their new values.
pub const EVENT_NAME_PROPS: &str = "$properties";

/// Separator between the agent and thing id in a Thing address.
pub const ADDRESS_SEPARATOR: char = '/';

/// Map of value name to its most recent value.
pub type ThingValueMap = HashMap<String, ThingValue>;

/// The kind of a published value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    /// Something happened on the Thing.
    #[default]
    Event,
    /// A request for the Thing to do something.
    Action,
    /// A configuration change.
    Config,
}

impl ValueKind {
    /// Single-letter tag used in storage keys.
    #[must_use]
    pub fn tag(self) -> &'static str {
        match self {
            Self::Action => "a",
            Self::Config => "c",
            Self::Event => "e",
        }
    }

    /// Parse a storage key tag.
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "a" => Some(Self::Action),
            "c" => Some(Self::Config),
            "e" => Some(Self::Event),
            _ => None,
        }
    }

    /// Human readable name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Action => "action",
            Self::Config => "config",
            Self::Event => "event",
        }
    }
}

impl std::fmt::Display for ValueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One event, action or config value emitted by a Thing.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThingValue {
    /// The publishing agent.
    pub agent_id: String,
    /// The device or service the value belongs to.
    pub thing_id: String,
    /// Property, event or action name.
    pub name: String,
    /// Opaque payload.
    #[serde_as(as = "Base64")]
    #[serde(default)]
    pub data: Vec<u8>,
    /// Creation time in epoch milliseconds. Zero means "not set".
    #[serde(default)]
    pub created_msec: u64,
    /// Event, action or config.
    #[serde(default)]
    pub value_kind: ValueKind,
    /// The client that caused the value, if any.
    #[serde(default)]
    pub sender_id: String,
}

impl ThingValue {
    /// Create a value without a creation time.
    #[must_use]
    pub fn new(
        value_kind: ValueKind,
        agent_id: impl Into<String>,
        thing_id: impl Into<String>,
        name: impl Into<String>,
        data: impl Into<Vec<u8>>,
        sender_id: impl Into<String>,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            thing_id: thing_id.into(),
            name: name.into(),
            data: data.into(),
            created_msec: 0,
            value_kind,
            sender_id: sender_id.into(),
        }
    }

    /// Create an event value.
    #[must_use]
    pub fn event(
        agent_id: impl Into<String>,
        thing_id: impl Into<String>,
        name: impl Into<String>,
        data: impl Into<Vec<u8>>,
    ) -> Self {
        Self::new(ValueKind::Event, agent_id, thing_id, name, data, "")
    }

    /// Set the creation time.
    #[must_use]
    pub fn with_created(mut self, created_msec: u64) -> Self {
        self.created_msec = created_msec;
        self
    }

    /// Set the sender.
    #[must_use]
    pub fn with_sender(mut self, sender_id: impl Into<String>) -> Self {
        self.sender_id = sender_id.into();
        self
    }

    /// Address of the Thing this value belongs to.
    #[must_use]
    pub fn thing_addr(&self) -> String {
        thing_addr(&self.agent_id, &self.thing_id)
    }

    /// Payload as text, lossy for non UTF-8 data.
    #[must_use]
    pub fn data_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.data)
    }
}

/// Build the address of a Thing.
#[must_use]
pub fn thing_addr(agent_id: &str, thing_id: &str) -> String {
    format!("{agent_id}{ADDRESS_SEPARATOR}{thing_id}")
}

/// Split a Thing address into agent and thing id.
///
/// Returns `None` unless the address holds exactly two non-empty parts.
#[must_use]
pub fn split_thing_addr(addr: &str) -> Option<(&str, &str)> {
    let (agent_id, thing_id) = addr.split_once(ADDRESS_SEPARATOR)?;
    if agent_id.is_empty() || thing_id.is_empty() || thing_id.contains(ADDRESS_SEPARATOR) {
        return None;
    }
    Some((agent_id, thing_id))
}
