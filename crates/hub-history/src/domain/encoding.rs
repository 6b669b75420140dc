//! # Storage Key Codec
//!
//! A value is stored in its Thing's bucket under
//!
//! ```text
//! {created_msec:020}/{name}/{kind tag}/{sender_id}
//! ```
//!
//! with the raw payload as the stored data. The timestamp is zero-padded to
//! the width of `u64::MAX` so lexicographic key order equals chronological
//! order. Entries with the same timestamp order by name, then kind, then
//! sender.

use super::errors::HistoryError;
use shared_types::{split_thing_addr, ThingValue, ValueKind, ADDRESS_SEPARATOR};

/// Number of digits in an encoded timestamp.
pub const TIMESTAMP_WIDTH: usize = 20;

/// Number of `/` separated fields in a key.
pub const KEY_FIELDS: usize = 4;

/// Fields parsed from a storage key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyParts<'a> {
    pub created_msec: u64,
    pub name: &'a str,
    pub kind: ValueKind,
    pub sender_id: &'a str,
}

/// Encode a timestamp the way keys carry it.
#[must_use]
pub fn encode_timestamp(msec: u64) -> String {
    format!("{msec:0width$}", width = TIMESTAMP_WIDTH)
}

/// Build the storage key for a value.
#[must_use]
pub fn encode_key(tv: &ThingValue) -> String {
    format!(
        "{}/{}/{}/{}",
        encode_timestamp(tv.created_msec),
        tv.name,
        tv.value_kind.tag(),
        tv.sender_id
    )
}

/// Build the storage key and data for a value.
#[must_use]
pub fn encode(tv: &ThingValue) -> (String, Vec<u8>) {
    (encode_key(tv), tv.data.clone())
}

/// Check that a value can be stored.
///
/// Agent, thing and name must be present. None of the addressing fields may
/// contain the key separator.
pub fn validate(tv: &ThingValue) -> Result<(), HistoryError> {
    if tv.agent_id.is_empty() {
        return Err(HistoryError::invalid("missing agent id"));
    }
    if tv.thing_id.is_empty() {
        return Err(HistoryError::invalid("missing thing id"));
    }
    if tv.name.is_empty() {
        return Err(HistoryError::invalid("missing value name"));
    }
    let fields = [
        ("agent id", &tv.agent_id),
        ("thing id", &tv.thing_id),
        ("name", &tv.name),
        ("sender id", &tv.sender_id),
    ];
    for (label, field) in fields {
        if field.contains(ADDRESS_SEPARATOR) {
            return Err(HistoryError::invalid(format!(
                "{label} '{field}' contains '{ADDRESS_SEPARATOR}'"
            )));
        }
    }
    Ok(())
}

/// Parse a storage key.
pub fn parse_key(key: &str) -> Result<KeyParts<'_>, HistoryError> {
    let corrupt = |reason: &str| HistoryError::DecodeCorruption {
        key: key.to_string(),
        reason: reason.to_string(),
    };

    let parts: Vec<&str> = key.split(ADDRESS_SEPARATOR).collect();
    if parts.len() != KEY_FIELDS {
        return Err(corrupt("wrong number of fields"));
    }
    let created_msec = parts[0]
        .parse::<u64>()
        .map_err(|_| corrupt("timestamp is not a number"))?;
    let kind = ValueKind::from_tag(parts[2]).ok_or_else(|| corrupt("unknown value kind"))?;

    Ok(KeyParts {
        created_msec,
        name: parts[1],
        kind,
        sender_id: parts[3],
    })
}

/// Rebuild a value from its bucket id, key and stored data.
pub fn decode(bucket_id: &str, key: &str, data: &[u8]) -> Result<ThingValue, HistoryError> {
    let (agent_id, thing_id) =
        split_thing_addr(bucket_id).ok_or_else(|| HistoryError::DecodeCorruption {
            key: key.to_string(),
            reason: format!("bucket '{bucket_id}' is not a thing address"),
        })?;
    let parts = parse_key(key)?;

    Ok(ThingValue {
        agent_id: agent_id.to_string(),
        thing_id: thing_id.to_string(),
        name: parts.name.to_string(),
        data: data.to_vec(),
        created_msec: parts.created_msec,
        value_kind: parts.kind,
        sender_id: parts.sender_id.to_string(),
    })
}
