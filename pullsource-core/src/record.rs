//! Units flowing through a poll cycle: the [RawResponse] returned by the fetcher, the [Item]s the
//! parser decodes out of it, and the [SourceRecord]s handed to the host.

use std::collections::HashMap;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::offset::{KEY, OffsetMap, OffsetValue, Position, TIMESTAMP_KEY};

/// Undecoded answer of the upstream source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Bytes,
}

/// A single structured item decoded out of a [RawResponse].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Item {
    /// cursor key of the item, unique within the upstream source
    pub key: Option<String>,
    pub value: Bytes,
    /// event time of the item
    pub timestamp: Option<DateTime<Utc>>,
    /// additional offset properties extracted from the item (e.g., a page token)
    pub offset: OffsetMap,
}

/// The record delivered to the host. It is not mutated after creation apart from stamping the
/// sequence counter into its [Position] when it is sent.
///
/// Serializes with the value as a JSON string. A value that is not valid UTF-8 fails to serialize
/// instead of being rewritten.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceRecord {
    pub key: Option<String>,
    #[serde(serialize_with = "serialize_value")]
    pub value: Bytes,
    pub timestamp: Option<DateTime<Utc>>,
    pub headers: HashMap<String, String>,
    pub position: Position,
}

fn serialize_value<S: serde::Serializer>(value: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
    let text = std::str::from_utf8(value).map_err(|e| {
        <S::Error as serde::ser::Error>::custom(format!("record value is not UTF-8: {e}"))
    })?;
    serializer.serialize_str(text)
}

impl SourceRecord {
    /// Builds the record [Position] out of the item's offset properties plus its key and
    /// timestamp, so that committing this position reproduces an [crate::Offset] the filter
    /// understands.
    pub fn from_item(item: Item, headers: HashMap<String, String>) -> Self {
        let mut properties = item.offset;
        if let Some(key) = &item.key {
            properties.insert(KEY.to_string(), OffsetValue::Str(key.clone()));
        }
        if let Some(timestamp) = item.timestamp {
            properties.insert(
                TIMESTAMP_KEY.to_string(),
                OffsetValue::Str(timestamp.to_rfc3339()),
            );
        }
        SourceRecord {
            key: item.key,
            value: item.value,
            timestamp: item.timestamp,
            headers,
            position: Position::new(properties),
        }
    }
}
