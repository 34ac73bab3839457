//! Decodes a JSON response into items using JSON pointers.

use bytes::Bytes;
use chrono::{DateTime, TimeZone, Utc};
use pullsource_core::{Item, OffsetMap, OffsetValue, RawResponse, ResponseParser};
use serde_json::Value;
use tracing::debug;

use crate::config::ResponseConfig;
use crate::{Error, Result};

/// Each element of the array found at the list pointer becomes one item, its serialized JSON being
/// the item value. A non-array at the list pointer is treated as a single item.
#[derive(Debug, Clone)]
pub struct JsonResponseParser {
    config: ResponseConfig,
}

impl JsonResponseParser {
    pub fn new(config: ResponseConfig) -> Self {
        JsonResponseParser { config }
    }

    fn parse_items(&self, body: &[u8]) -> Result<Vec<Item>> {
        let root: Value = serde_json::from_slice(body).map_err(|e| Error::Decode(e.to_string()))?;
        let list = root.pointer(&self.config.list_pointer).ok_or_else(|| {
            Error::Decode(format!(
                "nothing found at list pointer {:?}",
                self.config.list_pointer
            ))
        })?;

        match list {
            Value::Array(values) => values.iter().map(|value| self.item(value)).collect(),
            Value::Null => Ok(Vec::new()),
            value => Ok(vec![self.item(value)?]),
        }
    }

    fn item(&self, value: &Value) -> Result<Item> {
        let key = self
            .config
            .key_pointer
            .as_deref()
            .and_then(|pointer| value.pointer(pointer))
            .filter(|v| !v.is_null())
            .map(text);

        let timestamp = match self.config.timestamp_pointer.as_deref() {
            Some(pointer) => match value.pointer(pointer) {
                Some(Value::Null) | None => None,
                Some(ts) => Some(timestamp(ts)?),
            },
            None => None,
        };

        let mut offset = OffsetMap::new();
        for (name, pointer) in &self.config.offset_pointers {
            match value.pointer(pointer) {
                Some(Value::Null) | None => {
                    debug!(%name, %pointer, "Offset property missing from item");
                }
                Some(v) => {
                    let v = match v.as_i64() {
                        Some(n) => OffsetValue::Int(n),
                        None => OffsetValue::Str(text(v)),
                    };
                    offset.insert(name.clone(), v);
                }
            }
        }

        let value = serde_json::to_vec(value).map_err(|e| Error::Decode(e.to_string()))?;
        Ok(Item {
            key,
            value: Bytes::from(value),
            timestamp,
            offset,
        })
    }
}

impl ResponseParser for JsonResponseParser {
    fn parse(&self, response: RawResponse) -> pullsource_core::Result<Vec<Item>> {
        Ok(self.parse_items(&response.body)?)
    }
}

/// Strings without their quotes, anything else as compact JSON.
fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// RFC 3339 strings or epoch milliseconds.
fn timestamp(value: &Value) -> Result<DateTime<Utc>> {
    let parsed = match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(n) => n
            .as_i64()
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single()),
        _ => None,
    };
    parsed.ok_or_else(|| Error::Decode(format!("invalid timestamp {value}")))
}
