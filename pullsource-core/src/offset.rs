//! [Offset] is the resumable position of the upstream source and the unit of checkpoint state.
//! [Position] is the per-record acknowledgement key handed to the host along with every record.
//!
//! Both are backed by a generic string keyed map so they can be persisted by the host as is. The
//! sequence counter (`offsetIndex`) is a typed field and only becomes a map entry at the storage
//! boundary ([Offset::to_map], [Position::to_map]).

use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Reserved key holding the sequence counter in the persisted representation.
pub const OFFSET_INDEX_KEY: &str = "offsetIndex";
/// Well-known key holding the cursor key of the last delivered record.
pub const KEY: &str = "key";
/// Well-known key holding the event time of the last delivered record.
pub const TIMESTAMP_KEY: &str = "timestamp";

const DEFAULT_OFFSET_INDEX: u64 = 1;

/// Raw key/value representation of an [Offset] or a [Position].
pub type OffsetMap = BTreeMap<String, OffsetValue>;

/// Opaque value stored in an offset map. Numbers are restricted to integers so that values stay
/// totally ordered and hashable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OffsetValue {
    Int(i64),
    Str(String),
}

impl fmt::Display for OffsetValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OffsetValue::Int(v) => write!(f, "{v}"),
            OffsetValue::Str(v) => write!(f, "{v}"),
        }
    }
}

impl From<&str> for OffsetValue {
    fn from(value: &str) -> Self {
        OffsetValue::Str(value.to_string())
    }
}

impl From<String> for OffsetValue {
    fn from(value: String) -> Self {
        OffsetValue::Str(value)
    }
}

impl From<i64> for OffsetValue {
    fn from(value: i64) -> Self {
        OffsetValue::Int(value)
    }
}

impl OffsetValue {
    /// Interprets the value as a point in time. Strings are read as RFC 3339, integers as epoch
    /// milliseconds.
    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            OffsetValue::Int(millis) => Utc.timestamp_millis_opt(*millis).single(),
            OffsetValue::Str(s) => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
        }
    }

    fn as_index(&self) -> Option<u64> {
        match self {
            OffsetValue::Int(v) => u64::try_from(*v).ok(),
            OffsetValue::Str(s) => s.trim().parse().ok(),
        }
    }
}

/// Splits the reserved sequence counter out of a raw map. A counter that is present but not a
/// `u64` is dropped with a warning.
fn take_index(properties: &mut OffsetMap) -> Option<u64> {
    let value = properties.remove(OFFSET_INDEX_KEY)?;
    let index = value.as_index();
    if index.is_none() {
        warn!(%value, "Invalid offset index, the sequence counter restarts");
    }
    index
}

/// Position of the upstream source. Readers hold their own snapshot: every change produces a new
/// [Offset] value, nothing is mutated behind a shared reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "OffsetMap", into = "OffsetMap")]
pub struct Offset {
    properties: OffsetMap,
    index: u64,
}

impl Default for Offset {
    fn default() -> Self {
        Offset::of(OffsetMap::new())
    }
}

impl Offset {
    /// Builds an Offset from its raw representation. A missing or unparseable sequence counter
    /// defaults to `1`.
    pub fn of(map: OffsetMap) -> Self {
        let mut properties = map;
        let index = take_index(&mut properties).unwrap_or(DEFAULT_OFFSET_INDEX);
        Offset { properties, index }
    }

    /// Picks the restored state when the checkpoint store had a non-empty one, the configured
    /// initial state otherwise.
    pub fn restore_or(restored: Option<OffsetMap>, initial: &OffsetMap) -> Self {
        match restored {
            Some(map) if !map.is_empty() => Offset::of(map),
            _ => Offset::of(initial.clone()),
        }
    }

    /// Raw representation for persistence, including the sequence counter.
    pub fn to_map(&self) -> OffsetMap {
        let mut map = self.properties.clone();
        map.insert(
            OFFSET_INDEX_KEY.to_string(),
            OffsetValue::Str(self.index.to_string()),
        );
        map
    }

    /// Properties without the sequence counter.
    pub fn properties(&self) -> &OffsetMap {
        &self.properties
    }

    pub fn get(&self, name: &str) -> Option<&OffsetValue> {
        self.properties.get(name)
    }

    pub fn key(&self) -> Option<String> {
        self.get(KEY).map(ToString::to_string)
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.get(TIMESTAMP_KEY).and_then(OffsetValue::as_timestamp)
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    /// Same position, new sequence counter.
    pub fn with_index(&self, index: u64) -> Self {
        Offset {
            properties: self.properties.clone(),
            index,
        }
    }
}

impl From<OffsetMap> for Offset {
    fn from(value: OffsetMap) -> Self {
        Offset::of(value)
    }
}

impl From<Offset> for OffsetMap {
    fn from(value: Offset) -> Self {
        value.to_map()
    }
}

impl From<&Position> for Offset {
    fn from(position: &Position) -> Self {
        Offset::of(position.to_map())
    }
}

impl fmt::Display for Offset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.to_map())
    }
}

/// Acknowledgement key of a delivered record. The sequence counter is stamped when the record is
/// handed to the host.
///
/// Equality and hashing only look at the properties, the stamped sequence counter is ignored. A
/// late acknowledgement carrying a different stamp still identifies the same record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "OffsetMap", into = "OffsetMap")]
pub struct Position {
    properties: OffsetMap,
    index: Option<u64>,
}

impl Position {
    pub fn new(map: OffsetMap) -> Self {
        let mut properties = map;
        let index = take_index(&mut properties);
        Position { properties, index }
    }

    pub fn properties(&self) -> &OffsetMap {
        &self.properties
    }

    pub fn index(&self) -> Option<u64> {
        self.index
    }

    pub fn stamp(&mut self, index: u64) {
        self.index = Some(index);
    }

    pub fn stamped(mut self, index: u64) -> Self {
        self.stamp(index);
        self
    }

    /// Raw representation, including the sequence counter when it was stamped.
    pub fn to_map(&self) -> OffsetMap {
        let mut map = self.properties.clone();
        if let Some(index) = self.index {
            map.insert(
                OFFSET_INDEX_KEY.to_string(),
                OffsetValue::Str(index.to_string()),
            );
        }
        map
    }
}

impl PartialEq for Position {
    fn eq(&self, other: &Self) -> bool {
        self.properties == other.properties
    }
}

impl Eq for Position {}

impl Hash for Position {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.properties.hash(state);
    }
}

impl From<OffsetMap> for Position {
    fn from(value: OffsetMap) -> Self {
        Position::new(value)
    }
}

impl From<Position> for OffsetMap {
    fn from(value: Position) -> Self {
        value.to_map()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(entries: &[(&str, OffsetValue)]) -> OffsetMap {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_offset_index_defaults_to_one() {
        let offset = Offset::of(map(&[(KEY, "a".into())]));
        assert_eq!(offset.index(), 1);

        let offset = Offset::of(map(&[(OFFSET_INDEX_KEY, "not-a-number".into())]));
        assert_eq!(offset.index(), 1);

        let offset = Offset::of(map(&[(OFFSET_INDEX_KEY, OffsetValue::Int(-3))]));
        assert_eq!(offset.index(), 1);

        // u64::MAX + 1
        let offset = Offset::of(map(&[(OFFSET_INDEX_KEY, "18446744073709551616".into())]));
        assert_eq!(offset.index(), 1);
        assert!(offset.properties().is_empty());
    }

    #[test]
    fn test_offset_index_parsed_from_string_or_number() {
        let offset = Offset::of(map(&[(OFFSET_INDEX_KEY, "5".into())]));
        assert_eq!(offset.index(), 5);

        let offset = Offset::of(map(&[(OFFSET_INDEX_KEY, OffsetValue::Int(7))]));
        assert_eq!(offset.index(), 7);
        assert!(offset.properties().is_empty());
    }

    #[test]
    fn test_offset_to_map_serializes_index_as_string() {
        let offset = Offset::of(map(&[(KEY, "k1".into())])).with_index(6);
        let raw = offset.to_map();
        assert_eq!(raw.get(OFFSET_INDEX_KEY), Some(&OffsetValue::from("6")));
        assert_eq!(raw.get(KEY), Some(&OffsetValue::from("k1")));
        assert_eq!(Offset::of(raw), offset);
    }

    #[test]
    fn test_with_index_leaves_snapshot_untouched() {
        let original = Offset::of(map(&[(KEY, "k1".into())]));
        let bumped = original.with_index(2);
        assert_eq!(original.index(), 1);
        assert_eq!(bumped.index(), 2);
        assert_eq!(original.properties(), bumped.properties());
    }

    #[test]
    fn test_offset_timestamp() {
        let offset = Offset::of(map(&[(TIMESTAMP_KEY, "2020-01-01T00:00:01Z".into())]));
        assert_eq!(
            offset.timestamp(),
            Some(Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 1).unwrap())
        );

        let offset = Offset::of(map(&[(TIMESTAMP_KEY, OffsetValue::Int(1_000))]));
        assert_eq!(offset.timestamp(), Utc.timestamp_millis_opt(1_000).single());

        let offset = Offset::of(map(&[(TIMESTAMP_KEY, "yesterday".into())]));
        assert_eq!(offset.timestamp(), None);
        assert_eq!(Offset::default().timestamp(), None);
    }

    #[test]
    fn test_restore_prefers_non_empty_durable_state() {
        let initial = map(&[(KEY, "initial".into())]);

        let restored = Offset::restore_or(Some(map(&[(KEY, "restored".into())])), &initial);
        assert_eq!(restored.key().as_deref(), Some("restored"));

        let empty = Offset::restore_or(Some(OffsetMap::new()), &initial);
        assert_eq!(empty.key().as_deref(), Some("initial"));

        let missing = Offset::restore_or(None, &initial);
        assert_eq!(missing.key().as_deref(), Some("initial"));
    }

    #[test]
    fn test_position_equality_ignores_stamp() {
        let a = Position::new(map(&[(KEY, "k1".into())])).stamped(3);
        let b = Position::new(map(&[(KEY, "k1".into())])).stamped(4);
        let c = Position::new(map(&[(KEY, "k2".into())])).stamped(3);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_offset_from_position_carries_stamp() {
        let position = Position::new(map(&[(KEY, "k9".into())])).stamped(6);
        let offset = Offset::from(&position);
        assert_eq!(offset.index(), 6);
        assert_eq!(offset.key().as_deref(), Some("k9"));
    }

    #[test]
    fn test_offset_serde_uses_flat_map() {
        let offset = Offset::of(map(&[
            (KEY, "k1".into()),
            (TIMESTAMP_KEY, OffsetValue::Int(10)),
        ]))
        .with_index(4);
        let json = serde_json::to_value(&offset).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"key": "k1", "timestamp": 10, "offsetIndex": "4"})
        );
        let back: Offset = serde_json::from_value(json).unwrap();
        assert_eq!(back, offset);
    }
}
