//! In-memory collaborators for driving the coordinator in tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use bytes::Bytes;
use chrono::{TimeZone, Utc};
use parking_lot::Mutex;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::offset::{KEY, Offset, OffsetMap, OffsetValue, TIMESTAMP_KEY};
use crate::record::{Item, RawResponse, SourceRecord};
use crate::source::{CheckpointStore, Fetcher, ResponseParser};

fn item(key: &str, secs: i64) -> Item {
    Item {
        key: Some(key.to_string()),
        value: Bytes::from(format!("value-{key}")),
        timestamp: Utc.timestamp_opt(secs, 0).single(),
        offset: OffsetMap::new(),
    }
}

/// A record keyed `key` with an event time of `secs` since the epoch.
pub(crate) fn record(key: &str, secs: i64) -> SourceRecord {
    SourceRecord::from_item(item(key, secs), HashMap::new())
}

/// Offset of a delivered record keyed `key` at `secs` since the epoch.
pub(crate) fn offset_at(key: &str, secs: i64) -> Offset {
    let mut map = OffsetMap::new();
    map.insert(KEY.to_string(), OffsetValue::from(key));
    map.insert(TIMESTAMP_KEY.to_string(), OffsetValue::Int(secs * 1000));
    Offset::of(map)
}

/// Response body understood by [FixtureParser].
pub(crate) fn response(items: &[(&str, i64)]) -> RawResponse {
    let body: Vec<serde_json::Value> = items
        .iter()
        .map(|(key, ts)| serde_json::json!({"key": key, "ts": ts}))
        .collect();
    RawResponse {
        status: 200,
        headers: HashMap::new(),
        body: Bytes::from(serde_json::to_vec(&body).unwrap_or_default()),
    }
}

/// Replays queued responses and remembers the offsets it was asked for. Once the queue is drained
/// it keeps answering with an empty batch.
#[derive(Clone, Default)]
pub(crate) struct FixtureFetcher {
    responses: Arc<Mutex<VecDeque<Result<RawResponse>>>>,
    requested: Arc<Mutex<Vec<Offset>>>,
}

impl FixtureFetcher {
    pub(crate) fn new(responses: impl IntoIterator<Item = Result<RawResponse>>) -> Self {
        FixtureFetcher {
            responses: Arc::new(Mutex::new(responses.into_iter().collect())),
            requested: Arc::default(),
        }
    }

    pub(crate) fn push(&self, response: Result<RawResponse>) {
        self.responses.lock().push_back(response);
    }

    pub(crate) fn requested(&self) -> Vec<Offset> {
        self.requested.lock().clone()
    }
}

impl Fetcher for FixtureFetcher {
    async fn fetch(&self, offset: &Offset) -> Result<RawResponse> {
        self.requested.lock().push(offset.clone());
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(response(&[])))
    }
}

#[derive(Deserialize)]
struct FixtureItem {
    key: String,
    ts: i64,
}

/// Decodes the JSON array produced by [response].
pub(crate) struct FixtureParser;

impl ResponseParser for FixtureParser {
    fn parse(&self, response: RawResponse) -> Result<Vec<Item>> {
        let items: Vec<FixtureItem> =
            serde_json::from_slice(&response.body).map_err(|e| Error::Parse(e.to_string()))?;
        Ok(items.iter().map(|i| item(&i.key, i.ts)).collect())
    }
}

pub(crate) fn map_record(item: Item) -> SourceRecord {
    SourceRecord::from_item(item, HashMap::new())
}

pub(crate) struct MemoryCheckpointStore(pub(crate) Option<OffsetMap>);

impl CheckpointStore for MemoryCheckpointStore {
    async fn read(&self) -> Result<Option<OffsetMap>> {
        Ok(self.0.clone())
    }
}
