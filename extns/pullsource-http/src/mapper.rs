use std::collections::HashMap;

use pullsource_core::{Item, RecordMapper, SourceRecord};

const CONTENT_TYPE: &str = "content-type";

/// Keeps the item key and value as they are and attaches a fixed set of headers to every record.
#[derive(Debug, Clone)]
pub struct KvRecordMapper {
    headers: HashMap<String, String>,
}

impl Default for KvRecordMapper {
    /// Values produced by [crate::JsonResponseParser] are JSON documents.
    fn default() -> Self {
        KvRecordMapper::new(HashMap::from([(
            CONTENT_TYPE.to_string(),
            "application/json".to_string(),
        )]))
    }
}

impl KvRecordMapper {
    pub fn new(headers: HashMap<String, String>) -> Self {
        KvRecordMapper { headers }
    }
}

impl RecordMapper for KvRecordMapper {
    fn map(&self, item: Item) -> SourceRecord {
        SourceRecord::from_item(item, self.headers.clone())
    }
}
