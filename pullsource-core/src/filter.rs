//! Decides which records of a fetched batch are not yet represented by the committed [Offset].
//!
//! [RecordFilter::create] captures the offset snapshot and returns a predicate over a sorted batch.
//! The predicate only reads the snapshot and the batch, so the same snapshot and batch always give
//! the same verdict.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::Error;
use crate::offset::Offset;
use crate::record::SourceRecord;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RecordFilter {
    /// Every fetched record is new.
    Passthrough,
    /// New when the record is strictly after the offset timestamp.
    Timestamp,
    /// Like [RecordFilter::Timestamp]. Records sharing the offset timestamp are new when they come
    /// after the offset key in the sorted batch, i.e. in send order.
    #[default]
    TimestampKey,
}

/// Predicate built by [RecordFilter::create] over one offset snapshot.
#[derive(Debug, Clone)]
pub struct UnseenPredicate {
    strategy: RecordFilter,
    timestamp: Option<DateTime<Utc>>,
    key: Option<String>,
}

impl RecordFilter {
    pub fn create(&self, offset: &Offset) -> UnseenPredicate {
        UnseenPredicate {
            strategy: *self,
            timestamp: offset.timestamp(),
            key: offset.key(),
        }
    }
}

/// Where records sharing the offset timestamp resume.
#[derive(Debug, Clone, Copy)]
enum Resume {
    /// the offset has no key, ties cannot be told apart and count as delivered
    Never,
    /// ties after this index in the batch are new
    After(usize),
    /// the offset record is not in the batch, every tie is delivered again
    Everything,
}

impl UnseenPredicate {
    /// Keeps the unseen records of an already sorted batch, preserving their order.
    ///
    /// The tie-break of [RecordFilter::TimestampKey] follows the send order of the batch rather
    /// than comparing keys, so it holds for any sorter: the committed offset is the last record of
    /// an acknowledged prefix, and everything sent after it is unseen.
    pub fn retain_unseen(&self, records: Vec<SourceRecord>) -> Vec<SourceRecord> {
        let resume = self.resume(&records);
        records
            .into_iter()
            .enumerate()
            .filter(|(slot, record)| self.is_unseen(*slot, record, resume))
            .map(|(_, record)| record)
            .collect()
    }

    fn resume(&self, records: &[SourceRecord]) -> Resume {
        let (Some(timestamp), Some(key)) = (self.timestamp, self.key.as_deref()) else {
            return Resume::Never;
        };
        records
            .iter()
            .position(|r| r.timestamp == Some(timestamp) && r.key.as_deref() == Some(key))
            .map_or(Resume::Everything, Resume::After)
    }

    fn is_unseen(&self, slot: usize, record: &SourceRecord, resume: Resume) -> bool {
        let (Some(offset_ts), Some(record_ts)) = (self.timestamp, record.timestamp) else {
            return true;
        };
        match self.strategy {
            RecordFilter::Passthrough => true,
            RecordFilter::Timestamp => record_ts > offset_ts,
            RecordFilter::TimestampKey if record_ts == offset_ts => match resume {
                Resume::Never => false,
                Resume::After(matched) => slot > matched,
                Resume::Everything => true,
            },
            RecordFilter::TimestampKey => record_ts > offset_ts,
        }
    }
}

impl FromStr for RecordFilter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "passthrough" => Ok(RecordFilter::Passthrough),
            "timestamp" => Ok(RecordFilter::Timestamp),
            "timestamp_key" => Ok(RecordFilter::TimestampKey),
            other => Err(Error::Config(format!("unknown record filter: {other}"))),
        }
    }
}

impl fmt::Display for RecordFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordFilter::Passthrough => write!(f, "passthrough"),
            RecordFilter::Timestamp => write!(f, "timestamp"),
            RecordFilter::TimestampKey => write!(f, "timestamp_key"),
        }
    }
}
