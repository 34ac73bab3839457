//! Orders a freshly fetched batch before it is filtered and delivered. The confirmation window
//! relies on records being sent in a consistent order, so every variant is deterministic for a
//! given input.

use std::fmt;
use std::str::FromStr;

use crate::Error;
use crate::record::SourceRecord;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RecordSorter {
    /// Upstream already returns oldest first.
    Asc,
    /// Upstream returns newest first.
    Desc,
    /// Detect the direction by comparing the first and the last record timestamps.
    #[default]
    Implicit,
    /// Stable ascending sort by `(timestamp, key)`. Records without a timestamp go first.
    Timestamp,
}

impl RecordSorter {
    pub fn sort(&self, mut records: Vec<SourceRecord>) -> Vec<SourceRecord> {
        match self {
            RecordSorter::Asc => {}
            RecordSorter::Desc => records.reverse(),
            RecordSorter::Implicit => {
                if is_descending(&records) {
                    records.reverse();
                }
            }
            RecordSorter::Timestamp => {
                records.sort_by(|a, b| (a.timestamp, &a.key).cmp(&(b.timestamp, &b.key)));
            }
        }
        records
    }
}

fn is_descending(records: &[SourceRecord]) -> bool {
    match (
        records.first().and_then(|r| r.timestamp),
        records.last().and_then(|r| r.timestamp),
    ) {
        (Some(first), Some(last)) => first > last,
        _ => false,
    }
}

impl FromStr for RecordSorter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "asc" => Ok(RecordSorter::Asc),
            "desc" => Ok(RecordSorter::Desc),
            "implicit" => Ok(RecordSorter::Implicit),
            "timestamp" => Ok(RecordSorter::Timestamp),
            other => Err(Error::Config(format!("unknown record sorter: {other}"))),
        }
    }
}

impl fmt::Display for RecordSorter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordSorter::Asc => write!(f, "asc"),
            RecordSorter::Desc => write!(f, "desc"),
            RecordSorter::Implicit => write!(f, "implicit"),
            RecordSorter::Timestamp => write!(f, "timestamp"),
        }
    }
}
