//! Capabilities the [crate::PollingCoordinator] consumes but does not implement: issuing the
//! request, decoding the response, mapping items to records and reading the durable checkpoint.

use std::fmt;
use std::str::FromStr;

use crate::Error;
use crate::Result;
use crate::offset::{Offset, OffsetMap};
use crate::record::{Item, RawResponse, SourceRecord};

/// Issues the outbound request for the given offset. I/O failures must be reported as
/// [Error::Transient] so the host retries the poll.
#[trait_variant::make(Send)]
pub trait Fetcher {
    async fn fetch(&self, offset: &Offset) -> Result<RawResponse>;
}

/// Decodes a raw payload into items. Failures are reported as [Error::Parse] and are subject to
/// the [ParseErrorPolicy].
pub trait ResponseParser: Send + Sync {
    fn parse(&self, response: RawResponse) -> Result<Vec<Item>>;
}

/// Converts a parsed item into the record delivered to the host.
pub trait RecordMapper: Send + Sync {
    fn map(&self, item: Item) -> SourceRecord;
}

impl<F> RecordMapper for F
where
    F: Fn(Item) -> SourceRecord + Send + Sync,
{
    fn map(&self, item: Item) -> SourceRecord {
        self(item)
    }
}

/// Durable checkpoint state managed by the host. It is read once at start, writes happen through
/// the host's own commit mechanism using [crate::CommitHandle::commit].
#[trait_variant::make(Send)]
pub trait CheckpointStore {
    async fn read(&self) -> Result<Option<OffsetMap>>;
}

/// What to do when the response of a poll cannot be parsed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ParseErrorPolicy {
    /// Propagate the error to the host.
    #[default]
    Fail,
    /// Log it and treat the poll as an empty batch. The offset does not move, so the same upstream
    /// position is requested again.
    Skip,
}

impl FromStr for ParseErrorPolicy {
    type Err = Error;

    /// Parsed from the boolean `skip errors` flag.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "true" => Ok(ParseErrorPolicy::Skip),
            "false" => Ok(ParseErrorPolicy::Fail),
            other => Err(Error::Config(format!(
                "expected true or false for parse error policy, got {other}"
            ))),
        }
    }
}

impl fmt::Display for ParseErrorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseErrorPolicy::Fail => write!(f, "fail"),
            ParseErrorPolicy::Skip => write!(f, "skip"),
        }
    }
}
