//! Polling and delivery-tracking core of a pull-based ingestion source.
//!
//! The [PollingCoordinator] repeatedly fetches from the upstream source at the current [Offset],
//! hands the records that are new since that offset to the host, and only moves the committed
//! offset once every record up to a point has been acknowledged. Acknowledgements may arrive out of
//! order and from other threads, see [window] for how the committed position is computed.
//!
//! Fetching, decoding, mapping and durable checkpoint storage are collaborators behind the traits
//! in [source].

pub use crate::config::SourceConfig;
pub use crate::coordinator::{CommitHandle, PollingCoordinator};
pub use crate::error::{Error, Result};
pub use crate::filter::RecordFilter;
pub use crate::offset::{Offset, OffsetMap, OffsetValue, Position};
pub use crate::record::{Item, RawResponse, SourceRecord};
pub use crate::sorter::RecordSorter;
pub use crate::source::{CheckpointStore, Fetcher, ParseErrorPolicy, RecordMapper, ResponseParser};
pub use crate::throttler::Throttler;

mod error;

/// Host settings for the core.
pub mod config;

/// Offset and per-record Position, the units of checkpoint state.
pub mod offset;

/// Responses, items and the records delivered to the host.
pub mod record;

/// Deterministic ordering of a fetched batch.
pub mod sorter;

/// Removal of records already represented by the committed offset.
pub mod filter;

/// Low watermark over out-of-order acknowledgements.
pub mod window;

/// Request rate control between polls.
pub mod throttler;

/// Collaborator capabilities consumed by the coordinator.
pub mod source;

/// The poll, acknowledge and commit state machine.
mod coordinator;

#[cfg(test)]
pub(crate) mod test_utils;
