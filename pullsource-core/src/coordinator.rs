//! The poll → deliver → acknowledge → commit cycle.
//!
//! [PollingCoordinator::poll] runs on the host's poll thread: it throttles, fetches from the
//! current offset, sorts and filters the batch, bumps the sequence counter when something new was
//! found (or sleeps when not) and installs a fresh [ConfirmationWindow] over exactly the delivered
//! batch. Acknowledgements and commits come from other threads through a [CommitHandle], which only
//! shares the committed offset and the active window with the poll thread.
//!
//! The offset, the sequence counter and the window sit behind one lock. Installing a new window and
//! bumping the counter happen under a single write, so a commit never sees one without the other.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::SourceConfig;
use crate::error::Result;
use crate::filter::RecordFilter;
use crate::offset::{Offset, Position};
use crate::record::{Item, RawResponse, SourceRecord};
use crate::sorter::RecordSorter;
use crate::source::{CheckpointStore, Fetcher, ParseErrorPolicy, RecordMapper, ResponseParser};
use crate::throttler::{Throttler, sleep_or_cancel};
use crate::window::ConfirmationWindow;

#[derive(Debug)]
struct DeliveryState {
    /// committed offset, also the position the next poll fetches from
    offset: Offset,
    /// sequence counter stamped into delivered positions
    index: u64,
    window: Arc<ConfirmationWindow>,
}

/// Acknowledgement and commit side of the coordinator. Cheap to clone and safe to use from any
/// thread.
#[derive(Debug, Clone)]
pub struct CommitHandle {
    state: Arc<RwLock<DeliveryState>>,
}

impl CommitHandle {
    fn new(offset: Offset) -> Self {
        let index = offset.index();
        CommitHandle {
            state: Arc::new(RwLock::new(DeliveryState {
                offset,
                index,
                window: Arc::new(ConfirmationWindow::default()),
            })),
        }
    }

    /// Called by the host once the record at `position` has been appended. Positions that are not
    /// part of the active window are ignored.
    pub fn on_acknowledged(&self, position: &Position) {
        let (index, window) = {
            let state = self.state.read();
            (state.index, Arc::clone(&state.window))
        };
        let position = position.clone().stamped(index);
        if window.confirm(&position) {
            debug!(?position, "Acknowledged record");
        } else {
            debug!(?position, "Ignoring acknowledgement outside of the active window");
        }
    }

    /// Moves the committed offset to the end of the acknowledged prefix of the active window and
    /// returns it. Without progress the previous offset is kept, so calling it repeatedly is safe.
    pub fn commit(&self) -> Offset {
        let mut state = self.state.write();
        if let Some(watermark) = state.window.low_watermark() {
            state.offset = Offset::from(watermark.confirmed());
        }
        debug!(offset = %state.offset, "Committed offset");
        state.offset.clone()
    }

    /// Snapshot of the committed offset.
    pub fn offset(&self) -> Offset {
        self.state.read().offset.clone()
    }

    /// Stamps the next sequence counter into the offset and into every record, and scopes a new
    /// window to exactly these records. Returns the new counter.
    fn advance(&self, records: &mut [SourceRecord]) -> u64 {
        let mut state = self.state.write();
        state.index += 1;
        let index = state.index;
        state.offset = state.offset.with_index(index);
        for record in records.iter_mut() {
            record.position.stamp(index);
        }
        state.window = Arc::new(ConfirmationWindow::new(
            records.iter().map(|r| r.position.clone()),
        ));
        index
    }

    fn reset_window(&self) {
        self.state.write().window = Arc::new(ConfirmationWindow::default());
    }
}

pub struct PollingCoordinator<F, P, M> {
    fetcher: F,
    parser: P,
    mapper: M,
    sorter: RecordSorter,
    filter: RecordFilter,
    parse_error_policy: ParseErrorPolicy,
    throttler: Throttler,
    sleep_interval: Duration,
    handle: CommitHandle,
    cancel: CancellationToken,
}

impl<F, P, M> PollingCoordinator<F, P, M>
where
    F: Fetcher,
    P: ResponseParser,
    M: RecordMapper,
{
    /// Restores the offset from the checkpoint store (falling back to the configured initial
    /// offset) and builds a coordinator ready to poll. `cancel` interrupts throttling and sleeping.
    pub async fn start<S: CheckpointStore>(
        config: SourceConfig,
        fetcher: F,
        parser: P,
        mapper: M,
        store: &S,
        cancel: CancellationToken,
    ) -> Result<Self> {
        let restored = store.read().await?;
        let offset = Offset::restore_or(restored, &config.initial_offset);
        info!(
            offset = %offset,
            sorter = %config.sorter,
            filter = %config.filter,
            parse_error_policy = %config.parse_error_policy,
            "Starting polling coordinator"
        );

        Ok(PollingCoordinator {
            fetcher,
            parser,
            mapper,
            sorter: config.sorter,
            filter: config.filter,
            parse_error_policy: config.parse_error_policy,
            throttler: config.throttler(),
            sleep_interval: config.sleep_interval,
            handle: CommitHandle::new(offset),
            cancel,
        })
    }

    /// Runs one poll cycle and returns the unseen records in send order. Blocks while throttling
    /// or after an empty batch, returns [crate::Error::Cancelled] if stopped meanwhile.
    pub async fn poll(&mut self) -> Result<Vec<SourceRecord>> {
        let offset = self.handle.offset();
        self.throttler
            .throttle(offset.timestamp().unwrap_or_else(Utc::now), &self.cancel)
            .await?;

        let response = self.fetcher.fetch(&offset).await?;
        let items = self.parse(response)?;
        let fetched = items.len();

        let records: Vec<SourceRecord> = items.into_iter().map(|i| self.mapper.map(i)).collect();
        let mut unseen = self
            .filter
            .create(&offset)
            .retain_unseen(self.sorter.sort(records));

        info!(
            offset = %offset,
            unseen = unseen.len(),
            fetched,
            "Poll yields new records"
        );

        if unseen.is_empty() {
            sleep_or_cancel(self.sleep_interval, &self.cancel).await?;
            self.handle.reset_window();
        } else {
            let index = self.handle.advance(&mut unseen);
            debug!(index, window = unseen.len(), "Opened confirmation window");
        }
        Ok(unseen)
    }

    fn parse(&self, response: RawResponse) -> Result<Vec<Item>> {
        match self.parser.parse(response) {
            Ok(items) => Ok(items),
            Err(e) if self.parse_error_policy == ParseErrorPolicy::Skip => {
                warn!(?e, "Error parsing response (skipped and continue polling)");
                Ok(vec![])
            }
            Err(e) => Err(e),
        }
    }

    pub fn on_acknowledged(&self, position: &Position) {
        self.handle.on_acknowledged(position);
    }

    pub fn commit(&self) -> Offset {
        self.handle.commit()
    }

    /// Handle for the acknowledgement and commit threads.
    pub fn commit_handle(&self) -> CommitHandle {
        self.handle.clone()
    }

    /// Committed offset snapshot.
    pub fn offset(&self) -> Offset {
        self.handle.offset()
    }

    /// Interrupts any ongoing or future throttle/sleep.
    pub fn stop(&self) {
        info!("Stopping polling coordinator");
        self.cancel.cancel();
    }
}
