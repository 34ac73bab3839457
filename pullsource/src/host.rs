//! Minimal host around the polling coordinator: it appends every delivered record to a sink as a
//! JSON line, acknowledges it once written, and periodically commits the acknowledged offset to
//! the checkpoint file.

use std::io::Write;
use std::time::Duration;

use pullsource_core::{
    CommitHandle, Error, Fetcher, Offset, PollingCoordinator, RecordMapper, ResponseParser, Result,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::checkpoint::FileCheckpointStore;

pub(crate) struct HostConfig {
    pub(crate) commit_interval: Duration,
    /// Pause before polling again after a transient failure.
    pub(crate) retry_interval: Duration,
}

/// Polls until `cancel` fires or a non-retriable error occurs. The last acknowledged offset is
/// committed and written before returning.
pub(crate) async fn run<F, P, M, W>(
    mut coordinator: PollingCoordinator<F, P, M>,
    store: FileCheckpointStore,
    sink: &mut W,
    config: HostConfig,
    cancel: CancellationToken,
) -> Result<Offset>
where
    F: Fetcher,
    P: ResponseParser,
    M: RecordMapper,
    W: Write,
{
    let committer = start_committer(
        coordinator.commit_handle(),
        store.clone(),
        config.commit_interval,
        cancel.clone(),
    );

    let outcome = poll_loop(&mut coordinator, sink, config.retry_interval, &cancel).await;

    // stop the committer too when the loop ended on an error
    coordinator.stop();
    if let Err(e) = committer.await {
        error!(?e, "Committer task failed");
    }

    let offset = coordinator.commit();
    store.write(&offset).await?;
    info!(%offset, "Final offset committed");

    outcome.map(|_| offset)
}

async fn poll_loop<F, P, M, W>(
    coordinator: &mut PollingCoordinator<F, P, M>,
    sink: &mut W,
    retry_interval: Duration,
    cancel: &CancellationToken,
) -> Result<()>
where
    F: Fetcher,
    P: ResponseParser,
    M: RecordMapper,
    W: Write,
{
    while !cancel.is_cancelled() {
        let records = match coordinator.poll().await {
            Ok(records) => records,
            Err(Error::Cancelled) => break,
            Err(e) if e.is_retriable() => {
                warn!(?e, ?retry_interval, "Poll failed, retrying");
                tokio::select! {
                    _ = tokio::time::sleep(retry_interval) => continue,
                    _ = cancel.cancelled() => break,
                }
            }
            Err(e) => return Err(e),
        };

        for record in records {
            serde_json::to_writer(&mut *sink, &record)
                .map_err(|e| Error::Other(format!("Failed to write record: {e}")))?;
            writeln!(sink).map_err(|e| Error::Other(format!("Failed to write record: {e}")))?;
            sink.flush()
                .map_err(|e| Error::Other(format!("Failed to flush records: {e}")))?;
            coordinator.on_acknowledged(&record.position);
        }
    }
    Ok(())
}

fn start_committer(
    handle: CommitHandle,
    store: FileCheckpointStore,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut last_written: Option<Offset> = None;
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = cancel.cancelled() => return,
            }
            let offset = handle.commit();
            if last_written.as_ref() == Some(&offset) {
                continue;
            }
            match store.write(&offset).await {
                Ok(()) => last_written = Some(offset),
                Err(e) => error!(?e, "Failed to write checkpoint, will retry on next tick"),
            }
        }
    })
}
