//! Bounds the request rate against the upstream source. Every poll cycle waits until the configured
//! interval has elapsed since the previous cycle. The adaptable variant switches to a shorter
//! catch-up interval while the offset lags behind wall-clock time.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct Throttler {
    tail_interval: Duration,
    catchup_interval: Option<Duration>,
    /// interval picked for the upcoming cycle
    interval: Duration,
    last_poll: Option<Instant>,
}

impl Throttler {
    pub fn fixed(interval: Duration) -> Self {
        Throttler {
            tail_interval: interval,
            catchup_interval: None,
            interval,
            last_poll: None,
        }
    }

    pub fn adaptable(tail_interval: Duration, catchup_interval: Duration) -> Self {
        Throttler {
            catchup_interval: Some(catchup_interval),
            ..Throttler::fixed(tail_interval)
        }
    }

    /// Time left before the next cycle may start. The first cycle never waits.
    pub fn remaining(&self) -> Duration {
        match self.last_poll {
            Some(last_poll) => self.interval.saturating_sub(last_poll.elapsed()),
            None => Duration::ZERO,
        }
    }

    /// Waits for the remaining interval, then starts a new one. `last_zero` is the point in time the
    /// offset is at, used to decide whether we are catching up.
    pub async fn throttle(
        &mut self,
        last_zero: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let remaining = self.remaining();
        if !remaining.is_zero() {
            debug!(?remaining, "Throttling poll");
            sleep_or_cancel(remaining, cancel).await?;
        }
        self.reset(last_zero);
        Ok(())
    }

    fn reset(&mut self, last_zero: DateTime<Utc>) {
        self.last_poll = Some(Instant::now());
        let lag = (Utc::now() - last_zero).to_std().unwrap_or(Duration::ZERO);
        self.interval = match self.catchup_interval {
            Some(catchup) if lag > self.tail_interval => catchup,
            _ => self.tail_interval,
        };
    }
}

/// Sleeps for `duration` unless `cancel` fires first.
pub(crate) async fn sleep_or_cancel(duration: Duration, cancel: &CancellationToken) -> Result<()> {
    tokio::select! {
        _ = tokio::time::sleep(duration) => Ok(()),
        _ = cancel.cancelled() => Err(Error::Cancelled),
    }
}
