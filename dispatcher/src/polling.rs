//! Polling loop: fetch a batch since the cursor, dispatch it in order, advance the cursor.

use std::sync::Arc;
use std::time::Duration;

use nethelper_core::{Event, UpdateSource};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::dispatcher::Dispatcher;

#[derive(Debug, Clone)]
pub struct PollingConfig {
    /// Long-poll wait used when no fixed interval is set.
    pub long_poll_wait: Duration,
    /// Max events per fetch.
    pub limit: u8,
    /// Fixed pause between polls. When set, fetches do not wait for events.
    pub interval: Option<Duration>,
    /// Pause after a failed fetch before retrying.
    pub retry_delay: Duration,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            long_poll_wait: Duration::from_secs(50),
            limit: 100,
            interval: None,
            retry_delay: Duration::from_secs(2),
        }
    }
}

impl PollingConfig {
    /// Wait passed to each fetch: zero when a fixed interval is set.
    pub fn fetch_wait(&self) -> Duration {
        if self.interval.is_some() {
            Duration::ZERO
        } else {
            self.long_poll_wait
        }
    }
}

/// Cursor after a batch: one past the highest sequence seen, never lower than `cursor`.
pub fn next_cursor(cursor: i64, events: &[Event]) -> i64 {
    events
        .iter()
        .map(|e| e.sequence.saturating_add(1))
        .fold(cursor, i64::max)
}

/// Runs until `shutdown` is cancelled and returns the last cursor.
///
/// Fetch failures are retried forever after `retry_delay`. A pending fetch or sleep is abandoned
/// on shutdown; a dispatch in progress always completes, and the token is checked between events.
#[instrument(skip(source, dispatcher, config, shutdown))]
pub async fn run_polling(
    source: Arc<dyn UpdateSource>,
    dispatcher: &Dispatcher,
    config: PollingConfig,
    shutdown: CancellationToken,
) -> i64 {
    let mut cursor: i64 = 0;
    let wait = config.fetch_wait();
    info!(
        wait_secs = wait.as_secs(),
        limit = config.limit,
        interval_secs = ?config.interval.map(|d| d.as_secs()),
        handlers = ?dispatcher.handler_names(),
        "step: polling started"
    );

    'poll: loop {
        let fetched = tokio::select! {
            _ = shutdown.cancelled() => break 'poll,
            result = source.fetch(cursor, wait, config.limit) => result,
        };

        let events = match fetched {
            Ok(events) => events,
            Err(e) => {
                warn!(cursor = cursor, error = %e, "step: fetch failed, backing off");
                tokio::select! {
                    _ = shutdown.cancelled() => break 'poll,
                    _ = tokio::time::sleep(config.retry_delay) => continue 'poll,
                }
            }
        };

        let advanced = next_cursor(cursor, &events);
        debug!(
            cursor = cursor,
            next_cursor = advanced,
            batch = events.len(),
            "step: batch fetched"
        );
        cursor = advanced;

        for event in &events {
            let outcome = dispatcher.dispatch(event).await;
            debug!(update_id = event.sequence, outcome = ?outcome, "Event dispatched");
            if shutdown.is_cancelled() {
                break 'poll;
            }
        }

        if let Some(interval) = config.interval {
            tokio::select! {
                _ = shutdown.cancelled() => break 'poll,
                _ = tokio::time::sleep(interval) => {}
            }
        }
    }

    info!(cursor = cursor, "step: polling stopped");
    cursor
}
