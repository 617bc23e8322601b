use opsboard_core::ingest::{IngestError, IngestSender, Origin, submit};

use crate::config::PollerConfig;
use crate::feed::{ChangeFeed, FeedError};
use crate::record::process_record;

/// Periodically drains a [`ChangeFeed`] into the dispatcher.
pub struct ChangeFeedPoller<F> {
    feed: F,
    config: PollerConfig,
}

impl<F: ChangeFeed> ChangeFeedPoller<F> {
    pub fn new(feed: F, config: PollerConfig) -> Self {
        Self { feed, config }
    }

    /// Poll until the dispatcher goes away. A failed cycle is logged and
    /// retried after the error backoff.
    pub async fn run(self, tx: IngestSender) {
        tracing::info!(
            interval_ms = self.config.poll_interval.as_millis() as u64,
            "Change-feed poller running"
        );
        loop {
            if tx.is_closed() {
                tracing::info!("Dispatcher gone, change-feed poller stopping");
                break;
            }
            let pause = match self.poll_once(&tx).await {
                Ok(_) => self.config.poll_interval,
                Err(e) => {
                    tracing::error!(error = %e, "Error in change-feed poll cycle");
                    self.config.error_backoff
                },
            };
            tokio::time::sleep(pause).await;
        }
    }

    /// Fetch and apply every pending record once. Record-level failures are
    /// logged and skipped. Returns how many records were applied.
    pub async fn poll_once(&self, tx: &IngestSender) -> Result<usize, FeedError> {
        let records = self.feed.fetch_pending().await?;
        let mut applied = 0;
        for record in &records {
            tracing::debug!(message_type = %record.message_type, "Processing change record");
            let update = match process_record(record) {
                Ok(Some(update)) => update,
                Ok(None) => {
                    tracing::warn!(
                        message_type = %record.message_type,
                        "Unknown change record type"
                    );
                    continue;
                },
                Err(e) => {
                    tracing::error!(error = %e, "Error processing change record");
                    continue;
                },
            };
            match submit(tx, Origin::ChangeFeed, update).await {
                Ok(()) => applied += 1,
                Err(IngestError::DispatcherGone) => {
                    return Err(FeedError::Unavailable("dispatcher is not running".to_string()));
                },
                Err(e) => {
                    tracing::warn!(message_type = %record.message_type, error = %e, "Change record not applied");
                },
            }
        }
        Ok(applied)
    }
}
