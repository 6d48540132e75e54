use crate::services::metrics::record_swept;
use crate::services::DocumentStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Periodically deletes stored documents older than the retention period.
pub struct RetentionSweeper {
    store: Arc<dyn DocumentStore>,
    retention: Duration,
    interval: Duration,
    shutdown_token: CancellationToken,
}

impl RetentionSweeper {
    pub fn new(store: Arc<dyn DocumentStore>, retention: Duration, interval: Duration) -> Self {
        Self {
            store,
            retention,
            interval,
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Token that stops [`RetentionSweeper::start`] when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    pub async fn start(self) {
        if self.retention.is_zero() {
            tracing::info!("Retention sweeper disabled by configuration");
            return;
        }

        tracing::info!(
            retention_secs = self.retention.as_secs(),
            interval_secs = self.interval.as_secs(),
            "Starting retention sweeper"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.shutdown_token.cancelled() => {
                    tracing::info!("Retention sweeper shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    self.sweep_once().await;
                }
            }
        }
    }

    /// Run one sweep, returning how many documents were removed.
    pub async fn sweep_once(&self) -> usize {
        match self.store.sweep(self.retention).await {
            Ok(0) => 0,
            Ok(removed) => {
                record_swept(removed);
                tracing::info!(removed, "Deleted expired documents");
                removed
            }
            Err(e) => {
                tracing::error!(error = %e, "Retention sweep failed");
                0
            }
        }
    }
}

/// How often to sweep: a tenth of the retention period, between one minute
/// and one hour.
pub fn sweep_interval(retention: Duration) -> Duration {
    (retention / 10).clamp(Duration::from_secs(60), Duration::from_secs(3600))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DocumentId, StoredDocument};
    use async_trait::async_trait;
    use service_core::error::AppError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingStore {
        sweeps: AtomicUsize,
    }

    #[async_trait]
    impl DocumentStore for CountingStore {
        async fn put(&self, _bytes: Vec<u8>) -> Result<StoredDocument, AppError> {
            Err(AppError::ServiceUnavailable)
        }

        async fn resolve(&self, _reference: &str) -> Option<StoredDocument> {
            None
        }

        async fn get(&self, _id: DocumentId) -> Result<Option<Vec<u8>>, AppError> {
            Ok(None)
        }

        async fn delete(&self, _id: DocumentId) -> Result<bool, AppError> {
            Ok(false)
        }

        async fn sweep(&self, _older_than: Duration) -> Result<usize, AppError> {
            Ok(self.sweeps.fetch_add(1, Ordering::SeqCst) + 1)
        }
    }

    #[test]
    fn interval_is_clamped() {
        assert_eq!(sweep_interval(Duration::from_secs(60)), Duration::from_secs(60));
        assert_eq!(
            sweep_interval(Duration::from_secs(72 * 3600)),
            Duration::from_secs(3600)
        );
        assert_eq!(
            sweep_interval(Duration::from_secs(5000)),
            Duration::from_secs(500)
        );
    }

    #[tokio::test]
    async fn disabled_sweeper_returns_immediately() {
        let store = Arc::new(CountingStore::default());
        let sweeper = RetentionSweeper::new(store.clone(), Duration::ZERO, Duration::from_secs(1));

        sweeper.start().await;

        assert_eq!(store.sweeps.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn sweeps_on_each_tick_until_cancelled() {
        let store = Arc::new(CountingStore::default());
        let sweeper = RetentionSweeper::new(
            store.clone(),
            Duration::from_secs(3600),
            Duration::from_secs(60),
        );
        let token = sweeper.shutdown_token();
        let handle = tokio::spawn(sweeper.start());

        // First tick fires immediately, then every 60s.
        tokio::time::sleep(Duration::from_secs(130)).await;
        token.cancel();
        handle.await.unwrap();

        assert_eq!(store.sweeps.load(Ordering::SeqCst), 3);
    }
}
