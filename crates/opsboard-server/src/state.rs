use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::RwLock;

use opsboard_core::aggregate::Aggregator;
use opsboard_core::ingest::{self, IngestReceiver, IngestSender};

use crate::auth::AuthConfig;
use crate::collaborators::{NoSeed, NoopSink, SnapshotSeed, StatusSink};
use crate::config::ServerConfig;
use crate::hub::Hub;
use crate::snapshot_store::SnapshotStore;

pub type SharedHub = Arc<RwLock<Hub>>;

/// External collaborators the server is wired with.
#[derive(Clone)]
pub struct Services {
    pub seed: Arc<dyn SnapshotSeed>,
    pub status_sink: Arc<dyn StatusSink>,
}

impl Default for Services {
    fn default() -> Self {
        Self {
            seed: Arc::new(NoSeed),
            status_sink: Arc::new(NoopSink),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub hub: SharedHub,
    pub store: Arc<SnapshotStore>,
    pub ingest_tx: IngestSender,
    pub status_sink: Arc<dyn StatusSink>,
    pub auth: AuthConfig,
    pub ws_connection_count: Arc<AtomicUsize>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    /// Build the shared state. The returned receiver feeds the dispatcher.
    pub fn new(config: ServerConfig, services: Services) -> (Self, IngestReceiver) {
        let auth = AuthConfig {
            bearer_token: config.auth.bearer_token.clone(),
        };
        let aggregator = Aggregator::new(Arc::new(config.status_table()));
        let (ingest_tx, ingest_rx) = ingest::channel(config.limits.ingest_queue_capacity);
        let state = Self {
            hub: Arc::new(RwLock::new(Hub::new())),
            store: Arc::new(SnapshotStore::new(aggregator, services.seed)),
            ingest_tx,
            status_sink: services.status_sink,
            auth,
            ws_connection_count: Arc::new(AtomicUsize::new(0)),
            config: Arc::new(config),
        };
        (state, ingest_rx)
    }
}

/// Counts a live connection for as long as it is held.
pub struct ConnectionGuard {
    counter: Arc<AtomicUsize>,
}

impl ConnectionGuard {
    pub fn new(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::Relaxed);
        Self { counter }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_guard_tracks_count() {
        let counter = Arc::new(AtomicUsize::new(0));
        let a = ConnectionGuard::new(Arc::clone(&counter));
        let b = ConnectionGuard::new(Arc::clone(&counter));
        assert_eq!(counter.load(Ordering::Relaxed), 2);
        drop(a);
        assert_eq!(counter.load(Ordering::Relaxed), 1);
        drop(b);
        assert_eq!(counter.load(Ordering::Relaxed), 0);
    }
}
