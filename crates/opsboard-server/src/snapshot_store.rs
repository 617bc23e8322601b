use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;

use opsboard_core::aggregate::{AggregateError, Aggregator};
use opsboard_core::facts::{DeltaEvent, Fact};
use opsboard_core::snapshot::{DashboardSnapshot, SnapshotKey};

use crate::collaborators::SnapshotSeed;

struct Slot {
    snapshot: DashboardSnapshot,
    last_access: Instant,
    seeded: bool,
}

/// Authoritative in-memory snapshots, one per (date, backlog) key.
///
/// The outer map lock is only held to find or insert a key's slot. All work
/// on a snapshot happens under that slot's own mutex, so merges for
/// different keys never wait on each other.
pub struct SnapshotStore {
    slots: RwLock<HashMap<SnapshotKey, Arc<Mutex<Slot>>>>,
    aggregator: Aggregator,
    seed: Arc<dyn SnapshotSeed>,
}

impl SnapshotStore {
    pub fn new(aggregator: Aggregator, seed: Arc<dyn SnapshotSeed>) -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
            aggregator,
            seed,
        }
    }

    async fn slot(&self, key: SnapshotKey) -> Arc<Mutex<Slot>> {
        if let Some(slot) = self.slots.read().await.get(&key) {
            return Arc::clone(slot);
        }
        let mut slots = self.slots.write().await;
        Arc::clone(slots.entry(key).or_insert_with(|| {
            Arc::new(Mutex::new(Slot {
                snapshot: DashboardSnapshot::empty(key),
                last_access: Instant::now(),
                seeded: false,
            }))
        }))
    }

    /// Run the seed loader once per slot. A failed load is logged and the
    /// slot continues from the empty snapshot.
    async fn ensure_seeded(&self, key: SnapshotKey, slot: &mut Slot) {
        if slot.seeded {
            return;
        }
        slot.seeded = true;
        match self.seed.load(key).await {
            Ok(Some(mut snapshot)) => {
                snapshot.as_of_date = key.date;
                snapshot.is_backlog = key.is_backlog;
                slot.snapshot = snapshot;
                tracing::debug!(%key, "Seeded snapshot");
            },
            Ok(None) => {},
            Err(e) => {
                tracing::warn!(%key, error = %e, "Snapshot seed failed, starting empty");
            },
        }
    }

    /// Create and seed `key` if it is not live yet, without cloning it.
    pub async fn warm(&self, key: SnapshotKey) {
        let slot = self.slot(key).await;
        let mut slot = slot.lock().await;
        self.ensure_seeded(key, &mut slot).await;
        slot.last_access = Instant::now();
    }

    /// Current value for `key`, creating (and seeding) it on first access.
    pub async fn get(&self, key: SnapshotKey) -> DashboardSnapshot {
        let slot = self.slot(key).await;
        let mut slot = slot.lock().await;
        self.ensure_seeded(key, &mut slot).await;
        slot.last_access = Instant::now();
        slot.snapshot.clone()
    }

    /// Fold `fact` into the snapshot for `key`.
    ///
    /// A rejected fact leaves the stored snapshot untouched.
    pub async fn merge(
        &self,
        key: SnapshotKey,
        fact: &Fact,
    ) -> Result<(DashboardSnapshot, DeltaEvent), AggregateError> {
        let slot = self.slot(key).await;
        let mut slot = slot.lock().await;
        self.ensure_seeded(key, &mut slot).await;
        slot.last_access = Instant::now();
        let delta = self.aggregator.apply(&mut slot.snapshot, fact)?;
        Ok((slot.snapshot.clone(), delta))
    }

    /// Drop snapshots nobody has read or merged into for `max_idle`.
    /// Slots that are currently in use are skipped. Returns how many were evicted.
    pub async fn evict_idle(&self, max_idle: Duration) -> usize {
        let mut slots = self.slots.write().await;
        let before = slots.len();
        slots.retain(|key, slot| {
            if Arc::strong_count(slot) > 1 {
                return true;
            }
            let keep = match slot.try_lock() {
                Ok(guard) => guard.last_access.elapsed() < max_idle,
                Err(_) => true,
            };
            if !keep {
                tracing::debug!(%key, "Evicting idle snapshot");
            }
            keep
        });
        before - slots.len()
    }

    /// Number of snapshots currently held.
    pub async fn len(&self) -> usize {
        self.slots.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.slots.read().await.is_empty()
    }

    pub async fn live_keys(&self) -> Vec<SnapshotKey> {
        let mut keys: Vec<SnapshotKey> = self.slots.read().await.keys().copied().collect();
        keys.sort();
        keys
    }
}
