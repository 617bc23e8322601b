//! Persistence hooks the server calls out to.
//!
//! Both are optional: the defaults keep everything in memory.

use futures::future::BoxFuture;

use opsboard_core::snapshot::{DashboardSnapshot, RosterStatus, SnapshotKey, UserId, UserType};

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct CollaboratorError(pub String);

/// Initial read path for a snapshot key that is not cached yet.
pub trait SnapshotSeed: Send + Sync {
    /// `Ok(None)` means "nothing stored"; the store starts from an empty snapshot.
    fn load(&self, key: SnapshotKey)
    -> BoxFuture<'_, Result<Option<DashboardSnapshot>, CollaboratorError>>;
}

/// Durable record of roster status changes.
pub trait StatusSink: Send + Sync {
    fn record_status(
        &self,
        user_id: UserId,
        user_type: UserType,
        status: RosterStatus,
    ) -> BoxFuture<'_, Result<(), CollaboratorError>>;
}

pub struct NoSeed;

impl SnapshotSeed for NoSeed {
    fn load(
        &self,
        _key: SnapshotKey,
    ) -> BoxFuture<'_, Result<Option<DashboardSnapshot>, CollaboratorError>> {
        Box::pin(async { Ok(None) })
    }
}

pub struct NoopSink;

impl StatusSink for NoopSink {
    fn record_status(
        &self,
        _user_id: UserId,
        _user_type: UserType,
        _status: RosterStatus,
    ) -> BoxFuture<'_, Result<(), CollaboratorError>> {
        Box::pin(async { Ok(()) })
    }
}
