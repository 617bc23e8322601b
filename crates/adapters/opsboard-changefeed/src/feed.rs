use std::future::Future;

use crate::record::ChangeRecord;

#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("invalid feed function name: {0:?}")]
    InvalidFunction(String),
    #[error("{0}")]
    Unavailable(String),
}

/// A store that hands out pending change records.
///
/// Each call returns every pending record and marks them consumed, so a record
/// is delivered at most once.
pub trait ChangeFeed: Send + Sync {
    fn fetch_pending(&self) -> impl Future<Output = Result<Vec<ChangeRecord>, FeedError>> + Send;
}
