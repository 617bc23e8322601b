//! Envelope used by update sources to hand work to the dispatcher.
//!
//! Sources never touch snapshots directly. They push an [`Ingest`] into a
//! bounded channel and, when they need to acknowledge upstream, wait on the
//! attached reply for the outcome.

use std::fmt;

use tokio::sync::{mpsc, oneshot};

use crate::aggregate::AggregateError;
use crate::facts::Update;

/// Where an update came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    Queue(String),
    ChangeFeed,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Queue(name) => write!(f, "queue:{name}"),
            Self::ChangeFeed => write!(f, "changefeed"),
        }
    }
}

/// Failure to get an update applied.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IngestError {
    #[error("dispatcher is not running")]
    DispatcherGone,
    #[error("update rejected: {0}")]
    Rejected(#[from] AggregateError),
}

/// One unit of work for the dispatcher.
#[derive(Debug)]
pub struct Ingest {
    pub origin: Origin,
    pub update: Update,
    pub reply: Option<oneshot::Sender<Result<(), IngestError>>>,
}

pub type IngestSender = mpsc::Sender<Ingest>;
pub type IngestReceiver = mpsc::Receiver<Ingest>;

pub fn channel(capacity: usize) -> (IngestSender, IngestReceiver) {
    mpsc::channel(capacity)
}

/// Submit `update` and wait until it has been merged and broadcast.
pub async fn submit(tx: &IngestSender, origin: Origin, update: Update) -> Result<(), IngestError> {
    let (reply_tx, reply_rx) = oneshot::channel();
    tx.send(Ingest {
        origin,
        update,
        reply: Some(reply_tx),
    })
    .await
    .map_err(|_| IngestError::DispatcherGone)?;
    reply_rx.await.map_err(|_| IngestError::DispatcherGone)?
}

impl Ingest {
    /// Report the outcome to the submitter, if it is still waiting.
    pub fn complete(self, outcome: Result<(), IngestError>) {
        if let Some(reply) = self.reply {
            let _ = reply.send(outcome);
        }
    }
}
