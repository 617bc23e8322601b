//! The single consumer of source updates.
//!
//! Each update is merged and then broadcast before the next one is taken, so
//! every session observes the same total order of pushes.

use axum::extract::ws::Utf8Bytes;

use opsboard_core::facts::{DeltaEvent, RefreshReason, Update};
use opsboard_core::ingest::{Ingest, IngestError, IngestReceiver};
use opsboard_core::net::messages::{MONITORING_GROUP, ServerMessage};
use opsboard_core::net::protocol::encode_server_message;

use crate::state::AppState;

/// Drain `rx` until every sender is gone.
pub async fn run(state: AppState, mut rx: IngestReceiver) {
    while let Some(ingest) = rx.recv().await {
        let outcome = handle(&state, &ingest).await;
        ingest.complete(outcome);
    }
    tracing::info!("Ingest channel closed, dispatcher stopping");
}

async fn handle(state: &AppState, ingest: &Ingest) -> Result<(), IngestError> {
    let origin = &ingest.origin;
    match &ingest.update {
        Update::Fact { key, fact } => {
            let (_, delta) = state.store.merge(*key, fact).await.map_err(|e| {
                tracing::warn!(
                    %origin,
                    %key,
                    fact = fact.kind.label(),
                    error = %e,
                    "Rejected fact"
                );
                e
            })?;
            persist_status(state, &delta).await;
            broadcast(state, &ServerMessage::from(delta)).await;
        },
        Update::Refresh { key, reason } => {
            if let RefreshReason::PerformanceUpdate {
                user_id,
                user_type,
                completed,
            } = reason
            {
                tracing::info!(
                    %origin,
                    user_id,
                    %user_type,
                    completed,
                    "Performance update, refreshing dashboard"
                );
            }
            let snapshot = state.store.get(*key).await;
            broadcast(state, &ServerMessage::from(snapshot)).await;
        },
    }
    tracing::debug!(%origin, update = ingest.update.label(), "Update applied");
    Ok(())
}

async fn persist_status(state: &AppState, delta: &DeltaEvent) {
    let DeltaEvent::UserStatus(change) = delta else {
        return;
    };
    if let Err(e) = state
        .status_sink
        .record_status(change.user_id, change.user_type, change.status)
        .await
    {
        tracing::warn!(
            user_id = change.user_id,
            user_type = %change.user_type,
            error = %e,
            "Failed to persist status change"
        );
    }
}

async fn broadcast(state: &AppState, msg: &ServerMessage) {
    let frame = match encode_server_message(msg) {
        Ok(text) => Utf8Bytes::from(text),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode broadcast");
            return;
        },
    };
    let delivered = state
        .hub
        .write()
        .await
        .broadcast_to_group(MONITORING_GROUP, &frame);
    tracing::trace!(delivered, "Broadcast sent");
}
