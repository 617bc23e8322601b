use std::sync::atomic::Ordering;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::Serialize;

use crate::state::AppState;

/// Structured health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub connections: ConnectionInfo,
    pub snapshots: SnapshotInfo,
}

#[derive(Serialize)]
pub struct ConnectionInfo {
    pub websocket: usize,
    pub sessions: usize,
}

#[derive(Serialize)]
pub struct SnapshotInfo {
    pub live: usize,
    pub keys: Vec<String>,
}

/// Returns server status, connection counts, and cached snapshot keys.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let websocket = state.ws_connection_count.load(Ordering::Relaxed);
    let sessions = state.hub.read().await.session_count();
    let keys: Vec<String> = state
        .store
        .live_keys()
        .await
        .iter()
        .map(ToString::to_string)
        .collect();

    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        connections: ConnectionInfo {
            websocket,
            sessions,
        },
        snapshots: SnapshotInfo {
            live: keys.len(),
            keys,
        },
    })
}

/// Ready while the dispatcher is still consuming updates.
pub async fn readiness_check(State(state): State<AppState>) -> (StatusCode, &'static str) {
    if state.ingest_tx.is_closed() {
        return (StatusCode::SERVICE_UNAVAILABLE, "not ready: dispatcher stopped");
    }
    (StatusCode::OK, "ready")
}
