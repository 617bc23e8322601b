use std::sync::Arc;
use std::sync::atomic::Ordering;

use axum::extract::ws::{Message, Utf8Bytes, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use opsboard_core::net::messages::{ClientMessage, RequestDashboardDataMsg, ServerMessage};
use opsboard_core::net::protocol::{MAX_MESSAGE_SIZE, decode_client_message, encode_server_message};
use opsboard_core::snapshot::SnapshotKey;

use crate::hub::SessionId;
use crate::state::{AppState, ConnectionGuard};

const RETRIEVE_FAILED: &str = "Failed to retrieve dashboard data";

pub async fn ws_handler(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> Result<Response, StatusCode> {
    let max_ws = state.config.limits.max_ws_connections;
    let current = state.ws_connection_count.load(Ordering::Relaxed);
    if current >= max_ws {
        tracing::warn!(current, max = max_ws, "WS connection limit reached");
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }

    Ok(ws
        .max_message_size(MAX_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_socket(socket, state))
        .into_response())
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let _guard = ConnectionGuard::new(Arc::clone(&state.ws_connection_count));
    let (ws_sender, mut ws_receiver) = socket.split();
    let (tx, rx) = mpsc::channel::<Utf8Bytes>(state.config.limits.session_message_buffer);

    // Seeding may hit external storage; it must not run under the hub lock.
    let today = SnapshotKey::today();
    state.store.warm(today).await;

    // Register and queue the welcome snapshot under one hub write lock.
    // Broadcasts also take that lock, so no delta can be queued ahead of it.
    let session_id = {
        let mut hub = state.hub.write().await;
        let id = hub.register(tx);
        let snapshot = state.store.get(today).await;
        match encode_server_message(&ServerMessage::from(snapshot)) {
            Ok(text) => {
                hub.send_to(id, &Utf8Bytes::from(text));
            },
            Err(e) => tracing::error!(session_id = id, error = %e, "Failed to encode welcome snapshot"),
        }
        id
    };
    tracing::info!(session_id, "Dashboard session connected");

    spawn_writer(ws_sender, rx);

    read_loop(&mut ws_receiver, &state, session_id).await;

    state.hub.write().await.deregister(session_id);
    tracing::info!(session_id, "Dashboard session disconnected");
}

fn spawn_writer(
    mut ws_sender: futures::stream::SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<Utf8Bytes>,
) {
    tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            if ws_sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });
}

/// Per-connection rate limiter (token bucket).
struct RateLimiter {
    tokens: f64,
    last_refill: tokio::time::Instant,
    max_tokens: f64,
    refill_rate: f64, // tokens per second
}

impl RateLimiter {
    fn new(max_tokens: f64, refill_rate: f64) -> Self {
        Self {
            tokens: max_tokens,
            last_refill: tokio::time::Instant::now(),
            max_tokens,
            refill_rate,
        }
    }

    /// Returns true if the message is allowed; false if rate-limited.
    fn allow(&mut self) -> bool {
        let now = tokio::time::Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.max_tokens);
        self.last_refill = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

async fn read_loop(
    ws_receiver: &mut futures::stream::SplitStream<WebSocket>,
    state: &AppState,
    session_id: SessionId,
) {
    let rate = state.config.limits.ws_rate_limit_per_sec;
    let mut rate_limiter = RateLimiter::new(rate, rate);

    while let Some(Ok(msg)) = ws_receiver.next().await {
        let text = match msg {
            Message::Text(t) => t,
            Message::Close(_) => break,
            _ => continue,
        };

        if !rate_limiter.allow() {
            tracing::warn!(session_id, "Rate limited");
            continue;
        }

        let client_msg = match decode_client_message(text.as_str()) {
            Ok(m) => m,
            Err(e) => {
                tracing::debug!(session_id, error = %e, "Ignoring undecodable frame");
                continue;
            },
        };

        match client_msg {
            ClientMessage::RequestDashboardData(req) => {
                request_dashboard_data(state, session_id, req).await;
            },
            ClientMessage::JoinMonitoringGroup(group) => {
                let result = state.hub.write().await.join_group(session_id, &group);
                match result {
                    Ok(()) => tracing::debug!(session_id, group = %group, "Joined group"),
                    Err(e) => reply(state, session_id, &ServerMessage::Error(e.to_string())).await,
                }
            },
            ClientMessage::LeaveMonitoringGroup(group) => {
                let result = state.hub.write().await.leave_group(session_id, &group);
                match result {
                    Ok(()) => tracing::debug!(session_id, group = %group, "Left group"),
                    Err(e) => reply(state, session_id, &ServerMessage::Error(e.to_string())).await,
                }
            },
        }
    }
}

/// Answer a snapshot request to the caller only.
async fn request_dashboard_data(
    state: &AppState,
    session_id: SessionId,
    req: RequestDashboardDataMsg,
) {
    let key = SnapshotKey::new(req.date, req.is_backlog);
    let snapshot = state.store.get(key).await;
    match encode_server_message(&ServerMessage::from(snapshot)) {
        Ok(text) => {
            state
                .hub
                .read()
                .await
                .send_to(session_id, &Utf8Bytes::from(text));
        },
        Err(e) => {
            tracing::error!(session_id, %key, error = %e, "Error getting dashboard data");
            reply(state, session_id, &ServerMessage::Error(RETRIEVE_FAILED.to_string())).await;
        },
    }
}

async fn reply(state: &AppState, session_id: SessionId, msg: &ServerMessage) {
    match encode_server_message(msg) {
        Ok(text) => {
            state
                .hub
                .read()
                .await
                .send_to(session_id, &Utf8Bytes::from(text));
        },
        Err(e) => tracing::warn!(session_id, error = %e, "Failed to encode reply"),
    }
}
