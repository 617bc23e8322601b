use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use opsboard_core::facts::{FactKind, Update};
use opsboard_core::ingest::{IngestError, IngestSender, Origin, submit};
use opsboard_core::net::messages::{ClientMessage, ServerMessage};
use opsboard_core::net::protocol::{decode_server_message, encode_client_message};

use opsboard_server::config::{AuthFileConfig, ServerConfig};
use opsboard_server::state::{AppState, Services};
use opsboard_server::{build_app_with, spawn_dispatcher};

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct TestServer {
    pub addr: SocketAddr,
    pub state: AppState,
    _shutdown: tokio::task::JoinHandle<()>,
}

impl TestServer {
    /// Start a test server with no auth.
    pub async fn new() -> Self {
        Self::from_config(ServerConfig::default()).await
    }

    /// Start a test server that requires a bearer token.
    pub async fn with_auth(token: &str) -> Self {
        let config = ServerConfig {
            auth: AuthFileConfig {
                bearer_token: Some(token.to_string()),
            },
            ..ServerConfig::default()
        };
        Self::from_config(config).await
    }

    pub async fn from_config(config: ServerConfig) -> Self {
        Self::with_services(config, Services::default()).await
    }

    pub async fn with_services(config: ServerConfig, services: Services) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (app, state, ingest_rx) = build_app_with(config, services);
        spawn_dispatcher(state.clone(), ingest_rx);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Give the server a moment to start accepting
        tokio::time::sleep(Duration::from_millis(20)).await;

        Self {
            addr,
            state,
            _shutdown: handle,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/monitoringhub", self.addr)
    }

    pub fn ingest(&self) -> &IngestSender {
        &self.state.ingest_tx
    }

    /// Push a fact for today's live view through the dispatcher and wait
    /// until it has been broadcast.
    pub async fn push(&self, kind: FactKind) -> Result<(), IngestError> {
        submit(
            self.ingest(),
            Origin::Queue("test".to_string()),
            Update::fact_for_today(kind, opsboard_core::time::now()),
        )
        .await
    }
}

/// Connect a WebSocket client to the given URL.
pub async fn ws_connect(url: &str) -> WsStream {
    let (stream, _) = tokio_tungstenite::connect_async(url).await.unwrap();
    stream
}

/// Connect and consume the welcome snapshot.
pub async fn ws_connect_welcomed(url: &str) -> WsStream {
    let mut stream = ws_connect(url).await;
    match ws_read_server_msg(&mut stream).await {
        ServerMessage::DashboardDataUpdate(_) => {},
        other => panic!("Expected welcome DashboardDataUpdate, got: {other:?}"),
    }
    stream
}

pub async fn ws_send(stream: &mut WsStream, msg: &ClientMessage) {
    let encoded = encode_client_message(msg).unwrap();
    stream.send(Message::Text(encoded.into())).await.unwrap();
}

/// Read the next text frame from a WebSocket stream (5s timeout).
pub async fn ws_read_raw(stream: &mut WsStream) -> String {
    let deadline = Duration::from_secs(5);
    tokio::time::timeout(deadline, async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => return text.as_str().to_string(),
                Some(Ok(Message::Close(_))) => panic!("WebSocket closed unexpectedly"),
                Some(Err(e)) => panic!("WebSocket error: {e}"),
                None => panic!("WebSocket stream ended"),
                _ => continue,
            }
        }
    })
    .await
    .expect("Timed out waiting for WebSocket message")
}

/// Try to read a text frame, returning None on timeout.
pub async fn ws_try_read_raw(stream: &mut WsStream, timeout_ms: u64) -> Option<String> {
    let deadline = Duration::from_millis(timeout_ms);
    tokio::time::timeout(deadline, async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => return text.as_str().to_string(),
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => {
                    panic!("WebSocket error or closed")
                },
                _ => continue,
            }
        }
    })
    .await
    .ok()
}

/// Read the next ServerMessage from a WebSocket stream (5s timeout).
pub async fn ws_read_server_msg(stream: &mut WsStream) -> ServerMessage {
    let text = ws_read_raw(stream).await;
    decode_server_message(&text).unwrap()
}
