pub mod api;
pub mod auth;
pub mod collaborators;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod health;
pub mod hub;
pub mod snapshot_store;
pub mod state;
pub mod ws;

use std::time::Duration;

use axum::Router;
use axum::middleware;
use axum::routing::get;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;

use opsboard_core::ingest::IngestReceiver;

use config::ServerConfig;
use state::{AppState, Services};

/// Timeout for REST requests. WebSocket sessions are not subject to it.
const API_TIMEOUT: Duration = Duration::from_secs(10);

/// Build the Axum router and application state from a config, with no-op
/// persistence collaborators.
pub fn build_app(config: ServerConfig) -> (Router<()>, AppState, IngestReceiver) {
    build_app_with(config, Services::default())
}

/// Build the Axum router and application state with explicit collaborators.
/// The returned receiver must be handed to [`spawn_dispatcher`].
pub fn build_app_with(
    config: ServerConfig,
    services: Services,
) -> (Router<()>, AppState, IngestReceiver) {
    let (state, ingest_rx) = AppState::new(config, services);

    let api_routes = Router::new()
        .route("/summary", get(api::get_summary))
        .route("/monitoring-stats", get(api::get_monitoring_stats))
        .route("/sla-data", get(api::get_sla_data))
        .layer(TimeoutLayer::new(API_TIMEOUT));

    let protected = Router::new()
        .route("/monitoringhub", get(ws::ws_handler))
        .nest("/api/dashboard", api_routes)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            bearer_auth_layer,
        ));

    let app = Router::new()
        .merge(protected)
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .layer(CorsLayer::permissive())
        .with_state(state.clone());

    (app, state, ingest_rx)
}

/// Start the task that merges and broadcasts every source update.
pub fn spawn_dispatcher(state: AppState, rx: IngestReceiver) -> JoinHandle<()> {
    tokio::spawn(dispatch::run(state, rx))
}

/// Periodically evict idle snapshots. Returns `None` when eviction is off.
pub fn spawn_snapshot_sweeper(state: AppState) -> Option<JoinHandle<()>> {
    let max_idle = Duration::from_secs(state.config.snapshots.idle_evict_secs?);
    let every = Duration::from_secs(state.config.snapshots.idle_check_interval_secs);
    Some(tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let evicted = state.store.evict_idle(max_idle).await;
            if evicted > 0 {
                tracing::info!(evicted, "Evicted idle snapshots");
            }
        }
    }))
}

/// Start every update source enabled in the config.
pub fn spawn_update_sources(state: &AppState) -> Vec<JoinHandle<()>> {
    #[allow(unused_mut)]
    let mut handles = Vec::new();

    #[cfg(feature = "amqp")]
    if let Some(ref amqp) = state.config.amqp
        && amqp.enabled
    {
        let consumer = opsboard_amqp::QueueConsumer::new(opsboard_amqp::AmqpConfig {
            url: amqp.url.clone(),
            user_status_queue: amqp.user_status_queue.clone(),
            monitoring_queue: amqp.monitoring_queue.clone(),
            prefetch: amqp.prefetch,
        });
        handles.push(tokio::spawn(consumer.run(state.ingest_tx.clone())));
        tracing::info!("Queue consumer started");
    }

    #[cfg(feature = "changefeed")]
    if let Some(ref feed) = state.config.changefeed
        && feed.enabled
        && let Some(ref database_url) = feed.database_url
    {
        match opsboard_changefeed::PgChangeFeed::new(database_url, &feed.function) {
            Ok(pg) => {
                let poller = opsboard_changefeed::ChangeFeedPoller::new(
                    pg,
                    opsboard_changefeed::PollerConfig {
                        poll_interval: Duration::from_millis(feed.poll_interval_ms),
                        error_backoff: Duration::from_millis(feed.error_backoff_ms),
                    },
                );
                handles.push(tokio::spawn(poller.run(state.ingest_tx.clone())));
                tracing::info!("Change-feed poller started");
            },
            Err(e) => tracing::error!(error = %e, "Change-feed poller not started"),
        }
    }

    #[cfg(not(any(feature = "amqp", feature = "changefeed")))]
    let _ = state;

    handles
}

/// Middleware wrapper that injects AuthConfig into request extensions for the
/// bearer auth middleware.
async fn bearer_auth_layer(
    axum::extract::State(state): axum::extract::State<AppState>,
    mut request: axum::extract::Request,
    next: middleware::Next,
) -> Result<axum::response::Response, axum::http::StatusCode> {
    request.extensions_mut().insert(state.auth.clone());
    auth::bearer_auth_middleware(request.headers().clone(), request, next).await
}
