use tracing_subscriber::EnvFilter;

use opsboard_server::config::ServerConfig;
use opsboard_server::{build_app, spawn_dispatcher, spawn_snapshot_sweeper, spawn_update_sources};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("OPSBOARD_LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() {
    init_tracing();

    let config = ServerConfig::load();
    config.validate();
    let listen_addr = config.listen_addr.clone();

    let (app, state, ingest_rx) = build_app(config);

    let mut tasks = vec![spawn_dispatcher(state.clone(), ingest_rx)];
    tasks.extend(spawn_snapshot_sweeper(state.clone()));
    tasks.extend(spawn_update_sources(&state));

    let listener = match tokio::net::TcpListener::bind(&listen_addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(%listen_addr, error = %e, "Failed to bind");
            std::process::exit(1);
        },
    };
    tracing::info!(%listen_addr, "Opsboard server listening");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %e, "Server error");
    }

    for task in tasks {
        task.abort();
    }
    tracing::info!("Opsboard server stopped");
}
