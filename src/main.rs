//! model-dispatch-proxy – entry point.
//!
//! Startup order:
//! 1. Parse configuration from environment variables.
//! 2. Initialise structured tracing (JSON or pretty, per config).
//! 3. Open the SQLite config store and run pending migrations.
//! 4. Load the initial config snapshot synchronously, then spawn the
//!    background refresher.
//! 5. Build the Axum router (a single fallback handler — the client
//!    surface is "any method, any path") and start the HTTP server with
//!    graceful shutdown.

mod access_log;
mod config;
mod config_store;
mod db;
mod dispatcher;
mod error;
mod forwarder;
mod prober;
mod queue;
mod relay;
mod snapshot;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::access_log::AccessLogger;
use crate::config::Config;
use crate::db::sqlite::SqliteConfigStore;
use crate::queue::QueueAccountant;
use crate::snapshot::SnapshotHandle;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Configuration ─────────────────────────────────────────────────
    let cfg = Config::from_env();

    // ── 2. Tracing ────────────────────────────────────────────────────────
    let env_filter = match tracing_subscriber::EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => match cfg.log_level.parse::<tracing_subscriber::EnvFilter>() {
            Ok(f) => f,
            Err(e) => {
                eprintln!(
                    "WARN: PROXY_LOG='{}' is not a valid tracing filter ({}); \
                     falling back to 'info'",
                    cfg.log_level, e
                );
                tracing_subscriber::EnvFilter::new("info")
            }
        },
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(true);

    if cfg.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    info!(version = env!("CARGO_PKG_VERSION"), "model-dispatch-proxy starting");

    // ── 3. Config store ───────────────────────────────────────────────────
    let store = SqliteConfigStore::connect(&cfg.config_database_url).await?;
    info!(database_url = %cfg.config_database_url, "config store ready");

    // ── 4. Config snapshot: synchronous initial load, then background refresher ─
    let initial = snapshot::initial_snapshot(
        &store,
        cfg.default_retry_attempts,
        cfg.security_disabled,
    )
    .await;
    let snapshot_handle = Arc::new(SnapshotHandle::new(initial));
    let store = Arc::new(store);
    snapshot::spawn_refresher(
        Arc::clone(&snapshot_handle),
        Arc::clone(&store),
        Duration::from_secs(cfg.refresh_interval_secs),
        cfg.default_retry_attempts,
        cfg.security_disabled,
    );

    // ── 5. Shared application state ───────────────────────────────────────
    let state = AppState {
        snapshot: snapshot_handle,
        queue: Arc::new(QueueAccountant::new()),
        access_log: Arc::new(AccessLogger::new(cfg.access_log_path.clone())),
        http_client: reqwest::Client::new(),
    };

    // ── 6. HTTP server with graceful shutdown ─────────────────────────────
    let app: Router = Router::new()
        .fallback(dispatcher::dispatch)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr: SocketAddr = cfg.bind_address.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "HTTP server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("model-dispatch-proxy stopped");
    Ok(())
}

/// Resolves when SIGINT (Ctrl-C) or SIGTERM is received, so the listener
/// stops accepting new connections while in-flight requests drain.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install CTRL+C signal handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => warn!(error = %e, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received; starting graceful shutdown");
}
