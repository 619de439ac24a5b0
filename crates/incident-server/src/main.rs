//! Incident server binary.
//!
//! Starts an axum HTTP server with structured logging, database initialization,
//! the event pipeline, and graceful shutdown on SIGTERM/SIGINT.

use incident_core::{IncidentManager, SqliteIncidentStore};
use incident_events::{EventEmitter, NoopEmitter, OutboxSink, QueuedEmitter};
use incident_server::config::{self, EventSink};
use incident_server::{app, background, AppState};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

fn resolve_config_path() -> (Option<String>, &'static str) {
    if let Some(path) = std::env::args()
        .nth(1)
        .filter(|value| !value.trim().is_empty())
    {
        return (Some(path), "cli-arg");
    }

    if let Ok(path) = std::env::var("INCIDENT_CONFIG_PATH") {
        if !path.trim().is_empty() {
            return (Some(path), "env-var");
        }
    }

    (None, "default")
}

#[tokio::main]
async fn main() {
    let (resolved_config_path, config_source) = resolve_config_path();
    let selected_config_path = resolved_config_path.as_deref().or(Some("config.toml"));

    let config = config::load_config(selected_config_path)
        .expect("failed to load configuration, the server cannot start without valid config");

    let filter =
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));

    if config.logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    tracing::info!(
        source = config_source,
        path = selected_config_path.unwrap_or("<none>"),
        "resolved startup configuration path"
    );

    let pool = incident_db::open_migrated_pool(
        &config.database.path,
        incident_db::DbRuntimeSettings {
            busy_timeout_ms: config.database.busy_timeout_ms,
            pool_max_size: config.database.pool_max_size,
        },
    )
    .expect("failed to prepare database, check database.path in config");

    let (emitter, relay) = match config.events.sink {
        EventSink::Noop => {
            tracing::warn!("event sink is noop, incident events will be discarded");
            (Arc::new(NoopEmitter) as Arc<dyn EventEmitter>, None)
        }
        EventSink::Outbox => {
            let (emitter, rx) = QueuedEmitter::channel(config.events.queue_capacity);
            let relay = tokio::spawn(background::run_outbox_relay(
                rx,
                OutboxSink::new(pool.clone()),
            ));
            (Arc::new(emitter) as Arc<dyn EventEmitter>, Some(relay))
        }
    };

    let manager = IncidentManager::new(Arc::new(SqliteIncidentStore::new(pool)), emitter)
        .with_emit_policy(config.events.failure_policy);

    let app = app(AppState { manager });
    let addr = SocketAddr::new(config.server.host, config.server.port);

    tracing::info!(%addr, sink = ?config.events.sink, "starting incident server");

    let listener = TcpListener::bind(addr)
        .await
        .expect("failed to bind to address, is another process using this port?");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    // The router, and with it the last queue sender, is gone; let the relay drain.
    if let Some(relay) = relay {
        if let Err(e) = relay.await {
            tracing::error!("outbox relay task failed: {}", e);
        }
    }

    tracing::info!("incident server shut down");
}

/// Waits for a SIGINT (Ctrl+C) or SIGTERM signal for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { tracing::info!("received SIGINT, initiating graceful shutdown"); }
        () = terminate => { tracing::info!("received SIGTERM, initiating graceful shutdown"); }
    }
}
