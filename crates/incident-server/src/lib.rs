//! Incident service HTTP surface.
//!
//! [`app`] builds the router; the binary in `main.rs` wires configuration,
//! the database and the event pipeline around it.

pub mod api_incidents;
pub mod background;
pub mod config;

use axum::{
    extract::DefaultBodyLimit,
    http::Method,
    routing::{get, post, put},
    Extension, Json, Router,
};
use incident_core::IncidentManager;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub manager: IncidentManager,
}

/// Maximum request body size (1 MiB).
const MAX_REQUEST_BODY_BYTES: usize = 1024 * 1024;

async fn root() -> &'static str {
    "Hello, World!"
}

/// Health check handler.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "incident-service",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    let api = Router::new()
        .route(
            "/incidents",
            get(api_incidents::list_incidents_handler)
                .post(api_incidents::create_incident_handler),
        )
        .route("/incidents/{id}", get(api_incidents::get_incident_handler))
        .route(
            "/incidents/{id}/status",
            put(api_incidents::update_status_handler),
        )
        .route(
            "/incidents/{id}/severity",
            put(api_incidents::update_severity_handler),
        )
        .route(
            "/incidents/{id}/notes",
            post(api_incidents::add_note_handler),
        )
        .route(
            "/incidents/{id}/watchlist",
            post(api_incidents::add_watcher_handler),
        );

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .nest("/api/v1", api)
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .layer(Extension(Arc::new(state)))
}
