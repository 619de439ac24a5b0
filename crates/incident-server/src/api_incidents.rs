//! Incident API handlers.
//!
//! Handlers perform only shallow presence checks; every rule lives in
//! [`IncidentManager`], which runs on the blocking pool because the store
//! is synchronous.

use crate::AppState;
use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use incident_core::{ErrorKind, IncidentManager, LifecycleError};
use incident_types::{
    AddNoteRequest, AddWatcherRequest, CreateIncidentRequest, Incident, IncidentRef,
    UpdateSeverityRequest, UpdateStatusRequest,
};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

/// Successful response body.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data,
        })
    }
}

/// API error type.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    InternalServerError(String),
    /// The primary change persisted; the body carries the changed incident.
    #[error("{message}")]
    PartialFailure {
        status: StatusCode,
        message: String,
        incident: Box<Incident>,
    },
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidInput | ErrorKind::InvalidTransition | ErrorKind::InvalidEmail => {
            StatusCode::BAD_REQUEST
        }
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::PersistenceFailure | ErrorKind::PartialFailure => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl From<LifecycleError> for ApiError {
    fn from(e: LifecycleError) -> Self {
        let message = e.to_string();
        let kind = e.kind();
        if kind == ErrorKind::PersistenceFailure {
            tracing::error!("incident store failure: {}", message);
        }
        match e {
            LifecycleError::PartialFailure {
                incident, source, ..
            } => ApiError::PartialFailure {
                status: status_for(source.kind()),
                message,
                incident,
            },
            _ => match status_for(kind) {
                StatusCode::BAD_REQUEST => ApiError::BadRequest(message),
                StatusCode::NOT_FOUND => ApiError::NotFound(message),
                _ => ApiError::InternalServerError(message),
            },
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, serde_json::json!({ "error": msg })),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, serde_json::json!({ "error": msg })),
            ApiError::InternalServerError(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                serde_json::json!({ "error": msg }),
            ),
            ApiError::PartialFailure {
                status,
                message,
                incident,
            } => (
                status,
                serde_json::json!({
                    "error": message,
                    "partial_failure": true,
                    "data": incident,
                }),
            ),
        };

        (status, Json(body)).into_response()
    }
}

fn require(field: &str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::BadRequest(format!("{field} is required")));
    }
    Ok(())
}

/// Runs a manager operation on the blocking pool.
async fn with_manager<T, F>(state: Arc<AppState>, op: F) -> Result<T, ApiError>
where
    F: FnOnce(&IncidentManager) -> Result<T, LifecycleError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(move || op(&state.manager))
        .await
        .map_err(|e| ApiError::InternalServerError(format!("task join error: {}", e)))?
        .map_err(ApiError::from)
}

/// Handler for `GET /api/v1/incidents`.
pub async fn list_incidents_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<Incident>>>, ApiError> {
    let incidents = with_manager(state, |m| m.list()).await?;
    Ok(ApiResponse::ok(incidents))
}

/// Handler for `POST /api/v1/incidents`.
pub async fn create_incident_handler(
    Extension(state): Extension<Arc<AppState>>,
    payload: Result<Json<CreateIncidentRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<Incident>>), ApiError> {
    let Json(payload) = payload?;
    require("title", &payload.title)?;
    require("severity", &payload.severity)?;

    let incident = with_manager(state, move |m| m.create_incident(&payload)).await?;
    Ok((StatusCode::CREATED, ApiResponse::ok(incident)))
}

/// Handler for `GET /api/v1/incidents/{id}`.
///
/// `id` may be the storage id or the numeric incident key.
pub async fn get_incident_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Incident>>, ApiError> {
    let reference = IncidentRef::parse(&id);
    let incident = with_manager(state, move |m| m.get(&reference)).await?;
    Ok(ApiResponse::ok(incident))
}

/// Handler for `PUT /api/v1/incidents/{id}/status`.
pub async fn update_status_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<Incident>>, ApiError> {
    let Json(payload) = payload?;
    require("status", &payload.status)?;

    let reference = IncidentRef::parse(&id);
    let incident = with_manager(state, move |m| m.update_status(&reference, &payload)).await?;
    Ok(ApiResponse::ok(incident))
}

/// Handler for `PUT /api/v1/incidents/{id}/severity`.
pub async fn update_severity_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateSeverityRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<Incident>>, ApiError> {
    let Json(payload) = payload?;
    require("severity", &payload.severity)?;

    let reference = IncidentRef::parse(&id);
    let incident = with_manager(state, move |m| m.update_severity(&reference, &payload)).await?;
    Ok(ApiResponse::ok(incident))
}

/// Handler for `POST /api/v1/incidents/{id}/notes`.
pub async fn add_note_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<String>,
    payload: Result<Json<AddNoteRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<Incident>>), ApiError> {
    let Json(payload) = payload?;
    require("content", &payload.content)?;

    let reference = IncidentRef::parse(&id);
    let incident = with_manager(state, move |m| m.add_note(&reference, &payload)).await?;
    Ok((StatusCode::CREATED, ApiResponse::ok(incident)))
}

/// Handler for `POST /api/v1/incidents/{id}/watchlist`.
pub async fn add_watcher_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<String>,
    payload: Result<Json<AddWatcherRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<Incident>>), ApiError> {
    let Json(payload) = payload?;

    let reference = IncidentRef::parse(&id);
    let incident = with_manager(state, move |m| m.add_watcher(&reference, &payload)).await?;
    Ok((StatusCode::CREATED, ApiResponse::ok(incident)))
}
