//! Error types for the lifecycle manager and its store.

use incident_types::{Incident, Status};
use thiserror::Error;

/// Errors raised by an [`IncidentStore`](crate::IncidentStore).
#[derive(Debug, Error)]
pub enum StoreError {
    /// No pooled connection could be checked out.
    #[error("database connection failed: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A stored row could not be decoded into the domain model.
    #[error("corrupt incident record: {0}")]
    Corrupt(String),

    /// The store refused the operation (lock poisoned, injected fault).
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// The caller-facing error categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad or missing field, or an unknown enum value.
    InvalidInput,
    /// The status change is not in the transition table.
    InvalidTransition,
    /// An email failed format validation.
    InvalidEmail,
    /// No incident matches the identifier.
    NotFound,
    /// The store operation failed.
    PersistenceFailure,
    /// The primary mutation persisted but the chained watcher add did not.
    PartialFailure,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidInput => "invalid_input",
            Self::InvalidTransition => "invalid_transition",
            Self::InvalidEmail => "invalid_email",
            Self::NotFound => "not_found",
            Self::PersistenceFailure => "persistence_failure",
            Self::PartialFailure => "partial_failure",
        }
    }
}

/// Errors returned by [`IncidentManager`](crate::IncidentManager) operations.
///
/// Validation variants are raised before any store call, so they never
/// leave state partially mutated. `PartialFailure` is the one variant that
/// reports a durable change.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// A required field is missing or out of bounds.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid severity: {0:?}")]
    InvalidSeverity(String),

    #[error("invalid status: {0:?}")]
    InvalidStatus(String),

    /// Note content out of bounds or an unknown note type.
    #[error("invalid note: {0}")]
    InvalidNote(String),

    #[error("invalid email: {0:?}")]
    InvalidEmail(String),

    #[error("cannot transition from {from} to {to}")]
    InvalidTransition { from: Status, to: Status },

    #[error("incident not found: {0}")]
    NotFound(String),

    #[error("persistence failure: {0}")]
    Persistence(#[from] StoreError),

    /// `primary` persisted; adding the watcher then failed with `source`.
    /// `incident` is the state after the primary change.
    #[error("{primary} updated but failed to add watcher: {source}")]
    PartialFailure {
        primary: &'static str,
        incident: Box<Incident>,
        source: Box<LifecycleError>,
    },
}

impl LifecycleError {
    /// Maps the error onto its caller-facing category.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_)
            | Self::InvalidSeverity(_)
            | Self::InvalidStatus(_)
            | Self::InvalidNote(_) => ErrorKind::InvalidInput,
            Self::InvalidEmail(_) => ErrorKind::InvalidEmail,
            Self::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Persistence(_) => ErrorKind::PersistenceFailure,
            Self::PartialFailure { .. } => ErrorKind::PartialFailure,
        }
    }
}
