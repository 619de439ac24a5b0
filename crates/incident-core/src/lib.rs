//! The incident lifecycle manager.
//!
//! [`IncidentManager`] owns every rule an incident lives by: field
//! validation, the status transition table, key allocation, and the
//! note and watcher orchestration. Storage is reached through the
//! [`IncidentStore`] seam; events go out through an
//! [`EventEmitter`](incident_events::EventEmitter).
//!
//! Validation happens before the first store call, so a rejected request
//! never changes anything. The one exception to all-or-nothing is the
//! status/severity update with an author email, which reports a durable
//! primary change with a failed watcher add as
//! [`LifecycleError::PartialFailure`].

pub mod error;
pub mod manager;
pub mod store;
pub mod transition;
pub mod validation;

pub use error::{ErrorKind, LifecycleError, StoreError};
pub use manager::IncidentManager;
pub use store::{IncidentStore, MemoryIncidentStore, SqliteIncidentStore};

#[cfg(test)]
mod tests;
