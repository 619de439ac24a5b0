//! The document store seam.
//!
//! The lifecycle manager never talks to a database directly; it is handed
//! an [`IncidentStore`] at construction. Each update method is a
//! conditional update: it applies only if the incident exists, refreshes
//! `updated_at`, and returns the post-update document, or `None` when no
//! incident matched.

mod memory;
mod sqlite;

pub use memory::MemoryIncidentStore;
pub use sqlite::SqliteIncidentStore;

use chrono::{DateTime, Utc};
use incident_types::{Incident, IncidentDraft, IncidentRef, Note, Severity, Status, Watcher};

use crate::error::StoreError;

/// Persistent collection of incidents.
///
/// Implementations must make each method atomic for a single incident.
pub trait IncidentStore: Send + Sync {
    /// Reserves the next human-facing incident key.
    ///
    /// Must be atomic: concurrent callers never receive the same key. A key
    /// reserved by a creation that later fails is not reused.
    fn allocate_incident_key(&self) -> Result<i64, StoreError>;

    /// Persists a new incident and assigns its storage id.
    fn insert(&self, draft: IncidentDraft) -> Result<Incident, StoreError>;

    /// Looks an incident up by storage id or by incident key.
    fn find(&self, reference: &IncidentRef) -> Result<Option<Incident>, StoreError>;

    /// All incidents, newest `created_at` first; ties go to the higher key.
    fn list_newest_first(&self) -> Result<Vec<Incident>, StoreError>;

    fn set_status(
        &self,
        id: &str,
        status: Status,
        at: DateTime<Utc>,
    ) -> Result<Option<Incident>, StoreError>;

    fn set_severity(
        &self,
        id: &str,
        severity: Severity,
        at: DateTime<Utc>,
    ) -> Result<Option<Incident>, StoreError>;

    /// Appends `note` to the end of the incident's notes.
    fn push_note(&self, id: &str, note: &Note, at: DateTime<Utc>)
        -> Result<Option<Incident>, StoreError>;

    /// Adds `watcher` with set semantics: an email already present is kept once.
    fn add_watcher(
        &self,
        id: &str,
        watcher: &Watcher,
        at: DateTime<Utc>,
    ) -> Result<Option<Incident>, StoreError>;
}
