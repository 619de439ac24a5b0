//! Request shapes accepted by the lifecycle manager.
//!
//! Enum-valued fields are plain strings here; the manager parses them and
//! reports unknown values as validation errors. Optional strings default to
//! empty, which the manager treats as "not supplied".

use serde::Deserialize;

/// Input for creating an incident.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateIncidentRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub severity: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub notes: Vec<NewNote>,
    #[serde(default)]
    pub author_email: String,
    #[serde(default)]
    pub assignee: String,
}

/// A note supplied alongside a creation request.
///
/// Any `id` the caller sends is ignored; fresh ids are assigned on attach.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewNote {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub author_email: String,
    /// Defaults to `update` when omitted.
    #[serde(default, rename = "type")]
    pub note_type: Option<String>,
}

/// Input for changing an incident's status.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateStatusRequest {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub author_email: String,
}

/// Input for changing an incident's severity.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateSeverityRequest {
    #[serde(default)]
    pub severity: String,
    #[serde(default)]
    pub author_email: String,
}

/// Input for appending a note.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AddNoteRequest {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub author_email: String,
    #[serde(default, rename = "type")]
    pub note_type: String,
}

/// Input for adding a watcher.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AddWatcherRequest {
    #[serde(default)]
    pub email: String,
}
