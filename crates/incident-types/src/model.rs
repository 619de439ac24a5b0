//! The incident aggregate and its owned children.

use crate::{NoteType, Severity, Status};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A reported problem tracked through its lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    /// Opaque identifier assigned by the store at creation.
    pub id: String,
    /// Human-facing sequence number, unique and never reassigned.
    pub incident_key: i64,
    pub title: String,
    pub severity: Severity,
    pub status: Status,
    pub created_at: DateTime<Utc>,
    /// Refreshed by every mutating operation.
    pub updated_at: DateTime<Utc>,
    /// Append-only, in attachment order.
    pub notes: Vec<Note>,
    /// Unique by email.
    #[serde(rename = "watchlist")]
    pub watch_list: Vec<Watcher>,
    /// Email of the creator, empty for author-less creation.
    pub created_by: String,
    pub description: String,
    pub assignee: String,
}

impl Incident {
    /// Whether `email` is already on the watch list.
    pub fn is_watched_by(&self, email: &str) -> bool {
        self.watch_list.iter().any(|w| w.email == email)
    }
}

/// A note attached to an incident. Owned exclusively by that incident.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    /// Assigned when the note is attached; never taken from the request.
    pub id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub author_email: String,
    #[serde(rename = "type")]
    pub note_type: NoteType,
}

/// A subscriber interested in an incident's updates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Watcher {
    pub email: String,
}

/// Everything needed to persist a new incident except the storage id.
#[derive(Debug, Clone, PartialEq)]
pub struct IncidentDraft {
    pub incident_key: i64,
    pub title: String,
    pub severity: Severity,
    pub status: Status,
    pub created_at: DateTime<Utc>,
    pub notes: Vec<Note>,
    pub watch_list: Vec<Watcher>,
    pub created_by: String,
    pub description: String,
    pub assignee: String,
}

impl IncidentDraft {
    /// Combines the draft with the id the store assigned to it.
    ///
    /// `updated_at` starts equal to `created_at`.
    pub fn into_incident(self, id: String) -> Incident {
        Incident {
            id,
            incident_key: self.incident_key,
            title: self.title,
            severity: self.severity,
            status: self.status,
            created_at: self.created_at,
            updated_at: self.created_at,
            notes: self.notes,
            watch_list: self.watch_list,
            created_by: self.created_by,
            description: self.description,
            assignee: self.assignee,
        }
    }
}

/// One of the two ways an incident can be looked up.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IncidentRef {
    /// The store-assigned identifier.
    Id(String),
    /// The human-facing sequence number.
    Key(i64),
}

impl IncidentRef {
    /// Interprets a caller-supplied identifier.
    ///
    /// A string of ASCII digits that fits in an `i64` is an incident key;
    /// anything else is a storage id.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(key) = raw.parse() {
                return Self::Key(key);
            }
        }
        Self::Id(raw.to_string())
    }
}

impl std::fmt::Display for IncidentRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Id(id) => f.write_str(id),
            Self::Key(key) => write!(f, "#{key}"),
        }
    }
}
