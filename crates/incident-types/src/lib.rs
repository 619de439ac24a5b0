//! Shared types for the incident service.
//!
//! This crate holds the vocabulary every other crate speaks: the lifecycle
//! enums (`Severity`, `Status`, `NoteType`), the `Incident` aggregate with
//! its `Note` and `Watcher` children, and the request shapes accepted by the
//! lifecycle manager.
//!
//! Enum values travel as lowercase strings (`"in_progress"`, `"critical"`).
//! Requests carry them as raw strings so that an unknown value is reported
//! by the lifecycle manager as a typed validation error instead of being
//! rejected by the JSON decoder.

use serde::{Deserialize, Serialize};
use thiserror::Error;

mod model;
mod request;

pub use model::{Incident, IncidentDraft, IncidentRef, Note, Watcher};
pub use request::{
    AddNoteRequest, AddWatcherRequest, CreateIncidentRequest, NewNote, UpdateSeverityRequest,
    UpdateStatusRequest,
};

/// Error returned when a string does not name a known enum value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind}: {value:?}")]
pub struct ParseEnumError {
    /// Which enum was being parsed (`"severity"`, `"status"`, `"note type"`).
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
}

/// How bad an incident is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Every severity, in ascending order.
    pub const ALL: [Severity; 4] = [Self::Low, Self::Medium, Self::High, Self::Critical];

    /// Returns the wire label for this severity.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Severity {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            _ => Err(ParseEnumError {
                kind: "severity",
                value: s.to_string(),
            }),
        }
    }
}

/// Where an incident sits in its lifecycle.
///
/// Every incident starts `Open`. Which moves are legal from each state is
/// decided by the lifecycle manager's transition table, not by this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Open,
    InProgress,
    Resolved,
    Closed,
}

impl Status {
    /// Every status, in lifecycle order.
    pub const ALL: [Status; 4] = [Self::Open, Self::InProgress, Self::Resolved, Self::Closed];

    /// Returns the wire label for this status.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::InProgress => "in_progress",
            Self::Resolved => "resolved",
            Self::Closed => "closed",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Status {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(Self::Open),
            "in_progress" => Ok(Self::InProgress),
            "resolved" => Ok(Self::Resolved),
            "closed" => Ok(Self::Closed),
            _ => Err(ParseEnumError {
                kind: "status",
                value: s.to_string(),
            }),
        }
    }
}

/// The purpose of a note attached to an incident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteType {
    /// General progress update. Used when a creation-time note omits its type.
    #[default]
    Update,
    Investigation,
    Resolution,
    Communication,
}

impl NoteType {
    /// Returns the wire label for this note type.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Update => "update",
            Self::Investigation => "investigation",
            Self::Resolution => "resolution",
            Self::Communication => "communication",
        }
    }
}

impl std::fmt::Display for NoteType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for NoteType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "update" => Ok(Self::Update),
            "investigation" => Ok(Self::Investigation),
            "resolution" => Ok(Self::Resolution),
            "communication" => Ok(Self::Communication),
            _ => Err(ParseEnumError {
                kind: "note type",
                value: s.to_string(),
            }),
        }
    }
}
