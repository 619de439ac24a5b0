//! Event variants and the envelope they are emitted in.

use incident_types::{Incident, Note, Severity, Status};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::EmitError;

/// The single logical topic every incident event is published to.
pub const EVENT_TOPIC: &str = "anchor.incident.events";

/// Current schema version stamped on every payload.
pub const SCHEMA_VERSION: u32 = 1;

/// Source-service tag stamped on every payload.
pub const SOURCE_SERVICE: &str = "incident";

/// A domain event describing one successful incident mutation.
///
/// `event_key` is unique per emission, not per incident. `id` is the
/// incident's storage id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type")]
pub enum IncidentEvent {
    /// An incident was created.
    #[serde(rename = "incident.created")]
    Created {
        event_key: String,
        id: String,
        title: String,
        severity: Severity,
    },

    /// An incident moved to a new status.
    #[serde(rename = "incident.status.updated")]
    StatusUpdated {
        event_key: String,
        id: String,
        title: String,
        status: Status,
    },

    /// An incident's severity changed.
    #[serde(rename = "incident.severity.updated")]
    SeverityUpdated {
        event_key: String,
        id: String,
        title: String,
        severity: Severity,
    },

    /// A note was appended to an incident.
    #[serde(rename = "incident.notes.added")]
    NoteAdded {
        event_key: String,
        id: String,
        title: String,
        content: String,
    },
}

const KNOWN_EVENT_TYPES: [&str; 4] = [
    "incident.created",
    "incident.status.updated",
    "incident.severity.updated",
    "incident.notes.added",
];

fn fresh_event_key() -> String {
    uuid::Uuid::new_v4().to_string()
}

impl IncidentEvent {
    pub fn created(incident: &Incident) -> Self {
        Self::Created {
            event_key: fresh_event_key(),
            id: incident.id.clone(),
            title: incident.title.clone(),
            severity: incident.severity,
        }
    }

    pub fn status_updated(incident: &Incident) -> Self {
        Self::StatusUpdated {
            event_key: fresh_event_key(),
            id: incident.id.clone(),
            title: incident.title.clone(),
            status: incident.status,
        }
    }

    pub fn severity_updated(incident: &Incident) -> Self {
        Self::SeverityUpdated {
            event_key: fresh_event_key(),
            id: incident.id.clone(),
            title: incident.title.clone(),
            severity: incident.severity,
        }
    }

    pub fn note_added(incident: &Incident, note: &Note) -> Self {
        Self::NoteAdded {
            event_key: fresh_event_key(),
            id: incident.id.clone(),
            title: incident.title.clone(),
            content: note.content.clone(),
        }
    }

    /// Returns the canonical event type string for this event.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Created { .. } => "incident.created",
            Self::StatusUpdated { .. } => "incident.status.updated",
            Self::SeverityUpdated { .. } => "incident.severity.updated",
            Self::NoteAdded { .. } => "incident.notes.added",
        }
    }

    /// The per-emission key.
    pub fn event_key(&self) -> &str {
        match self {
            Self::Created { event_key, .. }
            | Self::StatusUpdated { event_key, .. }
            | Self::SeverityUpdated { event_key, .. }
            | Self::NoteAdded { event_key, .. } => event_key,
        }
    }

    /// The storage id of the incident the event is about.
    pub fn incident_id(&self) -> &str {
        match self {
            Self::Created { id, .. }
            | Self::StatusUpdated { id, .. }
            | Self::SeverityUpdated { id, .. }
            | Self::NoteAdded { id, .. } => id,
        }
    }

    /// Serialises the event into the JSON object consumers receive.
    ///
    /// The object holds the variant's fields plus `event_type`,
    /// `source_service` and `version`.
    pub fn payload(&self) -> Result<Value, EmitError> {
        let mut value = serde_json::to_value(self)?;
        if let Value::Object(map) = &mut value {
            map.insert("source_service".into(), Value::from(SOURCE_SERVICE));
            map.insert("version".into(), Value::from(SCHEMA_VERSION));
        }
        Ok(value)
    }

    /// Wraps the event for an emitter: topic, version, and serialised bytes.
    pub fn envelope(&self) -> Result<EventEnvelope, EmitError> {
        Ok(EventEnvelope {
            topic: EVENT_TOPIC,
            version: SCHEMA_VERSION,
            event_type: self.event_type(),
            event_key: self.event_key().to_string(),
            incident_id: self.incident_id().to_string(),
            payload: serde_json::to_vec(&self.payload()?)?,
        })
    }

    /// Decodes a payload produced by [`IncidentEvent::payload`].
    ///
    /// Returns `Ok(None)` for event types this build does not know, so that
    /// consumers skip events added by newer producers. Unknown fields on
    /// known event types are ignored.
    ///
    /// # Errors
    ///
    /// Returns `EmitError::Serialization` if the bytes are not JSON or a
    /// known event type is missing a required field.
    pub fn from_payload(bytes: &[u8]) -> Result<Option<Self>, EmitError> {
        let value: Value = serde_json::from_slice(bytes)?;
        let known = value
            .get("event_type")
            .and_then(Value::as_str)
            .is_some_and(|t| KNOWN_EVENT_TYPES.contains(&t));
        if !known {
            return Ok(None);
        }
        Ok(Some(serde_json::from_value(value)?))
    }
}

/// An event ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventEnvelope {
    pub topic: &'static str,
    pub version: u32,
    pub event_type: &'static str,
    pub event_key: String,
    pub incident_id: String,
    /// JSON-encoded payload.
    pub payload: Vec<u8>,
}
