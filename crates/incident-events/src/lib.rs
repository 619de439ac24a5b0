//! Domain events emitted by the incident service.
//!
//! Every successful mutation of an incident produces one event for
//! downstream consumers. All events go to a single logical topic,
//! [`EVENT_TOPIC`], and carry a schema version ([`SCHEMA_VERSION`]).
//!
//! | Event type | Type-specific field |
//! |------------|---------------------|
//! | `incident.created` | `severity` |
//! | `incident.status.updated` | `status` |
//! | `incident.severity.updated` | `severity` |
//! | `incident.notes.added` | `content` |
//!
//! Emission is fire-and-forget from the caller's point of view. What
//! happens to a failed emission is decided by an explicit
//! [`EmitFailurePolicy`]; no policy lets a failure reach the caller.
//!
//! The durable end of the pipeline is the `incident_event_outbox` table:
//! [`OutboxSink`] writes envelopes there, usually fed from a
//! [`QueuedEmitter`] by a background relay.
//!
//! # Usage
//!
//! ```rust,ignore
//! use incident_events::{emit_with_policy, EmitFailurePolicy, IncidentEvent, NoopEmitter};
//!
//! let event = IncidentEvent::created(&incident);
//! emit_with_policy(&NoopEmitter, &event, EmitFailurePolicy::Log);
//! ```

mod emitter;
mod error;
mod event;
mod outbox;

pub use emitter::{emit_with_policy, EmitFailurePolicy, EventEmitter, NoopEmitter, QueuedEmitter};
pub use error::EmitError;
pub use event::{EventEnvelope, IncidentEvent, EVENT_TOPIC, SCHEMA_VERSION, SOURCE_SERVICE};
pub use outbox::{list_outbox, record_envelope, OutboxFilter, OutboxRecord, OutboxSink};
