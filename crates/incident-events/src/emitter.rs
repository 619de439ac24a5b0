//! Emitter seam, the stock emitters, and the failure policy.

use serde::Deserialize;
use tokio::sync::mpsc;

use crate::error::EmitError;
use crate::event::{EventEnvelope, IncidentEvent};

/// Accepts envelopes for delivery to downstream consumers.
///
/// Implementations must not block on delivery; the lifecycle manager calls
/// `emit` on the request path.
pub trait EventEmitter: Send + Sync {
    fn emit(&self, envelope: &EventEnvelope) -> Result<(), EmitError>;
}

/// Accepts and discards every envelope.
///
/// Stands in for a broker producer that is not wired up.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEmitter;

impl EventEmitter for NoopEmitter {
    fn emit(&self, envelope: &EventEnvelope) -> Result<(), EmitError> {
        tracing::trace!(
            topic = envelope.topic,
            event_type = envelope.event_type,
            event_key = %envelope.event_key,
            "discarding event (noop emitter)"
        );
        Ok(())
    }
}

/// Hands envelopes to a bounded queue drained by a background task.
///
/// `emit` never waits: a full queue is reported as [`EmitError::QueueFull`]
/// and a dropped receiver as [`EmitError::QueueClosed`].
#[derive(Debug, Clone)]
pub struct QueuedEmitter {
    tx: mpsc::Sender<EventEnvelope>,
}

impl QueuedEmitter {
    /// Creates an emitter and the receiving end of its queue.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<EventEnvelope>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

impl EventEmitter for QueuedEmitter {
    fn emit(&self, envelope: &EventEnvelope) -> Result<(), EmitError> {
        self.tx.try_send(envelope.clone()).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => EmitError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => EmitError::QueueClosed,
        })
    }
}

/// What to do when an event cannot be emitted.
///
/// Both policies leave the triggering operation successful; they differ
/// only in whether the failure leaves a trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmitFailurePolicy {
    /// Drop the failure without a trace.
    Ignore,
    /// Drop the failure after logging it at `warn`.
    #[default]
    Log,
}

/// Emits `event` through `emitter`, applying `policy` to any failure.
///
/// Returns whether the emitter accepted the event. The return value is
/// informational; callers must not turn `false` into an operation error.
pub fn emit_with_policy(
    emitter: &dyn EventEmitter,
    event: &IncidentEvent,
    policy: EmitFailurePolicy,
) -> bool {
    let result = event.envelope().and_then(|envelope| emitter.emit(&envelope));
    match result {
        Ok(()) => true,
        Err(e) => {
            if policy == EmitFailurePolicy::Log {
                tracing::warn!(
                    event_type = event.event_type(),
                    event_key = event.event_key(),
                    incident_id = event.incident_id(),
                    "failed to emit incident event: {}",
                    e
                );
            }
            false
        }
    }
}
