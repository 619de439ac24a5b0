//! Background tasks for the incident server.
//!
//! Includes:
//! - Relaying queued events into the outbox table.

use incident_events::{EventEmitter, EventEnvelope, OutboxSink};
use tokio::sync::mpsc;

/// Drains the event queue into the outbox.
///
/// Runs until every [`QueuedEmitter`](incident_events::QueuedEmitter) feeding
/// `rx` has been dropped, so awaiting the task after the server stops
/// flushes whatever was still queued. A failed write is logged and the
/// event dropped.
pub async fn run_outbox_relay(mut rx: mpsc::Receiver<EventEnvelope>, sink: OutboxSink) {
    tracing::info!("starting event outbox relay");
    let mut relayed: u64 = 0;

    while let Some(envelope) = rx.recv().await {
        let sink = sink.clone();
        let event_type = envelope.event_type;
        let event_key = envelope.event_key.clone();

        let res = tokio::task::spawn_blocking(move || sink.emit(&envelope)).await;

        match res {
            Ok(Ok(())) => relayed += 1,
            Ok(Err(e)) => {
                tracing::error!(event_type, %event_key, "failed to record event in outbox: {}", e);
            }
            Err(e) => {
                tracing::error!("outbox relay join error: {}", e);
            }
        }
    }

    tracing::info!(relayed, "event queue closed, outbox relay stopped");
}
