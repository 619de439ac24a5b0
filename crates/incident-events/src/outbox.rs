//! Persistence of emitted events in the `incident_event_outbox` table.
//!
//! The outbox is the durable end of the event pipeline: the server's
//! background relay drains the emitter queue into it, and a future broker
//! publisher can read from it.

use incident_db::DbPool;
use rusqlite::{params, Connection};

use crate::emitter::EventEmitter;
use crate::error::EmitError;
use crate::event::EventEnvelope;

/// A stored event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboxRecord {
    /// Auto-incremented row ID; also the delivery order.
    pub id: i64,
    pub event_key: String,
    pub topic: String,
    pub event_type: String,
    pub incident_id: String,
    pub version: u32,
    pub payload_json: String,
    pub recorded_at: String,
}

/// Writes an envelope to the outbox and returns its row ID.
///
/// Envelopes are keyed by `event_key`; recording the same envelope twice is
/// a no-op that returns the existing row ID.
///
/// # Errors
///
/// Returns `EmitError::Database` on SQL failure.
pub fn record_envelope(conn: &Connection, envelope: &EventEnvelope) -> Result<i64, EmitError> {
    let payload_json = String::from_utf8_lossy(&envelope.payload);
    conn.execute(
        "INSERT OR IGNORE INTO incident_event_outbox
            (event_key, topic, event_type, incident_id, version, payload_json)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            envelope.event_key,
            envelope.topic,
            envelope.event_type,
            envelope.incident_id,
            envelope.version,
            payload_json,
        ],
    )?;
    let id = conn.query_row(
        "SELECT id FROM incident_event_outbox WHERE event_key = ?1",
        [&envelope.event_key],
        |row| row.get(0),
    )?;
    Ok(id)
}

/// Emitter that writes each envelope straight into the outbox.
///
/// This blocks on SQLite, so it belongs behind a [`QueuedEmitter`](crate::QueuedEmitter)
/// relay rather than on the request path.
#[derive(Clone)]
pub struct OutboxSink {
    pool: DbPool,
}

impl OutboxSink {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl EventEmitter for OutboxSink {
    fn emit(&self, envelope: &EventEnvelope) -> Result<(), EmitError> {
        let conn = self.pool.get()?;
        let id = record_envelope(&conn, envelope)?;
        tracing::debug!(
            outbox_id = id,
            event_type = envelope.event_type,
            incident_id = %envelope.incident_id,
            "event recorded in outbox"
        );
        Ok(())
    }
}

/// Filter criteria for reading the outbox.
#[derive(Debug, Clone, Default)]
pub struct OutboxFilter {
    pub event_type: Option<String>,
    pub incident_id: Option<String>,
    /// Only rows with an ID greater than this.
    pub after_id: Option<i64>,
    /// Maximum number of rows (default: 100).
    pub limit: Option<i64>,
}

/// Reads outbox rows in delivery order (oldest first).
///
/// # Errors
///
/// Returns `EmitError::Database` on SQL failure.
pub fn list_outbox(conn: &Connection, filter: &OutboxFilter) -> Result<Vec<OutboxRecord>, EmitError> {
    let mut clauses = vec!["id > ?1".to_string()];
    let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> =
        vec![Box::new(filter.after_id.unwrap_or(0))];
    let mut idx = 2u32;

    if let Some(ref event_type) = filter.event_type {
        clauses.push(format!("event_type = ?{idx}"));
        param_values.push(Box::new(event_type.clone()));
        idx += 1;
    }

    if let Some(ref incident_id) = filter.incident_id {
        clauses.push(format!("incident_id = ?{idx}"));
        param_values.push(Box::new(incident_id.clone()));
        idx += 1;
    }

    let where_clause = clauses.join(" AND ");
    let sql = format!(
        "SELECT id, event_key, topic, event_type, incident_id, version, payload_json, recorded_at
         FROM incident_event_outbox
         WHERE {where_clause}
         ORDER BY id ASC
         LIMIT ?{idx}"
    );
    param_values.push(Box::new(filter.limit.unwrap_or(100)));

    let params_refs: Vec<&dyn rusqlite::types::ToSql> = param_values.iter().map(|p| &**p).collect();

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_refs.as_slice(), |row| {
        Ok(OutboxRecord {
            id: row.get(0)?,
            event_key: row.get(1)?,
            topic: row.get(2)?,
            event_type: row.get(3)?,
            incident_id: row.get(4)?,
            version: row.get(5)?,
            payload_json: row.get(6)?,
            recorded_at: row.get(7)?,
        })
    })?;

    let mut records = Vec::new();
    for row in rows {
        records.push(row?);
    }
    Ok(records)
}
