//! Error types for event emission.

/// Errors that can occur while building or delivering an event.
#[derive(Debug, thiserror::Error)]
pub enum EmitError {
    /// The payload could not be serialised or deserialised.
    #[error("event serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The delivery queue is at capacity.
    #[error("event queue is full")]
    QueueFull,

    /// The delivery queue has no consumer.
    #[error("event queue is closed")]
    QueueClosed,

    /// No outbox connection could be checked out of the pool.
    #[error("event outbox connection failed: {0}")]
    Pool(#[from] r2d2::Error),

    /// Writing to the outbox table failed.
    #[error("event outbox database error: {0}")]
    Database(#[from] rusqlite::Error),
}
