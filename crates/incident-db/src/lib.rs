//! Database layer for the incident service.
//!
//! Provides SQLite connection pooling (via `r2d2`), WAL-mode initialization,
//! and embedded SQL migrations. Every table the service uses is created
//! through versioned migrations managed by this crate.
//!
//! The incident store itself lives in `incident-core`; this crate only owns
//! connections and schema.

mod migrations;
mod pool;

pub use migrations::{run_migrations, MigrationError};
pub use pool::{create_pool, open_migrated_pool, DbPool, DbRuntimeSettings, PoolError};
