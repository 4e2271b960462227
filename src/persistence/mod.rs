//! Persistence layer modules.

pub mod artifact_repo;
pub mod db;
pub mod graph_store;
pub mod schema;
pub mod session_repo;
pub mod sqlite_store;

/// Re-export the database pool type for convenience.
pub use sqlx::SqlitePool;
