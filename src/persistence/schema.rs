//! `SQLite` schema bootstrap logic.
//!
//! All table definitions use `CREATE TABLE IF NOT EXISTS` and are safe to
//! re-run on every startup.

use sqlx::SqlitePool;

use crate::Result;

/// Apply the node and edge tables to the connected `SQLite` database.
///
/// # Errors
///
/// Returns `AppError::StoreUnavailable` if any DDL statement fails.
pub async fn bootstrap_schema(pool: &SqlitePool) -> Result<()> {
    let ddl = r"
CREATE TABLE IF NOT EXISTS node (
    id              TEXT PRIMARY KEY NOT NULL,
    node_type       TEXT NOT NULL,
    labels          TEXT NOT NULL,
    properties      TEXT NOT NULL,
    embedding       TEXT,
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS edge (
    id              TEXT PRIMARY KEY NOT NULL,
    edge_type       TEXT NOT NULL,
    from_id         TEXT NOT NULL,
    to_id           TEXT NOT NULL,
    properties      TEXT NOT NULL,
    created_at      TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_node_type ON node(node_type, created_at);
CREATE INDEX IF NOT EXISTS idx_edge_from ON edge(from_id);
";

    sqlx::raw_sql(ddl).execute(pool).await?;
    Ok(())
}
