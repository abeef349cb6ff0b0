//! Database schema definitions using sea-query.
//!
//! These define the table and column identifiers for type-safe query building.

use sea_query::Iden;

/// Completed positions table schema.
#[derive(Iden, Clone, Copy)]
pub enum CompletedPositions {
    Table,
    /// Store-assigned ordering key.
    #[iden = "id"]
    Id,
    #[iden = "namespace"]
    Namespace,
    #[iden = "opaque_id"]
    OpaqueId,
    #[iden = "recorded_at"]
    RecordedAt,
}

/// PostgreSQL DDL for the completed positions table.
pub const CREATE_POSITIONS_TABLE_POSTGRES: &str = r#"
CREATE TABLE IF NOT EXISTS completed_positions (
    id BIGSERIAL PRIMARY KEY,
    namespace TEXT NOT NULL,
    opaque_id TEXT NOT NULL,
    recorded_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX IF NOT EXISTS idx_completed_positions_namespace_id
    ON completed_positions(namespace, id);
CREATE INDEX IF NOT EXISTS idx_completed_positions_namespace_opaque_id
    ON completed_positions(namespace, opaque_id);
"#;

/// SQLite DDL for the completed positions table.
///
/// `AUTOINCREMENT` keeps ids from being reused after the tail row is removed
/// by external retention jobs.
pub const CREATE_POSITIONS_TABLE_SQLITE: &str = r#"
CREATE TABLE IF NOT EXISTS completed_positions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    namespace TEXT NOT NULL,
    opaque_id TEXT NOT NULL,
    recorded_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
);

CREATE INDEX IF NOT EXISTS idx_completed_positions_namespace_id
    ON completed_positions(namespace, id);
CREATE INDEX IF NOT EXISTS idx_completed_positions_namespace_opaque_id
    ON completed_positions(namespace, opaque_id);
"#;
