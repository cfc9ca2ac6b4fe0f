//! SQLite schema definitions for the rollup database.

use crate::sqlite_column;
use crate::sqlite_persistence::{Column, SqlType, Table, VersionedSchema};

// =============================================================================
// Version 1 - Rollup state key-value store
// =============================================================================

/// Key-value table holding the accumulated rollup and its revision.
const ROLLUP_STATE_TABLE_V1: Table = Table {
    name: "rollup_state",
    columns: &[
        sqlite_column!("key", &SqlType::Text, is_primary_key = true),
        sqlite_column!("value", &SqlType::Text, non_null = true), // JSON
        sqlite_column!("revision", &SqlType::Integer, non_null = true),
        sqlite_column!("updated_at", &SqlType::Integer, non_null = true), // unix millis
    ],
    indices: &[],
};

// =============================================================================
// Version 2 - Statement batch log
// =============================================================================

const STATEMENT_BATCHES_TABLE_V2: Table = Table {
    name: "statement_batches",
    columns: &[
        sqlite_column!("batch_id", &SqlType::Text, is_primary_key = true), // UUID
        sqlite_column!("source_filename", &SqlType::Text, non_null = true),
        sqlite_column!("row_count", &SqlType::Integer, non_null = true),
        sqlite_column!("rows_skipped", &SqlType::Integer, non_null = true),
        sqlite_column!("unparseable_numbers", &SqlType::Integer, non_null = true),
        sqlite_column!("release_date_override", &SqlType::Text),
        sqlite_column!("currencies", &SqlType::Text, non_null = true), // JSON array
        sqlite_column!("ingested_at", &SqlType::Integer, non_null = true), // unix millis
        sqlite_column!("total_revenue", &SqlType::Text, non_null = true), // decimal string
        sqlite_column!("total_streams", &SqlType::Integer, non_null = true),
        sqlite_column!("rollup", &SqlType::Text), // JSON, NULL when history is not kept
    ],
    indices: &[("idx_statement_batches_ingested_at", "ingested_at")],
};

/// Migration from version 1 to version 2: add the batch log
fn migrate_v1_to_v2(conn: &rusqlite::Connection) -> anyhow::Result<()> {
    conn.execute(
        "CREATE TABLE statement_batches (
            batch_id TEXT PRIMARY KEY,
            source_filename TEXT NOT NULL,
            row_count INTEGER NOT NULL,
            rows_skipped INTEGER NOT NULL,
            unparseable_numbers INTEGER NOT NULL,
            release_date_override TEXT,
            currencies TEXT NOT NULL,
            ingested_at INTEGER NOT NULL,
            total_revenue TEXT NOT NULL,
            total_streams INTEGER NOT NULL,
            rollup TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX idx_statement_batches_ingested_at ON statement_batches(ingested_at)",
        [],
    )?;
    Ok(())
}

// =============================================================================
// Versioned Schema Definition
// =============================================================================

/// Version 1: rollup_state key-value store
/// Version 2: statement_batches log
pub const ROLLUP_VERSIONED_SCHEMAS: &[VersionedSchema] = &[
    VersionedSchema {
        version: 1,
        tables: &[ROLLUP_STATE_TABLE_V1],
        migration: None,
    },
    VersionedSchema {
        version: 2,
        tables: &[ROLLUP_STATE_TABLE_V1, STATEMENT_BATCHES_TABLE_V2],
        migration: Some(migrate_v1_to_v2),
    },
];
