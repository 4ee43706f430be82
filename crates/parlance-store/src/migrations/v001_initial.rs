//! v001 -- Initial schema creation.
//!
//! Every collection lives in the single `documents` table.  `seq` preserves
//! insertion order, which is the tie-breaker when a query orders by a field.

use rusqlite::Connection;

const UP_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS documents (
    seq        INTEGER PRIMARY KEY AUTOINCREMENT,
    collection TEXT NOT NULL,                 -- e.g. chatRooms/{id}/messages
    id         TEXT NOT NULL,
    data       TEXT NOT NULL,                 -- JSON object
    updated_at TEXT NOT NULL,                 -- RFC-3339

    UNIQUE (collection, id)
);

CREATE INDEX IF NOT EXISTS idx_documents_collection_seq
    ON documents(collection, seq);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
