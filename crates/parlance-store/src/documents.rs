//! CRUD and query operations over documents.
//!
//! All writes notify the subscription hub after the connection lock has been
//! released, so subscribers always observe committed state.

use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

use crate::database::Database;
use crate::document::{DocPath, FieldUpdate, Fields, Query, Snapshot};
use crate::error::{Result, StoreError};

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a new document with a generated id.  Returns the id.
    pub fn add_document(&self, collection: &str, fields: &Fields) -> Result<String> {
        let id = Uuid::new_v4().simple().to_string();
        {
            let conn = self.conn()?;
            conn.execute(
                "INSERT INTO documents (collection, id, data, updated_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    collection,
                    id,
                    serde_json::to_string(fields)?,
                    Utc::now().to_rfc3339(),
                ],
            )?;
        }

        tracing::trace!(collection, id = %id, "document added");
        self.notify(collection);
        Ok(id)
    }

    /// Create or overwrite the document at `path`.  An overwritten document
    /// keeps its original insertion position.
    pub fn set_document(&self, path: &DocPath, fields: &Fields) -> Result<()> {
        {
            let conn = self.conn()?;
            conn.execute(
                "INSERT INTO documents (collection, id, data, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (collection, id)
                 DO UPDATE SET data = excluded.data, updated_at = excluded.updated_at",
                params![
                    path.collection(),
                    path.id(),
                    serde_json::to_string(fields)?,
                    Utc::now().to_rfc3339(),
                ],
            )?;
        }

        tracing::trace!(path = %path, "document set");
        self.notify(path.collection());
        Ok(())
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    pub fn get_document(&self, path: &DocPath) -> Result<Option<Snapshot>> {
        let data: Option<String> = self
            .conn()?
            .query_row(
                "SELECT data FROM documents WHERE collection = ?1 AND id = ?2",
                params![path.collection(), path.id()],
                |row| row.get(0),
            )
            .optional()?;

        data.map(|json| decode_row(path.clone(), &json)).transpose()
    }

    /// Run `query` against the current contents of its collection.
    pub fn run_query(&self, query: &Query) -> Result<Vec<Snapshot>> {
        let rows: Vec<(String, String)> = {
            let conn = self.conn()?;
            let mut stmt = conn.prepare(
                "SELECT id, data FROM documents
                 WHERE collection = ?1
                 ORDER BY seq ASC",
            )?;
            let rows = stmt.query_map(params![query.collection], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })?;

            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            out
        };

        let docs = rows
            .into_iter()
            .map(|(id, json)| decode_row(DocPath::new(query.collection.clone(), id), &json))
            .collect::<Result<Vec<_>>>()?;

        Ok(query.apply(docs))
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Apply `updates` to an existing document.  The read-modify-write happens
    /// under the connection lock, so increments from concurrent callers on
    /// this handle are not lost.
    pub fn update_document(&self, path: &DocPath, updates: &[FieldUpdate]) -> Result<()> {
        {
            let conn = self.conn()?;
            let data: Option<String> = conn
                .query_row(
                    "SELECT data FROM documents WHERE collection = ?1 AND id = ?2",
                    params![path.collection(), path.id()],
                    |row| row.get(0),
                )
                .optional()?;

            let data = data.ok_or_else(|| StoreError::NotFound(path.to_string()))?;
            let mut fields = decode_row(path.clone(), &data)?.fields;
            for update in updates {
                update.apply(path, &mut fields)?;
            }

            conn.execute(
                "UPDATE documents SET data = ?1, updated_at = ?2
                 WHERE collection = ?3 AND id = ?4",
                params![
                    serde_json::to_string(&fields)?,
                    Utc::now().to_rfc3339(),
                    path.collection(),
                    path.id(),
                ],
            )?;
        }

        tracing::trace!(path = %path, updates = updates.len(), "document updated");
        self.notify(path.collection());
        Ok(())
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    /// Delete a document.  Returns `true` if it existed.  Subcollections are
    /// not touched.
    pub fn delete_document(&self, path: &DocPath) -> Result<bool> {
        let affected = self.conn()?.execute(
            "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
            params![path.collection(), path.id()],
        )?;

        if affected > 0 {
            tracing::trace!(path = %path, "document deleted");
            self.notify(path.collection());
        }
        Ok(affected > 0)
    }
}

fn decode_row(path: DocPath, json: &str) -> Result<Snapshot> {
    match serde_json::from_str(json) {
        Ok(serde_json::Value::Object(fields)) => Ok(Snapshot { path, fields }),
        Ok(other) => Err(StoreError::Malformed {
            path: path.to_string(),
            reason: format!("expected an object, got {other}"),
        }),
        Err(e) => Err(StoreError::Malformed {
            path: path.to_string(),
            reason: e.to_string(),
        }),
    }
}
