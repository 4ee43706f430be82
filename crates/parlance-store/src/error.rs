use thiserror::Error;

/// Errors produced by the store layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite error.
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Failed to determine a platform data directory.
    #[error("Could not determine application data directory")]
    NoDataDir,

    /// Generic I/O error (e.g. creating the database directory).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The addressed document does not exist.
    #[error("Document not found: {0}")]
    NotFound(String),

    /// A stored document could not be decoded into the expected record.
    #[error("Malformed document {path}: {reason}")]
    Malformed { path: String, reason: String },

    /// A field update could not be applied to the stored document.
    #[error("Invalid update on {path}: {reason}")]
    InvalidUpdate { path: String, reason: String },

    /// Migration failure.
    #[error("Migration error: {0}")]
    Migration(String),

    /// JSON encoding error.
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// A thread panicked while holding the connection lock.
    #[error("Lock poisoned")]
    LockPoisoned,
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
