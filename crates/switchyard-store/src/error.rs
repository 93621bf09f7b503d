use switchyard_catalog::ErrorKind;
use thiserror::Error;

/// Errors produced by the store layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite error.
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Generic I/O error (e.g. creating the database directory).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The referenced session does not exist.
    #[error("session '{0}' not found")]
    SessionNotFound(String),

    #[error("invalid message role '{0}' (expected user, assistant or system)")]
    InvalidRole(String),

    #[error("unsupported export format '{0}' (expected json or markdown)")]
    UnsupportedFormat(String),

    /// An import document is structurally wrong.
    #[error("invalid session export: {0}")]
    InvalidExport(String),

    /// Migration failure.
    #[error("migration error: {0}")]
    Migration(String),

    #[error("timestamp parse error: {0}")]
    Timestamp(#[from] chrono::ParseError),

    /// A previous writer panicked while holding the connection.
    #[error("database connection lock poisoned")]
    Poisoned,
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::SessionNotFound(_) => ErrorKind::NotFound,
            StoreError::InvalidRole(_)
            | StoreError::UnsupportedFormat(_)
            | StoreError::InvalidExport(_) => ErrorKind::Validation,
            StoreError::Migration(_) | StoreError::Poisoned => ErrorKind::Internal,
            StoreError::Sqlite(_)
            | StoreError::Io(_)
            | StoreError::Json(_)
            | StoreError::Timestamp(_) => ErrorKind::Io,
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
