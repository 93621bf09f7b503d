use std::path::PathBuf;

use switchyard_catalog::{CatalogError, ErrorKind};
use switchyard_store::StoreError;
use thiserror::Error;

use crate::batch::CheckpointError;
use crate::preferences::PreferenceError;
use crate::templates::TemplateError;
use crate::workflow::ValidationError;

/// Errors surfaced by the core.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Preferences(#[from] PreferenceError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    #[error("unknown model '{0}'")]
    UnknownModel(String),

    /// A dispatch came back as an error completion.
    #[error("model '{model}' failed ({kind}): {message}")]
    Dispatch {
        model: String,
        kind: ErrorKind,
        message: String,
    },

    #[error("workflow '{0}' not found")]
    WorkflowNotFound(String),

    #[error("workflow '{name}' is invalid: {}", join_errors(.errors))]
    InvalidWorkflow {
        name: String,
        errors: Vec<ValidationError>,
    },

    #[error("cannot read prompts from {path}: {reason}")]
    InvalidPrompts { path: PathBuf, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("cancelled")]
    Cancelled,

    #[error("internal error: {0}")]
    Internal(String),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Store(e) => e.kind(),
            EngineError::Catalog(e) => e.kind(),
            EngineError::Preferences(e) => e.kind(),
            EngineError::Template(e) => e.kind(),
            EngineError::Checkpoint(e) => e.kind(),
            EngineError::UnknownModel(_) | EngineError::WorkflowNotFound(_) => ErrorKind::NotFound,
            EngineError::Dispatch { kind, .. } => *kind,
            EngineError::InvalidWorkflow { .. }
            | EngineError::InvalidPrompts { .. }
            | EngineError::Json(_) => ErrorKind::Validation,
            EngineError::Io(_) => ErrorKind::Io,
            EngineError::Cancelled => ErrorKind::Cancelled,
            EngineError::Internal(_) => ErrorKind::Internal,
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
