//! User-facing errors: one line naming the kind, one line of remediation.

use miette::Diagnostic;
use switchyard_catalog::{Catalog, ErrorKind};
use switchyard_engine::batch::CheckpointError;
use switchyard_engine::{EngineError, PreferenceError};
use switchyard_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
#[error("{}: {message}", .kind.as_str())]
pub struct CliError {
    pub kind: ErrorKind,
    pub message: String,
    #[help]
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            hint: default_hint(kind),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Convert an engine error, naming the missing key variable for auth
    /// failures on HTTP models.
    pub fn from_engine(err: EngineError, catalog: &Catalog) -> Self {
        let key_var = match &err {
            EngineError::Dispatch {
                model,
                kind: ErrorKind::Auth,
                ..
            } => catalog
                .get(model)
                .and_then(|m| m.http_location())
                .map(|http| http.key_env_var.clone()),
            _ => None,
        };
        let cli = Self::from(err);
        match key_var {
            Some(var) => cli.with_hint(format!("set the {var} environment variable")),
            None => cli,
        }
    }

    /// Process exit code: 1 user error, 2 backend error, 3 internal.
    pub fn exit_code(&self) -> u8 {
        match self.kind {
            ErrorKind::NotFound | ErrorKind::Validation | ErrorKind::Auth | ErrorKind::Cancelled => 1,
            ErrorKind::Backend | ErrorKind::Timeout => 2,
            ErrorKind::Io | ErrorKind::Internal => 3,
        }
    }
}

fn default_hint(kind: ErrorKind) -> Option<String> {
    let hint = match kind {
        ErrorKind::NotFound => "run `switchyard models` or `switchyard sessions list` to see valid ids",
        ErrorKind::Validation => "check the input file or arguments and try again",
        ErrorKind::Backend => {
            "check that the model runtime is installed (SWITCHYARD_LLAMA_CLI, SWITCHYARD_MLX_GENERATE)"
        }
        ErrorKind::Timeout => "raise SWITCHYARD_TIMEOUT_SECS or lower --max-tokens",
        ErrorKind::Auth => "set the API key environment variable for this model",
        ErrorKind::Io => "check that SWITCHYARD_HOME exists and is writable",
        ErrorKind::Internal => "this is a bug; rerun with --verbose and report it",
        ErrorKind::Cancelled => return None,
    };
    Some(hint.to_string())
}

impl From<EngineError> for CliError {
    fn from(err: EngineError) -> Self {
        Self::new(err.kind(), err.to_string())
    }
}

impl From<StoreError> for CliError {
    fn from(err: StoreError) -> Self {
        Self::new(err.kind(), err.to_string())
    }
}

impl From<PreferenceError> for CliError {
    fn from(err: PreferenceError) -> Self {
        Self::new(err.kind(), err.to_string())
    }
}

impl From<CheckpointError> for CliError {
    fn from(err: CheckpointError) -> Self {
        Self::from(EngineError::from(err))
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        Self::new(ErrorKind::Io, err.to_string())
    }
}

impl From<rustyline::error::ReadlineError> for CliError {
    fn from(err: rustyline::error::ReadlineError) -> Self {
        Self::new(ErrorKind::Io, format!("cannot read input: {err}"))
    }
}

pub type CliResult<T> = Result<T, CliError>;
