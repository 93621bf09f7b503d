//! Error types for local inference.

use std::time::Duration;

use switchyard_catalog::ErrorKind;
use thiserror::Error;

/// Errors that can occur while running a local inference subprocess.
#[derive(Debug, Error)]
pub enum LocalError {
    /// The backend binary could not be found.
    #[error("inference binary '{0}' not found. Install it or point the config at it")]
    BinaryNotFound(String),

    /// The process could not be started.
    #[error("failed to start inference process: {0}")]
    Spawn(std::io::Error),

    /// The process exited with a non-zero status.
    #[error("inference process exited with {code}: {stderr}")]
    Exit { code: String, stderr: String },

    /// The deadline elapsed; the process was killed.
    #[error("inference process killed after {0:?}")]
    Timeout(Duration),

    /// The backend is not usable on this host.
    #[error("backend unavailable on this host: {0}")]
    UnsupportedPlatform(String),

    /// I/O error while talking to the process.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LocalError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LocalError::Timeout(_) => ErrorKind::Timeout,
            _ => ErrorKind::Backend,
        }
    }
}
