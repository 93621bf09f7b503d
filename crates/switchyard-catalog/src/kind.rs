//! Error taxonomy shared by every Switchyard crate.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of a failure, independent of which component raised it.
///
/// Every error type in the workspace maps onto exactly one kind, so the CLI
/// can pick an exit code and a remediation hint without knowing the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    /// A referenced session, model, checkpoint or workflow does not exist.
    NotFound,
    /// Input failed a structural or semantic check.
    Validation,
    /// The inference process or HTTP call failed.
    Backend,
    /// A deadline elapsed before completion.
    Timeout,
    /// Missing or rejected API key.
    Auth,
    /// Filesystem or database I/O failed.
    Io,
    /// Cooperative cancellation was observed.
    Cancelled,
    /// Invariant violation.
    Internal,
}

impl ErrorKind {
    /// Kebab-case name used in user-visible messages and persisted records.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not-found",
            ErrorKind::Validation => "validation",
            ErrorKind::Backend => "backend",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Auth => "auth",
            ErrorKind::Io => "io",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Internal => "internal",
        }
    }

    /// Whether orchestration layers (batch, workflow) may absorb this kind
    /// under their own error policy instead of failing fast.
    pub fn is_recoverable(self) -> bool {
        matches!(self, ErrorKind::Backend | ErrorKind::Timeout | ErrorKind::Io)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
