//! Dispatch request and result types.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use switchyard_catalog::{ErrorKind, SamplingParams};

/// One generation request.
#[derive(Debug, Clone, Default)]
pub struct DispatchRequest {
    pub system_prompt: Option<String>,
    pub user_prompt: String,
    /// Per-call sampling overrides; unset fields fall back to the catalog.
    pub overrides: SamplingParams,
    /// Kill the call after this long. `None` uses the dispatcher default.
    pub deadline: Option<Duration>,
}

impl DispatchRequest {
    pub fn new(user_prompt: impl Into<String>) -> Self {
        Self {
            user_prompt: user_prompt.into(),
            ..Self::default()
        }
    }

    pub fn with_system(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    pub fn with_overrides(mut self, overrides: SamplingParams) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

/// How a generation ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Termination {
    Normal,
    MaxTokens,
    Error { kind: ErrorKind, message: String },
}

/// One finished generation: text plus accounting metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    pub text: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub duration_ms: u64,
    pub termination: Termination,
}

impl Completion {
    /// A failed completion with no text.
    pub fn failed(kind: ErrorKind, message: impl Into<String>, duration: Duration) -> Self {
        Self {
            text: String::new(),
            input_tokens: 0,
            output_tokens: 0,
            duration_ms: duration.as_millis() as u64,
            termination: Termination::Error {
                kind,
                message: message.into(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        !matches!(self.termination, Termination::Error { .. })
    }

    /// Error kind and message, if the generation failed.
    pub fn error(&self) -> Option<(ErrorKind, &str)> {
        match &self.termination {
            Termination::Error { kind, message } => Some((*kind, message.as_str())),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_completion() {
        let c = Completion::failed(ErrorKind::Auth, "no key", Duration::from_millis(12));
        assert!(!c.is_success());
        assert_eq!(c.error(), Some((ErrorKind::Auth, "no key")));
        assert_eq!(c.duration_ms, 12);
    }

    #[test]
    fn test_termination_serialization() {
        let json = serde_json::to_value(Termination::Error {
            kind: ErrorKind::Timeout,
            message: "slow".to_string(),
        })
        .unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["kind"], "timeout");
        assert_eq!(
            serde_json::to_value(Termination::MaxTokens).unwrap()["status"],
            "max_tokens"
        );
    }
}
