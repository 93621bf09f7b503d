//! Batch job and result records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use switchyard_ai::Completion;

/// Lifecycle of a batch job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl BatchStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            BatchStatus::Pending => "pending",
            BatchStatus::Running => "running",
            BatchStatus::Completed => "completed",
            BatchStatus::Failed => "failed",
        }
    }
}

/// A list of prompts run one after another against one model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchJob {
    pub job_id: String,
    pub model_id: String,
    pub prompts: Vec<String>,
    pub status: BatchStatus,
    #[serde(default)]
    pub completed_count: usize,
    #[serde(default)]
    pub failed_count: usize,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    /// Fields written by newer versions, kept on rewrite.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl BatchJob {
    pub fn new(model_id: impl Into<String>, prompts: Vec<String>) -> Self {
        let id = uuid::Uuid::new_v4().simple().to_string();
        Self {
            job_id: id[..8].to_string(),
            model_id: model_id.into(),
            prompts,
            status: BatchStatus::Pending,
            completed_count: 0,
            failed_count: 0,
            started_at: None,
            completed_at: None,
            error_message: None,
            system_prompt: None,
            extra: Map::new(),
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    pub fn total(&self) -> usize {
        self.prompts.len()
    }

    /// Prompts with a result, successful or not.
    pub fn processed(&self) -> usize {
        self.completed_count + self.failed_count
    }

    pub fn was_cancelled(&self) -> bool {
        self.status == BatchStatus::Failed && self.error_message.as_deref() == Some(CANCELLED)
    }
}

pub(crate) const CANCELLED: &str = "cancelled";

/// Outcome of one prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResult {
    pub index: usize,
    pub prompt: String,
    pub response_text: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub duration_ms: u64,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Fields written by newer versions, kept on rewrite.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl BatchResult {
    pub fn from_completion(index: usize, prompt: String, completion: Completion) -> Self {
        let error_message = completion
            .error()
            .map(|(kind, message)| format!("{kind}: {message}"));
        Self {
            index,
            prompt,
            success: error_message.is_none(),
            response_text: completion.text,
            input_tokens: completion.input_tokens,
            output_tokens: completion.output_tokens,
            duration_ms: completion.duration_ms,
            error_message,
            extra: Map::new(),
        }
    }
}

/// A job together with the results gathered so far.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchRun {
    pub job: BatchJob,
    pub results: Vec<BatchResult>,
}

/// What to do when a prompt fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorPolicy {
    /// The first failure ends the job.
    Stop,
    /// Record failures and keep going.
    Continue,
    /// End the job once this many prompts have failed, counting failures
    /// from before a resume.
    Threshold(usize),
}

impl ErrorPolicy {
    pub(crate) fn should_stop(self, failed_count: usize) -> bool {
        match self {
            ErrorPolicy::Stop => failed_count > 0,
            ErrorPolicy::Continue => false,
            ErrorPolicy::Threshold(n) => failed_count >= n.max(1),
        }
    }
}

impl std::str::FromStr for ErrorPolicy {
    type Err = String;

    /// `stop`, `continue`, or `threshold:<n>`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        match s.as_str() {
            "stop" => Ok(ErrorPolicy::Stop),
            "continue" => Ok(ErrorPolicy::Continue),
            _ => s
                .strip_prefix("threshold:")
                .and_then(|n| n.trim().parse().ok())
                .map(ErrorPolicy::Threshold)
                .ok_or_else(|| {
                    format!("unknown error policy '{s}' (expected stop, continue or threshold:<n>)")
                }),
        }
    }
}

/// Chunk size between periodic checkpoints.
pub fn checkpoint_interval(total: usize) -> usize {
    if total < 20 {
        5
    } else if total < 100 {
        10
    } else {
        20
    }
}
