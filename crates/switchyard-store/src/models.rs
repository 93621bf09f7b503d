//! Records persisted in the session database.
//!
//! Every struct derives `Serialize`/`Deserialize` so the CLI can print it as
//! JSON and the export format can reuse it directly.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Free-form per-message metadata (selection details, termination, ...).
pub type Metadata = serde_json::Map<String, serde_json::Value>;

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            "system" => Ok(Role::System),
            _ => Err(StoreError::InvalidRole(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// A conversation against one model, with running aggregates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub model_id: String,
    /// Copied from the catalog when the session was created.
    pub model_display_name: String,
    /// Empty until set explicitly or derived from the first user message.
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub message_count: u64,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_duration_ms: u64,
}

/// A session plus previews of its first prompt and latest message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    #[serde(flatten)]
    pub session: Session,
    pub first_prompt: Option<String>,
    pub last_message: Option<String>,
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub session_id: String,
    /// 1-based, dense within the session.
    pub sequence_number: u64,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
    /// Size of this message's own text, when known.
    pub token_count: Option<u64>,
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub metadata: Metadata,
}

/// A message about to be appended.
///
/// User messages usually carry only `token_count`; assistant messages carry
/// the prompt/response figures reported by the dispatcher. Only
/// `input_tokens`, `output_tokens` and `duration_ms` feed session aggregates.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMessage {
    pub role: Role,
    pub content: String,
    pub token_count: Option<u64>,
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
    pub duration_ms: Option<u64>,
    pub metadata: Metadata,
}

impl NewMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            token_count: None,
            input_tokens: None,
            output_tokens: None,
            duration_ms: None,
            metadata: Metadata::new(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn with_token_count(mut self, tokens: u64) -> Self {
        self.token_count = Some(tokens);
        self
    }

    pub fn with_usage(mut self, input_tokens: u64, output_tokens: u64, duration_ms: u64) -> Self {
        self.input_tokens = Some(input_tokens);
        self.output_tokens = Some(output_tokens);
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// Identity of an appended message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageRef {
    pub id: i64,
    pub sequence_number: u64,
}

// ---------------------------------------------------------------------------
// Tags, bookmarks, search
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bookmark {
    pub session_id: String,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One search result. Lower rank is more relevant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub session_id: String,
    pub rank: f64,
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Markdown,
}

impl FromStr for ExportFormat {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "markdown" | "md" => Ok(ExportFormat::Markdown),
            _ => Err(StoreError::UnsupportedFormat(s.to_string())),
        }
    }
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Markdown => "md",
        }
    }
}

// ---------------------------------------------------------------------------
// Statistics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub window_days: u32,
    pub sessions: u64,
    pub messages: u64,
    pub user_messages: u64,
    pub assistant_messages: u64,
    pub total_tokens: u64,
    pub avg_tokens_per_message: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelUsage {
    pub model_id: String,
    pub session_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyActivity {
    /// `YYYY-MM-DD`, UTC.
    pub date: String,
    pub message_count: u64,
}

/// A row of the `session_summary` view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummaryRow {
    pub session_id: String,
    pub model_id: String,
    pub title: String,
    pub last_activity_at: DateTime<Utc>,
    pub message_count: u64,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_duration_ms: u64,
    pub tag_count: u64,
    pub bookmarked: bool,
}

/// A row of the `model_performance` view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPerformance {
    pub model_id: String,
    pub session_count: u64,
    pub response_count: u64,
    pub avg_duration_ms: Option<f64>,
    pub avg_output_tokens: Option<f64>,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub tokens_per_second: Option<f64>,
}

/// A row of the `daily_statistics` view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyStatistics {
    pub day: String,
    pub active_sessions: u64,
    pub message_count: u64,
    pub user_messages: u64,
    pub assistant_messages: u64,
    pub total_tokens: u64,
}
