//! Runtime state of a workflow run and its result file.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;

use super::definition::WorkflowDefinition;
use super::vars::{Value, Variables};
use crate::error::EngineError;
use crate::fsutil::atomic_write;

pub(crate) const CANCELLED: &str = "cancelled";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl WorkflowStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            WorkflowStatus::Pending => "pending",
            WorkflowStatus::Running => "running",
            WorkflowStatus::Completed => "completed",
            WorkflowStatus::Failed => "failed",
        }
    }
}

/// Outcome of one step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepResult {
    pub output: Option<Value>,
    pub error: Option<String>,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowExecution {
    pub workflow_id: String,
    pub workflow_name: String,
    pub status: WorkflowStatus,
    pub current_step_index: usize,
    pub variables: Variables,
    /// Keyed by step name, in the order steps finished. A loop body holds
    /// its last iteration.
    pub step_results: IndexMap<String, StepResult>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

impl WorkflowExecution {
    pub(crate) fn start(def: &WorkflowDefinition, initial: Variables) -> Self {
        let mut variables = def.variables.clone();
        variables.extend(initial);
        Self {
            workflow_id: def.id.clone(),
            workflow_name: def.name.clone(),
            status: WorkflowStatus::Running,
            current_step_index: 0,
            variables,
            step_results: IndexMap::new(),
            started_at: Utc::now(),
            completed_at: None,
            error_message: None,
        }
    }

    pub(crate) fn fail(&mut self, message: impl Into<String>) {
        self.status = WorkflowStatus::Failed;
        self.error_message = Some(message.into());
    }

    pub(crate) fn finish(&mut self) {
        if self.status == WorkflowStatus::Running {
            self.status = WorkflowStatus::Completed;
        }
        self.completed_at = Some(Utc::now());
    }

    /// Output recorded for a step, if it ran and produced one.
    pub fn output_of(&self, step: &str) -> Option<&Value> {
        self.step_results.get(step).and_then(|r| r.output.as_ref())
    }

    pub fn duration_seconds(&self) -> f64 {
        let end = self.completed_at.unwrap_or_else(Utc::now);
        (end - self.started_at).num_milliseconds() as f64 / 1000.0
    }

    pub fn was_cancelled(&self) -> bool {
        self.status == WorkflowStatus::Failed && self.error_message.as_deref() == Some(CANCELLED)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ResultFile<'a> {
    workflow_id: &'a str,
    workflow_name: &'a str,
    status: WorkflowStatus,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    duration_seconds: f64,
    variables: &'a Variables,
    step_results: IndexMap<&'a str, Option<&'a Value>>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    step_errors: IndexMap<&'a str, &'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_message: Option<&'a str>,
}

/// Write `execution` as `<dir>/<workflowId>_<timestamp>.json`.
pub fn save_result(execution: &WorkflowExecution, dir: &Path) -> Result<PathBuf, EngineError> {
    let file = ResultFile {
        workflow_id: &execution.workflow_id,
        workflow_name: &execution.workflow_name,
        status: execution.status,
        started_at: execution.started_at,
        completed_at: execution.completed_at,
        duration_seconds: execution.duration_seconds(),
        variables: &execution.variables,
        step_results: execution
            .step_results
            .iter()
            .map(|(name, r)| (name.as_str(), r.output.as_ref()))
            .collect(),
        step_errors: execution
            .step_results
            .iter()
            .filter_map(|(name, r)| r.error.as_deref().map(|e| (name.as_str(), e)))
            .collect(),
        error_message: execution.error_message.as_deref(),
    };

    let stem: String = execution
        .workflow_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    let stamp = execution
        .completed_at
        .unwrap_or(execution.started_at)
        .format("%Y%m%d_%H%M%S_%3f");
    let path = dir.join(format!("{stem}_{stamp}.json"));

    atomic_write(&path, serde_json::to_string_pretty(&file)?.as_bytes())?;
    tracing::info!(path = %path.display(), "saved workflow result");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_file_shape() {
        let def: WorkflowDefinition = serde_json::from_str(
            r#"{"id": "review", "name": "Review", "variables": {"lang": "rust"}, "steps": []}"#,
        )
        .unwrap();
        let mut exec = WorkflowExecution::start(&def, Variables::new());
        exec.step_results.insert(
            "analyze".into(),
            StepResult {
                output: Some(Value::text("Quality score: 8")),
                error: None,
                duration_ms: 5,
            },
        );
        exec.step_results.insert(
            "broken".into(),
            StepResult {
                output: None,
                error: Some("backend: boom".into()),
                duration_ms: 1,
            },
        );
        exec.finish();

        let dir = tempfile::tempdir().unwrap();
        let path = save_result(&exec, dir.path()).unwrap();
        assert!(path
            .file_name()
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("review_"));

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["workflowId"], "review");
        assert_eq!(raw["status"], "completed");
        assert_eq!(raw["variables"]["lang"], "rust");
        assert_eq!(raw["stepResults"]["analyze"], "Quality score: 8");
        assert!(raw["stepResults"]["broken"].is_null());
        assert_eq!(raw["stepErrors"]["broken"], "backend: boom");
        assert!(raw.get("errorMessage").is_none());
        assert!(raw["durationSeconds"].is_number());
    }
}
