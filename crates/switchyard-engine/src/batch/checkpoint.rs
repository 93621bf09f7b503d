//! Durable batch checkpoints: one `batch_<jobId>.json` file per job.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use switchyard_catalog::ErrorKind;
use thiserror::Error;
use tracing::{debug, warn};

use super::job::{BatchJob, BatchResult, BatchStatus};
use crate::fsutil::atomic_write;

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("no checkpoint for batch '{0}'")]
    NotFound(String),

    #[error("invalid batch id '{0}'")]
    InvalidJobId(String),

    #[error("checkpoint I/O failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("checkpoint {path} is corrupt: {reason}")]
    Corrupt { path: PathBuf, reason: String },
}

impl CheckpointError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CheckpointError::NotFound(_) => ErrorKind::NotFound,
            CheckpointError::InvalidJobId(_) | CheckpointError::Corrupt { .. } => {
                ErrorKind::Validation
            }
            CheckpointError::Io { .. } => ErrorKind::Io,
        }
    }
}

/// On-disk shape.
#[derive(Debug, Serialize, Deserialize)]
struct CheckpointFile {
    job: BatchJob,
    results: Vec<BatchResult>,
    timestamp: DateTime<Utc>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

/// Listing entry for one checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckpointSummary {
    pub job_id: String,
    pub model_id: String,
    pub completed_count: usize,
    pub failed_count: usize,
    pub total_prompts: usize,
    pub status: BatchStatus,
    pub last_checkpoint: DateTime<Utc>,
    pub path: PathBuf,
}

/// Directory of checkpoint files.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    dir: PathBuf,
}

impl CheckpointStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, job_id: &str) -> Result<PathBuf, CheckpointError> {
        let valid = !job_id.is_empty()
            && job_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(CheckpointError::InvalidJobId(job_id.to_string()));
        }
        Ok(self.dir.join(format!("batch_{job_id}.json")))
    }

    /// Atomically replace the checkpoint for `job`.
    pub fn save(&self, job: &BatchJob, results: &[BatchResult]) -> Result<PathBuf, CheckpointError> {
        let path = self.path_for(&job.job_id)?;

        // Keep top-level keys a newer writer may have added.
        let extra = read_file(&path).map(|f| f.extra).unwrap_or_default();

        let file = CheckpointFile {
            job: job.clone(),
            results: results.to_vec(),
            timestamp: Utc::now(),
            extra,
        };
        let json = serde_json::to_vec_pretty(&file).map_err(|e| CheckpointError::Corrupt {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        atomic_write(&path, &json).map_err(|source| CheckpointError::Io {
            path: path.clone(),
            source,
        })?;
        debug!(job = %job.job_id, results = results.len(), "checkpoint written");
        Ok(path)
    }

    /// Load a checkpoint by job id.
    pub fn load(&self, job_id: &str) -> Result<(BatchJob, Vec<BatchResult>), CheckpointError> {
        let path = self.path_for(job_id)?;
        if !path.exists() {
            return Err(CheckpointError::NotFound(job_id.to_string()));
        }
        self.load_file(&path)
    }

    /// Load and check a checkpoint file.
    pub fn load_file(&self, path: &Path) -> Result<(BatchJob, Vec<BatchResult>), CheckpointError> {
        let file = read_file(path)?;
        check_consistency(&file.job, &file.results).map_err(|reason| CheckpointError::Corrupt {
            path: path.to_path_buf(),
            reason,
        })?;
        Ok((file.job, file.results))
    }

    /// Summaries of every readable checkpoint, newest first. Unreadable files
    /// are skipped with a warning.
    pub fn list(&self) -> Result<Vec<CheckpointSummary>, CheckpointError> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(CheckpointError::Io {
                    path: self.dir.clone(),
                    source,
                })
            }
        };

        let mut summaries = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            let is_checkpoint = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("batch_") && n.ends_with(".json"));
            if !is_checkpoint {
                continue;
            }
            match read_file(&path) {
                Ok(file) => summaries.push(CheckpointSummary {
                    job_id: file.job.job_id,
                    model_id: file.job.model_id,
                    completed_count: file.job.completed_count,
                    failed_count: file.job.failed_count,
                    total_prompts: file.job.prompts.len(),
                    status: file.job.status,
                    last_checkpoint: file.timestamp,
                    path,
                }),
                Err(e) => warn!("skipping checkpoint: {}", e),
            }
        }

        summaries.sort_by(|a, b| {
            b.last_checkpoint
                .cmp(&a.last_checkpoint)
                .then_with(|| a.job_id.cmp(&b.job_id))
        });
        Ok(summaries)
    }

    /// Delete a checkpoint. Returns whether one existed.
    pub fn purge(&self, job_id: &str) -> Result<bool, CheckpointError> {
        let path = self.path_for(job_id)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(CheckpointError::Io { path, source }),
        }
    }
}

fn read_file(path: &Path) -> Result<CheckpointFile, CheckpointError> {
    let text = std::fs::read_to_string(path).map_err(|source| CheckpointError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|e| CheckpointError::Corrupt {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

fn check_consistency(job: &BatchJob, results: &[BatchResult]) -> Result<(), String> {
    if results.len() > job.prompts.len() {
        return Err(format!(
            "{} results for {} prompts",
            results.len(),
            job.prompts.len()
        ));
    }
    if let Some((pos, r)) = results.iter().enumerate().find(|(i, r)| r.index != *i) {
        return Err(format!("result {pos} has index {}", r.index));
    }
    let succeeded = results.iter().filter(|r| r.success).count();
    let failed = results.len() - succeeded;
    if succeeded != job.completed_count || failed != job.failed_count {
        return Err(format!(
            "counters {}/{} disagree with results {}/{}",
            job.completed_count, job.failed_count, succeeded, failed
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job_with_results(n: usize, of: usize) -> (BatchJob, Vec<BatchResult>) {
        let prompts: Vec<String> = (0..of).map(|i| format!("prompt {i}")).collect();
        let mut job = BatchJob::new("phi4-14b", prompts);
        job.status = BatchStatus::Running;
        let results: Vec<BatchResult> = (0..n)
            .map(|i| BatchResult {
                index: i,
                prompt: format!("prompt {i}"),
                response_text: format!("answer {i}"),
                input_tokens: 2,
                output_tokens: 5,
                duration_ms: 100,
                success: true,
                error_message: None,
                extra: Default::default(),
            })
            .collect();
        job.completed_count = n;
        (job, results)
    }

    #[test]
    fn test_save_load_list_purge() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path().join("checkpoints"));
        let (job, results) = job_with_results(3, 10);

        let path = store.save(&job, &results).unwrap();
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            format!("batch_{}.json", job.job_id)
        );

        let (loaded, loaded_results) = store.load(&job.job_id).unwrap();
        assert_eq!(loaded, job);
        assert_eq!(loaded_results, results);

        let listed = store.list().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].completed_count, 3);
        assert_eq!(listed[0].total_prompts, 10);

        assert!(store.purge(&job.job_id).unwrap());
        assert!(!store.purge(&job.job_id).unwrap());
        assert!(matches!(
            store.load(&job.job_id),
            Err(CheckpointError::NotFound(_))
        ));
    }

    #[test]
    fn test_inconsistent_counters_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path());
        let (mut job, results) = job_with_results(2, 4);
        job.completed_count = 5;
        store.save(&job, &results).unwrap();
        assert!(matches!(
            store.load(&job.job_id),
            Err(CheckpointError::Corrupt { .. })
        ));
    }

    #[test]
    fn test_list_skips_corrupt_and_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path());
        std::fs::write(dir.path().join("batch_broken.json"), "{").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "hi").unwrap();
        let (job, results) = job_with_results(1, 1);
        store.save(&job, &results).unwrap();

        let listed = store.list().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].job_id, job.job_id);
    }

    #[test]
    fn test_unknown_top_level_keys_survive_rewrite() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path());
        let (job, results) = job_with_results(1, 2);
        let path = store.save(&job, &results).unwrap();

        let mut raw: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        raw["host"] = Value::String("box-1".into());
        std::fs::write(&path, serde_json::to_string(&raw).unwrap()).unwrap();

        store.save(&job, &results).unwrap();
        let raw: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["host"], "box-1");
    }

    #[test]
    fn test_unknown_result_keys_survive_load_and_save() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path());
        let (job, results) = job_with_results(1, 2);
        let path = store.save(&job, &results).unwrap();

        let mut raw: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        raw["results"][0]["reviewer"] = Value::String("sam".into());
        std::fs::write(&path, serde_json::to_string(&raw).unwrap()).unwrap();

        let (job, results) = store.load(&job.job_id).unwrap();
        assert_eq!(results[0].extra["reviewer"], "sam");
        store.save(&job, &results).unwrap();
        let raw: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["results"][0]["reviewer"], "sam");
    }

    #[test]
    fn test_rejects_path_like_ids() {
        let store = CheckpointStore::new("/tmp");
        assert!(matches!(
            store.path_for("../etc"),
            Err(CheckpointError::InvalidJobId(_))
        ));
    }

    #[test]
    fn test_missing_dir_lists_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path().join("nope"));
        assert!(store.list().unwrap().is_empty());
    }
}
