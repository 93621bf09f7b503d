//! Sequential batch execution with periodic checkpoints.

use std::sync::Arc;

use chrono::Utc;
use switchyard_ai::{Dispatch, DispatchRequest};
use switchyard_catalog::Catalog;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::checkpoint::CheckpointStore;
use super::job::{
    checkpoint_interval, BatchJob, BatchResult, BatchRun, BatchStatus, ErrorPolicy, CANCELLED,
};
use crate::error::EngineError;

/// Error type progress observers may return.
pub type ObserverError = Box<dyn std::error::Error + Send + Sync>;

/// Told about progress after every prompt. Failures are logged, never fatal.
pub trait BatchObserver: Send {
    fn on_progress(&mut self, job: &BatchJob, processed: usize) -> Result<(), ObserverError>;
}

impl<F> BatchObserver for F
where
    F: FnMut(&BatchJob, usize) -> Result<(), ObserverError> + Send,
{
    fn on_progress(&mut self, job: &BatchJob, processed: usize) -> Result<(), ObserverError> {
        self(job, processed)
    }
}

/// Observer that ignores progress.
pub struct NoProgress;

impl BatchObserver for NoProgress {
    fn on_progress(&mut self, _job: &BatchJob, _processed: usize) -> Result<(), ObserverError> {
        Ok(())
    }
}

/// Runs batch jobs one prompt at a time.
pub struct BatchExecutor {
    catalog: Arc<Catalog>,
    dispatcher: Arc<dyn Dispatch>,
    checkpoints: CheckpointStore,
}

impl BatchExecutor {
    pub fn new(
        catalog: Arc<Catalog>,
        dispatcher: Arc<dyn Dispatch>,
        checkpoints: CheckpointStore,
    ) -> Self {
        Self {
            catalog,
            dispatcher,
            checkpoints,
        }
    }

    pub fn checkpoints(&self) -> &CheckpointStore {
        &self.checkpoints
    }

    /// Run a fresh job from its first prompt.
    pub async fn run(
        &self,
        job: BatchJob,
        policy: ErrorPolicy,
        observer: &mut dyn BatchObserver,
        cancel: &CancellationToken,
    ) -> Result<BatchRun, EngineError> {
        self.drive(job, Vec::new(), policy, observer, cancel).await
    }

    /// Continue a checkpointed job after its last recorded result.
    pub async fn resume(
        &self,
        job_id: &str,
        policy: ErrorPolicy,
        observer: &mut dyn BatchObserver,
        cancel: &CancellationToken,
    ) -> Result<BatchRun, EngineError> {
        let (mut job, results) = self.checkpoints.load(job_id)?;
        info!(
            job = %job.job_id,
            done = results.len(),
            total = job.prompts.len(),
            "resuming batch"
        );
        job.status = BatchStatus::Running;
        job.error_message = None;
        job.completed_at = None;
        self.drive(job, results, policy, observer, cancel).await
    }

    async fn drive(
        &self,
        mut job: BatchJob,
        mut results: Vec<BatchResult>,
        policy: ErrorPolicy,
        observer: &mut dyn BatchObserver,
        cancel: &CancellationToken,
    ) -> Result<BatchRun, EngineError> {
        let model = self
            .catalog
            .get(&job.model_id)
            .ok_or_else(|| EngineError::UnknownModel(job.model_id.clone()))?;

        job.started_at.get_or_insert_with(Utc::now);

        if job.prompts.is_empty() {
            job.status = BatchStatus::Completed;
            job.completed_at = Some(Utc::now());
            return Ok(BatchRun { job, results });
        }

        job.status = BatchStatus::Running;
        let interval = checkpoint_interval(job.prompts.len());
        info!(job = %job.job_id, model = %job.model_id, prompts = job.prompts.len(), "starting batch");

        for index in results.len()..job.prompts.len() {
            if cancel.is_cancelled() {
                job.status = BatchStatus::Failed;
                job.error_message = Some(CANCELLED.to_string());
                break;
            }

            let prompt = job.prompts[index].clone();
            let mut request = DispatchRequest::new(prompt.clone());
            if let Some(system) = &job.system_prompt {
                request = request.with_system(system.clone());
            }

            let completion = self.dispatcher.dispatch(model, &request).await;
            let result = BatchResult::from_completion(index, prompt, completion);
            let failure = result.error_message.clone().filter(|_| !result.success);
            if result.success {
                job.completed_count += 1;
            } else {
                job.failed_count += 1;
            }
            results.push(result);

            if let Err(e) = observer.on_progress(&job, index + 1) {
                warn!(job = %job.job_id, "progress callback failed: {}", e);
            }

            if let Some(message) = failure {
                warn!(job = %job.job_id, index, "prompt failed: {}", message);
                if policy.should_stop(job.failed_count) {
                    job.status = BatchStatus::Failed;
                    job.error_message = Some(format!("stopped at prompt {index}: {message}"));
                    break;
                }
            }

            if results.len() % interval == 0 && results.len() < job.prompts.len() {
                if let Err(e) = self.checkpoints.save(&job, &results) {
                    warn!(job = %job.job_id, "periodic checkpoint failed: {}", e);
                }
            }
        }

        if job.status == BatchStatus::Running {
            job.status = BatchStatus::Completed;
        }
        job.completed_at = Some(Utc::now());
        self.checkpoints.save(&job, &results)?;

        info!(
            job = %job.job_id,
            status = job.status.as_str(),
            completed = job.completed_count,
            failed = job.failed_count,
            "batch finished"
        );
        Ok(BatchRun { job, results })
    }
}
