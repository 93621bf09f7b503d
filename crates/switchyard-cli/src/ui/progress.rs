//! Batch progress bar.

use indicatif::{ProgressBar, ProgressStyle};
use switchyard_engine::batch::{BatchJob, BatchObserver, ObserverError};

pub struct BatchProgress {
    bar: ProgressBar,
}

impl BatchProgress {
    /// A bar over `job`'s prompts, starting at what is already done.
    pub fn new(job: &BatchJob) -> Self {
        let bar = ProgressBar::new(job.total() as u64);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");
        bar.set_style(style);
        bar.set_position(job.processed() as u64);
        Self { bar }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl BatchObserver for BatchProgress {
    fn on_progress(&mut self, job: &BatchJob, processed: usize) -> Result<(), ObserverError> {
        self.bar.set_position(processed as u64);
        self.bar
            .set_message(format!("{} ok, {} failed", job.completed_count, job.failed_count));
        Ok(())
    }
}
