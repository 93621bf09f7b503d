//! Batch executor: many prompts, one model, resumable through checkpoints.

mod checkpoint;
mod executor;
mod export;
mod job;
mod loader;

pub use checkpoint::{CheckpointError, CheckpointStore, CheckpointSummary};
pub use executor::{BatchExecutor, BatchObserver, NoProgress, ObserverError};
pub use export::{export_results, render_results, ResultFormat};
pub use job::{checkpoint_interval, BatchJob, BatchResult, BatchRun, BatchStatus, ErrorPolicy};
pub use loader::{load_prompts, parse_json_prompts, parse_text_prompts};
