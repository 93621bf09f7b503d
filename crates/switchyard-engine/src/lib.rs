//! # Switchyard Engine
//!
//! Everything that sits above a single dispatch: picking a model for a
//! prompt, remembering the user's picks, running prompt batches with
//! checkpoints, and interpreting multi-step workflows.
//!
//! ## Architecture
//!
//! ```text
//!                 ┌──────────────────────────────┐
//!                 │             Core             │
//!                 └──┬─────────┬─────────┬───────┘
//!                    │         │         │
//!            ┌───────┴──┐ ┌────┴────┐ ┌──┴────────────┐
//!            │ Selector │ │  Batch  │ │   Workflow    │
//!            │ + prefs  │ │ + ckpt  │ │  interpreter  │
//!            └───────┬──┘ └────┬────┘ └──┬────────────┘
//!                    └─────────┼─────────┘
//!                         Dispatch (switchyard-ai)
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! use switchyard_engine::{AskOptions, Core, CoreConfig, ModelChoice};
//!
//! let core = Core::open(CoreConfig::from_env())?;
//! let turn = core
//!     .ask(ModelChoice::Auto, "Write a binary search in Rust", None, AskOptions::default())
//!     .await?;
//! println!("{}", turn.completion.text);
//! ```

pub mod batch;
mod config;
mod context;
mod error;
mod fsutil;
mod preferences;
pub mod selector;
pub mod templates;
pub mod workflow;

#[cfg(test)]
mod testing;

pub use context::{AskOptions, AskOutcome, Core, ModelChoice, DEFAULT_HISTORY_MESSAGES};
pub use config::{CoreConfig, CoreConfigBuilder};
pub use error::{EngineError, Result};
pub use preferences::{PreferenceError, PreferenceStore, Preferences, BYPASS_CONFIRMATIONS_KEY};
pub use selector::{
    classify, explain, Classification, ModelSelector, Recommendation, Selection, SelectionSource,
};

// Re-export dispatch and catalog types for convenience
pub use switchyard_ai::{Completion, Dispatch, DispatchRequest, Termination};
pub use switchyard_catalog::{Catalog, ErrorKind, IntentCategory, ModelDescriptor};
