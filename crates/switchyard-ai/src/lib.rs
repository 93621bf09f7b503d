//! # Switchyard Dispatch
//!
//! Turns a model descriptor plus a prompt into a finished [`Completion`].
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │ ModelDescriptor │ --> │   Dispatcher    │ --> │   Completion    │
//! │ + prompt        │     │ (merge, gate)   │     │ text + counts   │
//! └─────────────────┘     └────────┬────────┘     └─────────────────┘
//!                                  │
//!                 ┌────────────────┼────────────────┐
//!                 │                │                │
//!            local-gguf        local-mlx        http-api
//!            (llama-cli)    (mlx_lm.generate)  (provider client)
//! ```
//!
//! The dispatcher never retries: a failed call comes back as a completion
//! whose termination is [`Termination::Error`]. Callers own retry policy.

mod client;
mod completion;
mod config;
mod dispatcher;
mod prepare;

pub use client::{ClientError, ProviderClient, ProviderReply};
pub use completion::{Completion, DispatchRequest, Termination};
pub use config::{DispatchConfig, DispatchConfigBuilder};
pub use dispatcher::{Dispatch, Dispatcher};
pub use prepare::{prepare, PreparedCall, FALLBACK_TEMPERATURE};

// Re-export local backend types
pub use switchyard_local::{HostPlatform, LocalRuntime, ShellWrapper};
