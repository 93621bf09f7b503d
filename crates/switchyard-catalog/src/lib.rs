//! # Switchyard Model Catalog
//!
//! The catalog is the static registry of every model Switchyard can route a
//! prompt to. It is built once at startup and never mutated afterwards.
//!
//! This crate also owns the vocabulary shared by every other crate in the
//! workspace: intent categories and the error taxonomy.
//!
//! ## Example
//!
//! ```json
//! {
//!   "id": "qwen3-coder-30b",
//!   "display_name": "Qwen3 Coder 30B",
//!   "backend": "local-gguf",
//!   "location": { "path": "/models/qwen3-coder-30b-a3b-q4_k_m.gguf" },
//!   "defaults": { "temperature": 0.7, "top_p": 0.8, "top_k": 20, "max_tokens": 4096 },
//!   "capabilities": {
//!     "context_window_tokens": 32768,
//!     "supports_system_prompt": true,
//!     "requires_non_zero_temperature": false,
//!     "special_flags": ["--jinja"]
//!   },
//!   "use_case_tags": ["coding"]
//! }
//! ```

mod catalog;
mod category;
mod kind;
mod model;

pub use catalog::*;
pub use category::*;
pub use kind::*;
pub use model::*;
