//! Local inference backends for Switchyard.
//!
//! Every local generation is one short-lived subprocess: the llama.cpp CLI for
//! GGUF models, or `mlx_lm.generate` on Apple-silicon macOS. Arguments are
//! always passed as an explicit list; when a shell wrapper is configured (for
//! example `wsl bash -lc` on a Windows host) the inner command is rebuilt from
//! individually quoted tokens.

mod error;
mod invocation;
mod output;
pub mod paths;
mod platform;
mod quote;
mod runner;

pub use error::LocalError;
pub use invocation::{GenerationArgs, Invocation, LocalRuntime, ShellWrapper};
pub use output::{estimate_tokens, parse_llama_output, parse_mlx_output, ParsedOutput};
pub use platform::HostPlatform;
pub use quote::{join_quoted, shell_quote};
pub use runner::{run, ProcessOutput};

/// Default llama.cpp CLI binary name, resolved through `PATH`.
pub const DEFAULT_LLAMA_CLI: &str = "llama-cli";

/// Default MLX generation entry point, resolved through `PATH`.
pub const DEFAULT_MLX_GENERATE: &str = "mlx_lm.generate";
