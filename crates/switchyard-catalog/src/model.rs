//! Model descriptors - how to invoke one model.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::IntentCategory;

/// Which inference backend serves a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Backend {
    /// llama.cpp CLI over a GGUF file.
    LocalGguf,
    /// `mlx_lm` on Apple-silicon macOS.
    LocalMlx,
    /// Remote provider over HTTPS.
    HttpApi,
}

impl Backend {
    pub fn is_local(self) -> bool {
        matches!(self, Backend::LocalGguf | Backend::LocalMlx)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Backend::LocalGguf => "local-gguf",
            Backend::LocalMlx => "local-mlx",
            Backend::HttpApi => "http-api",
        }
    }
}

/// Where the backend finds the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Location {
    /// Remote endpoint.
    Http(HttpLocation),
    /// Opaque path handed to a local backend.
    Local { path: String },
}

/// Remote endpoint description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpLocation {
    /// Full URL the request is POSTed to.
    pub endpoint: String,
    /// Provider wire shape (`openrouter`, `openai`, `anthropic`, ...).
    pub provider: String,
    /// Environment variable holding the API key.
    pub key_env_var: String,
    /// Provider-side model name sent in the request body.
    pub model: String,
}

/// Sampling parameters. Every field is optional; `None` means "not set".
///
/// The same shape serves as catalog defaults and as per-call overrides.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SamplingParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repetition_penalty: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_p: Option<f32>,
}

impl SamplingParams {
    /// Lay `overrides` on top of `self`; unset override fields keep the base value.
    pub fn overlay(&self, overrides: &SamplingParams) -> SamplingParams {
        SamplingParams {
            temperature: overrides.temperature.or(self.temperature),
            top_p: overrides.top_p.or(self.top_p),
            top_k: overrides.top_k.or(self.top_k),
            max_tokens: overrides.max_tokens.or(self.max_tokens),
            repetition_penalty: overrides.repetition_penalty.or(self.repetition_penalty),
            min_p: overrides.min_p.or(self.min_p),
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Static capabilities of a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capabilities {
    pub context_window_tokens: u32,
    #[serde(default = "default_true")]
    pub supports_system_prompt: bool,
    /// Models that loop deterministically at T=0 set this.
    #[serde(default)]
    pub requires_non_zero_temperature: bool,
    /// Extra backend flags appended verbatim to the command line.
    #[serde(default)]
    pub special_flags: Vec<String>,
}

fn default_true() -> bool {
    true
}

/// A catalog entry describing how to invoke a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub id: String,
    pub display_name: String,
    pub backend: Backend,
    pub location: Location,
    #[serde(default)]
    pub defaults: SamplingParams,
    pub capabilities: Capabilities,
    #[serde(default)]
    pub use_case_tags: Vec<IntentCategory>,
}

impl ModelDescriptor {
    /// Local path, if this is a local model.
    pub fn local_path(&self) -> Option<&str> {
        match &self.location {
            Location::Local { path } => Some(path),
            Location::Http(_) => None,
        }
    }

    /// HTTP endpoint, if this is a remote model.
    pub fn http_location(&self) -> Option<&HttpLocation> {
        match &self.location {
            Location::Http(http) => Some(http),
            Location::Local { .. } => None,
        }
    }

    /// Primary category: the first use-case tag, or `General`.
    pub fn primary_category(&self) -> IntentCategory {
        self.use_case_tags
            .first()
            .copied()
            .unwrap_or(IntentCategory::General)
    }

    /// Whether the model can be invoked right now: the weights file exists for
    /// local models, the key variable is set for remote ones.
    pub fn is_available(&self) -> bool {
        match &self.location {
            Location::Local { path } => Path::new(path).exists(),
            Location::Http(http) => std::env::var(&http.key_env_var)
                .map(|key| !key.trim().is_empty())
                .unwrap_or(false),
        }
    }

    /// Check that backend and location agree.
    pub fn check_consistency(&self) -> Result<(), String> {
        match (&self.backend, &self.location) {
            (Backend::HttpApi, Location::Http(_)) => Ok(()),
            (Backend::LocalGguf | Backend::LocalMlx, Location::Local { path }) => {
                if path.trim().is_empty() {
                    Err(format!("model '{}' has an empty path", self.id))
                } else {
                    Ok(())
                }
            }
            (backend, _) => Err(format!(
                "model '{}' uses backend {} with a mismatched location",
                self.id,
                backend.as_str()
            )),
        }
    }
}
