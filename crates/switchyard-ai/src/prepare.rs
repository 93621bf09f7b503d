//! Prompt and parameter preparation ahead of a backend call.

use switchyard_catalog::{ModelDescriptor, SamplingParams};
use tracing::warn;

use crate::DispatchRequest;

/// Temperature used when a model refuses T=0 and its catalog default is also
/// zero or unset.
pub const FALLBACK_TEMPERATURE: f32 = 0.6;

/// Prompt and sampling parameters exactly as the backend will see them.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedCall {
    /// System prompt to pass as a separate role, if the model supports one.
    pub system_prompt: Option<String>,
    /// User prompt, with the system prompt folded in when unsupported.
    pub user_prompt: String,
    pub params: SamplingParams,
}

/// Merge sampling parameters and place the system prompt.
///
/// - Parameters are the catalog defaults overlaid by the request overrides.
/// - Models flagged `requires_non_zero_temperature` never receive T=0; the
///   catalog default (or [`FALLBACK_TEMPERATURE`]) is substituted.
/// - Models without system-prompt support get the system prompt prepended to
///   the user prompt, separated by a blank line.
pub fn prepare(model: &ModelDescriptor, request: &DispatchRequest) -> PreparedCall {
    let mut params = model.defaults.overlay(&request.overrides);

    if model.capabilities.requires_non_zero_temperature && params.temperature == Some(0.0) {
        let substitute = model
            .defaults
            .temperature
            .filter(|t| *t > 0.0)
            .unwrap_or(FALLBACK_TEMPERATURE);
        warn!(
            model = %model.id,
            "temperature 0 is not allowed for this model, using {}",
            substitute
        );
        params.temperature = Some(substitute);
    }

    let system = request
        .system_prompt
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let (system_prompt, user_prompt) = match system {
        Some(system) if model.capabilities.supports_system_prompt => {
            (Some(system.to_string()), request.user_prompt.clone())
        }
        Some(system) => (None, format!("{}\n\n{}", system, request.user_prompt)),
        None => (None, request.user_prompt.clone()),
    };

    PreparedCall {
        system_prompt,
        user_prompt,
        params,
    }
}
