//! The model registry and its routing table.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

use crate::{
    Backend, Capabilities, ErrorKind, HttpLocation, IntentCategory, Location, ModelDescriptor,
    SamplingParams,
};

/// Id of the designated general-purpose fallback in the builtin catalog.
pub const DEFAULT_GENERAL_MODEL: &str = "phi4-14b";

/// Catalog loading errors.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("duplicate model id in catalog: {0}")]
    DuplicateId(String),

    #[error("invalid model descriptor: {0}")]
    Inconsistent(String),

    #[error("routing for {category} references unknown model '{model}'")]
    UnknownRoutingModel {
        category: IntentCategory,
        model: String,
    },

    #[error("general fallback model '{0}' is not in the catalog")]
    UnknownGeneralModel(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CatalogError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CatalogError::Io(_) => ErrorKind::Io,
            _ => ErrorKind::Validation,
        }
    }
}

/// On-disk catalog shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CatalogFile {
    models: Vec<ModelDescriptor>,
    #[serde(default)]
    routing: BTreeMap<IntentCategory, Vec<String>>,
    general_model: String,
}

/// Immutable registry of model descriptors plus the per-category preferred
/// model lists used by the selector.
#[derive(Debug, Clone)]
pub struct Catalog {
    models: Vec<ModelDescriptor>,
    routing: BTreeMap<IntentCategory, Vec<String>>,
    general_model: String,
}

impl Catalog {
    /// Build a catalog, checking id uniqueness and routing references.
    pub fn new(
        models: Vec<ModelDescriptor>,
        routing: BTreeMap<IntentCategory, Vec<String>>,
        general_model: impl Into<String>,
    ) -> Result<Self, CatalogError> {
        let general_model = general_model.into();
        let mut seen = HashSet::new();

        for model in &models {
            if !seen.insert(model.id.as_str()) {
                return Err(CatalogError::DuplicateId(model.id.clone()));
            }
            model.check_consistency().map_err(CatalogError::Inconsistent)?;
        }

        for (category, ids) in &routing {
            if let Some(missing) = ids.iter().find(|id| !seen.contains(id.as_str())) {
                return Err(CatalogError::UnknownRoutingModel {
                    category: *category,
                    model: missing.clone(),
                });
            }
        }

        if !seen.contains(general_model.as_str()) {
            return Err(CatalogError::UnknownGeneralModel(general_model));
        }

        Ok(Self {
            models,
            routing,
            general_model,
        })
    }

    /// Load a catalog from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, CatalogError> {
        let content = fs::read_to_string(path)?;
        let file: CatalogFile = serde_json::from_str(&content)?;
        info!(path = %path.display(), models = file.models.len(), "loaded model catalog");
        Self::new(file.models, file.routing, file.general_model)
    }

    /// Load `path` if it exists, otherwise the builtin catalog.
    pub fn load_or_builtin(path: &Path, models_dir: &Path) -> Result<Self, CatalogError> {
        if path.exists() {
            Self::from_file(path)
        } else {
            debug!("no catalog override at {}, using builtin", path.display());
            Ok(Self::builtin(models_dir))
        }
    }

    /// Serialize the catalog in its on-disk shape.
    pub fn to_json(&self) -> Result<String, CatalogError> {
        let file = CatalogFile {
            models: self.models.clone(),
            routing: self.routing.clone(),
            general_model: self.general_model.clone(),
        };
        Ok(serde_json::to_string_pretty(&file)?)
    }

    /// Look up a descriptor by id.
    pub fn get(&self, id: &str) -> Option<&ModelDescriptor> {
        self.models.iter().find(|m| m.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// All descriptors in registration order.
    pub fn models(&self) -> &[ModelDescriptor] {
        &self.models
    }

    /// Preferred models for a category, best first.
    pub fn preferred_for(&self, category: IntentCategory) -> &[String] {
        self.routing
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// The designated general-purpose fallback model.
    pub fn general_model(&self) -> &str {
        &self.general_model
    }

    /// Ids of models that can be invoked right now.
    pub fn available_ids(&self) -> Vec<String> {
        self.models
            .iter()
            .filter(|m| m.is_available())
            .map(|m| m.id.clone())
            .collect()
    }

    /// The builtin registry. Local model paths are resolved under `models_dir`.
    pub fn builtin(models_dir: &Path) -> Self {
        let gguf = |file: &str| Location::Local {
            path: models_dir.join(file).display().to_string(),
        };
        let mlx = |dir: &str| Location::Local {
            path: models_dir.join("mlx").join(dir).display().to_string(),
        };

        let models = vec![
            ModelDescriptor {
                id: "qwen3-coder-30b".to_string(),
                display_name: "Qwen3 Coder 30B A3B".to_string(),
                backend: Backend::LocalGguf,
                location: gguf("qwen3-coder-30b-a3b-instruct-q4_k_m.gguf"),
                defaults: SamplingParams {
                    temperature: Some(0.7),
                    top_p: Some(0.8),
                    top_k: Some(20),
                    max_tokens: Some(4096),
                    repetition_penalty: Some(1.05),
                    min_p: None,
                },
                capabilities: Capabilities {
                    context_window_tokens: 32768,
                    supports_system_prompt: true,
                    requires_non_zero_temperature: false,
                    special_flags: vec!["--jinja".to_string()],
                },
                use_case_tags: vec![IntentCategory::Coding],
            },
            ModelDescriptor {
                id: "qwen3-coder-30b-mlx".to_string(),
                display_name: "Qwen3 Coder 30B A3B (MLX)".to_string(),
                backend: Backend::LocalMlx,
                location: mlx("Qwen3-Coder-30B-A3B-Instruct-4bit"),
                defaults: SamplingParams {
                    temperature: Some(0.7),
                    top_p: Some(0.8),
                    top_k: None,
                    max_tokens: Some(4096),
                    repetition_penalty: None,
                    min_p: None,
                },
                capabilities: Capabilities {
                    context_window_tokens: 32768,
                    supports_system_prompt: true,
                    requires_non_zero_temperature: false,
                    special_flags: vec![],
                },
                use_case_tags: vec![IntentCategory::Coding],
            },
            ModelDescriptor {
                id: "qwen25-coder-14b".to_string(),
                display_name: "Qwen2.5 Coder 14B".to_string(),
                backend: Backend::LocalGguf,
                location: gguf("qwen2.5-coder-14b-instruct-q4_k_m.gguf"),
                defaults: SamplingParams {
                    temperature: Some(0.7),
                    top_p: Some(0.8),
                    top_k: Some(20),
                    max_tokens: Some(4096),
                    repetition_penalty: Some(1.05),
                    min_p: None,
                },
                capabilities: Capabilities {
                    context_window_tokens: 32768,
                    supports_system_prompt: true,
                    requires_non_zero_temperature: false,
                    special_flags: vec![],
                },
                use_case_tags: vec![IntentCategory::Coding],
            },
            ModelDescriptor {
                id: "deepseek-r1-14b".to_string(),
                display_name: "DeepSeek R1 Distill Qwen 14B".to_string(),
                backend: Backend::LocalGguf,
                location: gguf("deepseek-r1-distill-qwen-14b-q4_k_m.gguf"),
                defaults: SamplingParams {
                    temperature: Some(0.6),
                    top_p: Some(0.95),
                    top_k: None,
                    max_tokens: Some(8192),
                    repetition_penalty: None,
                    min_p: None,
                },
                capabilities: Capabilities {
                    context_window_tokens: 65536,
                    supports_system_prompt: false,
                    requires_non_zero_temperature: true,
                    special_flags: vec![],
                },
                use_case_tags: vec![IntentCategory::Reasoning, IntentCategory::Math],
            },
            ModelDescriptor {
                id: "qwq-32b".to_string(),
                display_name: "QwQ 32B".to_string(),
                backend: Backend::LocalGguf,
                location: gguf("qwq-32b-q4_k_m.gguf"),
                defaults: SamplingParams {
                    temperature: Some(0.6),
                    top_p: Some(0.95),
                    top_k: Some(40),
                    max_tokens: Some(8192),
                    repetition_penalty: None,
                    min_p: Some(0.0),
                },
                capabilities: Capabilities {
                    context_window_tokens: 32768,
                    supports_system_prompt: true,
                    requires_non_zero_temperature: true,
                    special_flags: vec!["--jinja".to_string()],
                },
                use_case_tags: vec![IntentCategory::Math, IntentCategory::Reasoning],
            },
            ModelDescriptor {
                id: "phi4-14b".to_string(),
                display_name: "Phi-4 14B".to_string(),
                backend: Backend::LocalGguf,
                location: gguf("phi-4-q4_k_m.gguf"),
                defaults: SamplingParams {
                    temperature: Some(0.7),
                    top_p: Some(0.9),
                    top_k: Some(40),
                    max_tokens: Some(4096),
                    repetition_penalty: None,
                    min_p: None,
                },
                capabilities: Capabilities {
                    context_window_tokens: 16384,
                    supports_system_prompt: true,
                    requires_non_zero_temperature: false,
                    special_flags: vec![],
                },
                use_case_tags: vec![
                    IntentCategory::General,
                    IntentCategory::Reasoning,
                    IntentCategory::Math,
                ],
            },
            ModelDescriptor {
                id: "gemma3-12b".to_string(),
                display_name: "Gemma 3 12B".to_string(),
                backend: Backend::LocalGguf,
                location: gguf("gemma-3-12b-it-q4_k_m.gguf"),
                defaults: SamplingParams {
                    temperature: Some(1.0),
                    top_p: Some(0.95),
                    top_k: Some(64),
                    max_tokens: Some(4096),
                    repetition_penalty: None,
                    min_p: None,
                },
                capabilities: Capabilities {
                    context_window_tokens: 32768,
                    supports_system_prompt: false,
                    requires_non_zero_temperature: false,
                    special_flags: vec![],
                },
                use_case_tags: vec![IntentCategory::Creative, IntentCategory::General],
            },
            ModelDescriptor {
                id: "claude-sonnet".to_string(),
                display_name: "Claude 3.5 Sonnet".to_string(),
                backend: Backend::HttpApi,
                location: Location::Http(HttpLocation {
                    endpoint: "https://api.anthropic.com/v1/messages".to_string(),
                    provider: "anthropic".to_string(),
                    key_env_var: "ANTHROPIC_API_KEY".to_string(),
                    model: "claude-3-5-sonnet-20241022".to_string(),
                }),
                defaults: SamplingParams {
                    temperature: Some(0.7),
                    top_p: None,
                    top_k: None,
                    max_tokens: Some(4096),
                    repetition_penalty: None,
                    min_p: None,
                },
                capabilities: Capabilities {
                    context_window_tokens: 200_000,
                    supports_system_prompt: true,
                    requires_non_zero_temperature: false,
                    special_flags: vec![],
                },
                use_case_tags: vec![
                    IntentCategory::Research,
                    IntentCategory::Creative,
                    IntentCategory::Coding,
                ],
            },
            ModelDescriptor {
                id: "llama33-70b-openrouter".to_string(),
                display_name: "Llama 3.3 70B (OpenRouter)".to_string(),
                backend: Backend::HttpApi,
                location: Location::Http(HttpLocation {
                    endpoint: "https://openrouter.ai/api/v1/chat/completions".to_string(),
                    provider: "openrouter".to_string(),
                    key_env_var: "OPENROUTER_API_KEY".to_string(),
                    model: "meta-llama/llama-3.3-70b-instruct".to_string(),
                }),
                defaults: SamplingParams {
                    temperature: Some(0.7),
                    top_p: Some(0.9),
                    top_k: None,
                    max_tokens: Some(4096),
                    repetition_penalty: None,
                    min_p: None,
                },
                capabilities: Capabilities {
                    context_window_tokens: 131_072,
                    supports_system_prompt: true,
                    requires_non_zero_temperature: false,
                    special_flags: vec![],
                },
                use_case_tags: vec![IntentCategory::Research, IntentCategory::General],
            },
        ];

        let ids = |list: &[&str]| list.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        let routing = BTreeMap::from([
            (
                IntentCategory::Coding,
                ids(&[
                    "qwen3-coder-30b",
                    "qwen3-coder-30b-mlx",
                    "qwen25-coder-14b",
                    "claude-sonnet",
                ]),
            ),
            (
                IntentCategory::Reasoning,
                ids(&["deepseek-r1-14b", "qwq-32b", "phi4-14b"]),
            ),
            (
                IntentCategory::Creative,
                ids(&["gemma3-12b", "claude-sonnet"]),
            ),
            (
                IntentCategory::Research,
                ids(&["claude-sonnet", "llama33-70b-openrouter", "phi4-14b"]),
            ),
            (
                IntentCategory::Math,
                ids(&["qwq-32b", "deepseek-r1-14b", "phi4-14b"]),
            ),
            (IntentCategory::General, ids(&["phi4-14b", "gemma3-12b"])),
        ]);

        Self {
            models,
            routing,
            general_model: DEFAULT_GENERAL_MODEL.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_builtin_is_consistent() {
        let builtin = Catalog::builtin(Path::new("/models"));
        let rebuilt = Catalog::new(
            builtin.models().to_vec(),
            builtin.routing.clone(),
            builtin.general_model(),
        );
        assert!(rebuilt.is_ok());
        assert!(builtin.contains("qwen3-coder-30b"));
        assert_eq!(builtin.general_model(), DEFAULT_GENERAL_MODEL);
        assert_eq!(
            builtin.get("qwen3-coder-30b").and_then(|m| m.local_path()),
            Some("/models/qwen3-coder-30b-a3b-instruct-q4_k_m.gguf")
        );
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let builtin = Catalog::builtin(Path::new("/models"));
        let mut models = builtin.models().to_vec();
        models.push(models[0].clone());

        let err = Catalog::new(models, BTreeMap::new(), DEFAULT_GENERAL_MODEL).unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateId(ref id) if id == "qwen3-coder-30b"));
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_unknown_routing_model_rejected() {
        let builtin = Catalog::builtin(Path::new("/models"));
        let routing = BTreeMap::from([(IntentCategory::Math, vec!["nope".to_string()])]);

        let err = Catalog::new(builtin.models().to_vec(), routing, DEFAULT_GENERAL_MODEL)
            .unwrap_err();
        assert!(matches!(err, CatalogError::UnknownRoutingModel { .. }));
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("models.json");
        let builtin = Catalog::builtin(Path::new("/models"));
        fs::write(&path, builtin.to_json().unwrap()).unwrap();

        let loaded = Catalog::load_or_builtin(&path, Path::new("/elsewhere")).unwrap();
        assert_eq!(loaded.models(), builtin.models());
        assert_eq!(
            loaded.preferred_for(IntentCategory::Coding),
            builtin.preferred_for(IntentCategory::Coding)
        );
    }

    #[test]
    fn test_local_availability_follows_file() {
        let dir = tempdir().unwrap();
        let catalog = Catalog::builtin(dir.path());
        assert!(!catalog.available_ids().contains(&"phi4-14b".to_string()));

        fs::write(dir.path().join("phi-4-q4_k_m.gguf"), b"gguf").unwrap();
        assert!(catalog.available_ids().contains(&"phi4-14b".to_string()));
    }
}
