//! Preference store: per-category model choices and user settings in one
//! small JSON file.
//!
//! ```json
//! {
//!   "coding": "qwen25-coder-14b",
//!   "bypass_confirmations": true
//! }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use switchyard_catalog::{ErrorKind, IntentCategory};
use thiserror::Error;
use tracing::{debug, warn};

use crate::fsutil::atomic_write;

/// Reserved key for the bypass-confirmations flag.
pub const BYPASS_CONFIRMATIONS_KEY: &str = "bypass_confirmations";

#[derive(Debug, Error)]
pub enum PreferenceError {
    #[error("failed to access preferences at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("preferences file {path} is corrupt: {reason}")]
    Corrupt { path: PathBuf, reason: String },
}

impl PreferenceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PreferenceError::Io { .. } => ErrorKind::Io,
            PreferenceError::Corrupt { .. } => ErrorKind::Validation,
        }
    }
}

/// In-memory view of the preference file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Preferences {
    pub models: BTreeMap<IntentCategory, String>,
    pub bypass_confirmations: bool,
    /// Keys this version does not understand, kept on rewrite.
    pub other: Map<String, Value>,
}

impl Preferences {
    pub fn preferred_model(&self, category: IntentCategory) -> Option<&str> {
        self.models.get(&category).map(String::as_str)
    }

    fn from_json(value: Value) -> Result<Self, String> {
        let Value::Object(map) = value else {
            return Err("expected a JSON object".to_string());
        };

        let mut prefs = Preferences::default();
        for (key, value) in map {
            if key == BYPASS_CONFIRMATIONS_KEY {
                prefs.bypass_confirmations = value
                    .as_bool()
                    .ok_or_else(|| format!("'{key}' must be true or false"))?;
            } else if let Ok(category) = key.parse::<IntentCategory>() {
                let model = value
                    .as_str()
                    .ok_or_else(|| format!("'{key}' must name a model id"))?;
                prefs.models.insert(category, model.to_string());
            } else {
                prefs.other.insert(key, value);
            }
        }
        Ok(prefs)
    }

    fn to_json(&self) -> Value {
        let mut map = self.other.clone();
        for (category, model) in &self.models {
            map.insert(category.as_str().to_string(), Value::String(model.clone()));
        }
        map.insert(
            BYPASS_CONFIRMATIONS_KEY.to_string(),
            Value::Bool(self.bypass_confirmations),
        );
        Value::Object(map)
    }
}

/// File-backed preference store. Last writer wins.
#[derive(Debug, Clone)]
pub struct PreferenceStore {
    path: PathBuf,
}

impl PreferenceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the file. A missing file is empty preferences; a corrupt file is
    /// an error and is left untouched.
    pub fn load(&self) -> Result<Preferences, PreferenceError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Preferences::default())
            }
            Err(source) => {
                return Err(PreferenceError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        if text.trim().is_empty() {
            return Ok(Preferences::default());
        }

        let value: Value = serde_json::from_str(&text).map_err(|e| PreferenceError::Corrupt {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;
        Preferences::from_json(value).map_err(|reason| PreferenceError::Corrupt {
            path: self.path.clone(),
            reason,
        })
    }

    /// Like [`load`](Self::load), but a corrupt or unreadable file yields
    /// empty preferences with a warning.
    pub fn load_or_default(&self) -> Preferences {
        self.load().unwrap_or_else(|e| {
            warn!("ignoring preferences: {}", e);
            Preferences::default()
        })
    }

    /// Replace the whole file atomically.
    pub fn save(&self, prefs: &Preferences) -> Result<(), PreferenceError> {
        let mut text = serde_json::to_string_pretty(&prefs.to_json()).unwrap_or_default();
        text.push('\n');
        atomic_write(&self.path, text.as_bytes()).map_err(|source| PreferenceError::Io {
            path: self.path.clone(),
            source,
        })
    }

    /// Upsert the preferred model for a category.
    pub fn record_preference(
        &self,
        category: IntentCategory,
        model_id: &str,
    ) -> Result<(), PreferenceError> {
        let mut prefs = self.load()?;
        prefs.models.insert(category, model_id.to_string());
        self.save(&prefs)?;
        debug!(%category, model = model_id, "recorded preference");
        Ok(())
    }

    /// Remove the preference for a category. Returns whether one existed.
    pub fn clear_preference(&self, category: IntentCategory) -> Result<bool, PreferenceError> {
        let mut prefs = self.load()?;
        let existed = prefs.models.remove(&category).is_some();
        if existed {
            self.save(&prefs)?;
        }
        Ok(existed)
    }

    pub fn set_bypass_confirmations(&self, enabled: bool) -> Result<(), PreferenceError> {
        let mut prefs = self.load()?;
        prefs.bypass_confirmations = enabled;
        self.save(&prefs)
    }
}
