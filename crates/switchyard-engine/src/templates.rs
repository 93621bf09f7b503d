//! Prompt templates used by workflow `template` steps.
//!
//! A template is a JSON file named `<id>.json` in the templates directory:
//!
//! ```json
//! {
//!   "id": "code-review",
//!   "description": "Review a snippet",
//!   "system_prompt": "You are a careful reviewer.",
//!   "variables": [
//!     { "name": "language", "default": "rust" },
//!     { "name": "code", "required": true }
//!   ],
//!   "body": "Review this {{language}} code:\n{{code}}"
//! }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use switchyard_catalog::ErrorKind;
use thiserror::Error;

use crate::workflow::substitute_with;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template '{0}' not found")]
    NotFound(String),

    #[error("template '{template}' needs a value for '{variable}'")]
    MissingVariable { template: String, variable: String },

    #[error("cannot read template {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("template {path} is malformed: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl TemplateError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TemplateError::NotFound(_) => ErrorKind::NotFound,
            TemplateError::MissingVariable { .. } | TemplateError::Json { .. } => {
                ErrorKind::Validation
            }
            TemplateError::Io { .. } => ErrorKind::Io,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateVariable {
    pub name: String,
    #[serde(default)]
    pub default: Option<String>,
    #[serde(default)]
    pub required: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptTemplate {
    pub id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub variables: Vec<TemplateVariable>,
    pub body: String,
}

impl PromptTemplate {
    /// Render the body. Each declared variable takes its binding, else its
    /// default; a required variable with neither is an error. Placeholders
    /// the template does not declare are looked up in `bindings` too.
    pub fn render(&self, bindings: &IndexMap<String, String>) -> Result<String, TemplateError> {
        let mut values: BTreeMap<&str, &str> = BTreeMap::new();
        for var in &self.variables {
            match (bindings.get(&var.name), &var.default) {
                (Some(bound), _) => {
                    values.insert(&var.name, bound);
                }
                (None, Some(default)) => {
                    values.insert(&var.name, default);
                }
                (None, None) if var.required => {
                    return Err(TemplateError::MissingVariable {
                        template: self.id.clone(),
                        variable: var.name.clone(),
                    })
                }
                (None, None) => {}
            }
        }

        Ok(substitute_with(&self.body, |name| {
            values
                .get(name)
                .map(|v| v.to_string())
                .or_else(|| bindings.get(name).cloned())
        }))
    }
}

/// Source of prompt templates.
pub trait TemplateLibrary: Send + Sync {
    fn get(&self, id: &str) -> Result<PromptTemplate, TemplateError>;

    fn list(&self) -> Result<Vec<PromptTemplate>, TemplateError>;
}

/// Templates stored as `<dir>/<id>.json`.
#[derive(Debug, Clone)]
pub struct DirectoryTemplates {
    dir: PathBuf,
}

impl DirectoryTemplates {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn read(path: &Path) -> Result<PromptTemplate, TemplateError> {
        let text = std::fs::read_to_string(path).map_err(|source| TemplateError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| TemplateError::Json {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl TemplateLibrary for DirectoryTemplates {
    fn get(&self, id: &str) -> Result<PromptTemplate, TemplateError> {
        let safe = !id.is_empty() && !id.contains(['/', '\\']) && id != "." && id != "..";
        let path = self.dir.join(format!("{id}.json"));
        if !safe || !path.is_file() {
            return Err(TemplateError::NotFound(id.to_string()));
        }
        Self::read(&path)
    }

    fn list(&self) -> Result<Vec<PromptTemplate>, TemplateError> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(TemplateError::Io {
                    path: self.dir.clone(),
                    source,
                })
            }
        };

        let mut templates = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                templates.push(Self::read(&path)?);
            }
        }
        templates.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(templates)
    }
}

/// Fixed in-memory set of templates.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTemplates {
    templates: BTreeMap<String, PromptTemplate>,
}

impl InMemoryTemplates {
    pub fn new(templates: impl IntoIterator<Item = PromptTemplate>) -> Self {
        Self {
            templates: templates.into_iter().map(|t| (t.id.clone(), t)).collect(),
        }
    }
}

impl TemplateLibrary for InMemoryTemplates {
    fn get(&self, id: &str) -> Result<PromptTemplate, TemplateError> {
        self.templates
            .get(id)
            .cloned()
            .ok_or_else(|| TemplateError::NotFound(id.to_string()))
    }

    fn list(&self) -> Result<Vec<PromptTemplate>, TemplateError> {
        Ok(self.templates.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn review() -> PromptTemplate {
        serde_json::from_str(
            r#"{
                "id": "code-review",
                "variables": [
                    {"name": "language", "default": "rust"},
                    {"name": "code", "required": true}
                ],
                "body": "Review this {{language}} code:\n{{code}}"
            }"#,
        )
        .unwrap()
    }

    fn bind(pairs: &[(&str, &str)]) -> IndexMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_render_with_defaults() {
        let text = review().render(&bind(&[("code", "fn main() {}")])).unwrap();
        assert_eq!(text, "Review this rust code:\nfn main() {}");

        let text = review()
            .render(&bind(&[("code", "x = 1"), ("language", "python")]))
            .unwrap();
        assert!(text.starts_with("Review this python code"));
    }

    #[test]
    fn test_missing_required_variable() {
        let err = review().render(&IndexMap::new()).unwrap_err();
        assert!(matches!(err, TemplateError::MissingVariable { ref variable, .. } if variable == "code"));
    }

    #[test]
    fn test_directory_library() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("code-review.json"),
            serde_json::to_string(&review()).unwrap(),
        )
        .unwrap();
        let lib = DirectoryTemplates::new(dir.path());

        assert_eq!(lib.get("code-review").unwrap(), review());
        assert!(matches!(lib.get("nope"), Err(TemplateError::NotFound(_))));
        assert!(matches!(lib.get("../x"), Err(TemplateError::NotFound(_))));
        assert_eq!(lib.list().unwrap().len(), 1);
    }

    #[test]
    fn test_in_memory_library() {
        let lib = InMemoryTemplates::new([review()]);
        assert_eq!(lib.get("code-review").unwrap().id, "code-review");
        assert_eq!(lib.list().unwrap().len(), 1);
    }
}
