//! Workflow definitions stored as JSON files in one directory.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;

use super::definition::WorkflowDefinition;
use super::validate::ValidationError;
use crate::error::EngineError;

#[derive(Debug, Clone)]
pub struct WorkflowLibrary {
    dir: PathBuf,
}

impl WorkflowLibrary {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Parse one definition file. The id defaults to the file stem.
    pub fn load_file(path: &Path) -> Result<WorkflowDefinition, EngineError> {
        let text = fs::read_to_string(path)?;
        let mut def: WorkflowDefinition =
            serde_json::from_str(&text).map_err(|e| EngineError::InvalidWorkflow {
                name: path.display().to_string(),
                errors: vec![ValidationError::Malformed(e.to_string())],
            })?;
        if def.id.trim().is_empty() {
            def.id = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
        }
        Ok(def)
    }

    /// Every parseable definition, sorted by name. Malformed files are
    /// skipped.
    pub fn list(&self) -> Result<Vec<WorkflowDefinition>, EngineError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut defs = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match Self::load_file(&path) {
                Ok(def) => defs.push(def),
                Err(e) => warn!(path = %path.display(), "skipping workflow: {}", e),
            }
        }
        defs.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        Ok(defs)
    }

    /// Look a workflow up by id (file stem) or by name, ignoring case.
    pub fn find(&self, id_or_name: &str) -> Result<WorkflowDefinition, EngineError> {
        let direct = self.dir.join(format!("{id_or_name}.json"));
        let is_plain = !id_or_name.contains(['/', '\\']) && !id_or_name.starts_with('.');
        if is_plain && direct.is_file() {
            return Self::load_file(&direct);
        }

        self.list()?
            .into_iter()
            .find(|def| {
                def.id.eq_ignore_ascii_case(id_or_name) || def.name.eq_ignore_ascii_case(id_or_name)
            })
            .ok_or_else(|| EngineError::WorkflowNotFound(id_or_name.to_string()))
    }
}
