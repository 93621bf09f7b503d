//! Path utilities for Switchyard data directories.

use std::path::{Path, PathBuf};

/// Platform-appropriate default base directory.
///
/// - Linux:   `~/.local/share/switchyard`
/// - macOS:   `~/Library/Application Support/switchyard`
/// - Windows: `{FOLDERID_RoamingAppData}\switchyard`
///
/// Falls back to `~/.switchyard`, then `./.switchyard`.
pub fn default_home() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("switchyard"))
        .or_else(|| dirs::home_dir().map(|home| home.join(".switchyard")))
        .unwrap_or_else(|| PathBuf::from(".switchyard"))
}

/// Directory holding local model weights.
pub fn models_dir(home: &Path) -> PathBuf {
    home.join("models")
}

/// The session database file.
pub fn database_path(home: &Path) -> PathBuf {
    home.join("sessions.db")
}

/// The preferences file.
pub fn preferences_path(home: &Path) -> PathBuf {
    home.join("preferences.json")
}

/// Optional catalog override.
pub fn catalog_path(home: &Path) -> PathBuf {
    home.join("models.json")
}

/// Batch checkpoint directory.
pub fn checkpoints_dir(home: &Path) -> PathBuf {
    home.join("checkpoints")
}

/// Workflow definition directory.
pub fn workflows_dir(home: &Path) -> PathBuf {
    home.join("workflows")
}

/// Workflow result directory.
pub fn workflow_results_dir(home: &Path) -> PathBuf {
    home.join("workflow_results")
}

/// Prompt template directory.
pub fn templates_dir(home: &Path) -> PathBuf {
    home.join("templates")
}

/// Saved response exports (written by post-processors, not by the core).
pub fn exports_dir(home: &Path) -> PathBuf {
    home.join("exports")
}

/// Ensure the Switchyard data directories exist under `home`.
pub fn ensure_dirs(home: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(home)?;
    std::fs::create_dir_all(models_dir(home))?;
    std::fs::create_dir_all(checkpoints_dir(home))?;
    std::fs::create_dir_all(workflows_dir(home))?;
    std::fs::create_dir_all(workflow_results_dir(home))?;
    std::fs::create_dir_all(templates_dir(home))?;
    std::fs::create_dir_all(exports_dir(home))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_under_home() {
        let home = Path::new("/data/sy");
        assert_eq!(database_path(home), PathBuf::from("/data/sy/sessions.db"));
        assert_eq!(checkpoints_dir(home), PathBuf::from("/data/sy/checkpoints"));
    }

    #[test]
    fn test_ensure_dirs_creates_tree() {
        let dir = tempfile::tempdir().unwrap();
        let home = dir.path().join("home");
        ensure_dirs(&home).unwrap();
        assert!(workflows_dir(&home).is_dir());
        assert!(templates_dir(&home).is_dir());
    }
}
