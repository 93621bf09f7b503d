//! Core configuration: where state lives and how models are dispatched.

use std::path::{Path, PathBuf};

use switchyard_ai::DispatchConfig;
use switchyard_local::paths;

/// Configuration for a [`crate::Core`].
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Base directory for every persisted file.
    pub home: PathBuf,
    /// Root for the builtin catalog's local model paths.
    pub models_dir: PathBuf,
    /// Dispatcher settings (binaries, wrapper, gates, deadline).
    pub dispatch: DispatchConfig,
}

impl Default for CoreConfig {
    fn default() -> Self {
        let home = paths::default_home();
        Self {
            models_dir: paths::models_dir(&home),
            home,
            dispatch: DispatchConfig::default(),
        }
    }
}

impl CoreConfig {
    /// Create config from environment variables.
    ///
    /// `SWITCHYARD_HOME` moves the base directory; `SWITCHYARD_MODELS_DIR`
    /// moves the model root. Dispatcher settings come from
    /// [`DispatchConfig::from_env`].
    pub fn from_env() -> Self {
        let home = std::env::var_os("SWITCHYARD_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(paths::default_home);

        let models_dir = std::env::var_os("SWITCHYARD_MODELS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| paths::models_dir(&home));

        Self {
            home,
            models_dir,
            dispatch: DispatchConfig::from_env(),
        }
    }

    /// Create a builder for configuration.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    pub fn database_path(&self) -> PathBuf {
        paths::database_path(&self.home)
    }

    pub fn preferences_path(&self) -> PathBuf {
        paths::preferences_path(&self.home)
    }

    pub fn catalog_path(&self) -> PathBuf {
        paths::catalog_path(&self.home)
    }

    pub fn checkpoints_dir(&self) -> PathBuf {
        paths::checkpoints_dir(&self.home)
    }

    pub fn workflows_dir(&self) -> PathBuf {
        paths::workflows_dir(&self.home)
    }

    pub fn workflow_results_dir(&self) -> PathBuf {
        paths::workflow_results_dir(&self.home)
    }

    pub fn templates_dir(&self) -> PathBuf {
        paths::templates_dir(&self.home)
    }

    pub fn exports_dir(&self) -> PathBuf {
        paths::exports_dir(&self.home)
    }

    /// Create the base directory and every state subdirectory.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        paths::ensure_dirs(&self.home)
    }
}

/// Builder for core configuration.
#[derive(Debug, Default)]
pub struct CoreConfigBuilder {
    config: CoreConfig,
    models_dir_set: bool,
}

impl CoreConfigBuilder {
    /// Set the base directory. The model root follows it unless set
    /// explicitly.
    pub fn home(mut self, home: impl AsRef<Path>) -> Self {
        self.config.home = home.as_ref().to_path_buf();
        if !self.models_dir_set {
            self.config.models_dir = paths::models_dir(&self.config.home);
        }
        self
    }

    pub fn models_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.config.models_dir = dir.as_ref().to_path_buf();
        self.models_dir_set = true;
        self
    }

    pub fn dispatch(mut self, dispatch: DispatchConfig) -> Self {
        self.config.dispatch = dispatch;
        self
    }

    pub fn build(self) -> CoreConfig {
        self.config
    }
}
