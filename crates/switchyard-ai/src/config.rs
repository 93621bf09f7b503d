//! Dispatcher configuration.

use std::time::Duration;

use switchyard_local::{HostPlatform, LocalRuntime, ShellWrapper};

/// Configuration for the dispatcher.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Binaries and optional shell wrapper for local models.
    pub runtime: LocalRuntime,
    /// Host the dispatcher runs on (decides MLX reachability).
    pub platform: HostPlatform,
    /// Maximum concurrent local subprocesses (local models saturate the GPU).
    pub max_local: usize,
    /// Maximum concurrent HTTP calls.
    pub max_http: usize,
    /// Deadline applied when a request carries none.
    pub default_deadline: Option<Duration>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            runtime: LocalRuntime::default(),
            platform: HostPlatform::detect(),
            max_local: 1,
            max_http: 4,
            default_deadline: None,
        }
    }
}

impl DispatchConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("SWITCHYARD_LLAMA_CLI") {
            config.runtime.llama_cli = path;
        }
        if let Ok(path) = std::env::var("SWITCHYARD_MLX_GENERATE") {
            config.runtime.mlx_generate = path;
        }
        config.runtime.wrapper = std::env::var("SWITCHYARD_LOCAL_WRAPPER")
            .ok()
            .and_then(|spec| ShellWrapper::parse(&spec));

        config.max_local = std::env::var("SWITCHYARD_MAX_LOCAL")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|n: &usize| *n > 0)
            .unwrap_or(1);

        config.max_http = std::env::var("SWITCHYARD_MAX_HTTP")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|n: &usize| *n > 0)
            .unwrap_or(4);

        config.default_deadline = std::env::var("SWITCHYARD_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs);

        config
    }

    /// Create a builder for configuration.
    pub fn builder() -> DispatchConfigBuilder {
        DispatchConfigBuilder::default()
    }
}

/// Builder for dispatcher configuration.
#[derive(Debug, Default)]
pub struct DispatchConfigBuilder {
    config: DispatchConfig,
}

impl DispatchConfigBuilder {
    pub fn llama_cli(mut self, path: impl Into<String>) -> Self {
        self.config.runtime.llama_cli = path.into();
        self
    }

    pub fn mlx_generate(mut self, path: impl Into<String>) -> Self {
        self.config.runtime.mlx_generate = path.into();
        self
    }

    pub fn wrapper(mut self, wrapper: ShellWrapper) -> Self {
        self.config.runtime.wrapper = Some(wrapper);
        self
    }

    pub fn platform(mut self, platform: HostPlatform) -> Self {
        self.config.platform = platform;
        self
    }

    pub fn max_local(mut self, n: usize) -> Self {
        self.config.max_local = n.max(1);
        self
    }

    pub fn max_http(mut self, n: usize) -> Self {
        self.config.max_http = n.max(1);
        self
    }

    pub fn default_deadline(mut self, deadline: Duration) -> Self {
        self.config.default_deadline = Some(deadline);
        self
    }

    pub fn build(self) -> DispatchConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DispatchConfig::default();
        assert_eq!(config.max_local, 1);
        assert_eq!(config.max_http, 4);
        assert!(config.default_deadline.is_none());
    }

    #[test]
    fn test_builder_clamps_gates() {
        let config = DispatchConfig::builder().max_local(0).max_http(8).build();
        assert_eq!(config.max_local, 1);
        assert_eq!(config.max_http, 8);
    }
}
