//! Configuration loading utilities.

use super::types::GatewayConfig;
use anyhow::{Context, Result};
use std::path::Path;
use tracing::{info, warn};

/// Load configuration from layered sources: embedded defaults, an optional
/// file, then environment variables.
pub struct ConfigLoader {
    config_path: Option<String>,
    env_prefix: String,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            config_path: None,
            env_prefix: "TURNSTILE".to_string(),
        }
    }

    /// Set config file path.
    pub fn with_config_path(mut self, path: impl Into<String>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    /// Set environment variable prefix.
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Load configuration.
    pub fn load(&self) -> Result<GatewayConfig> {
        let mut builder = ::config::Config::builder().add_source(::config::File::from_str(
            include_str!("defaults.toml"),
            ::config::FileFormat::Toml,
        ));

        if let Some(path) = &self.config_path {
            if Path::new(path).exists() {
                info!(path = %path, "Loading config file");
                builder = builder.add_source(::config::File::with_name(path));
            } else {
                warn!(path = %path, "Config file not found, using defaults and environment");
            }
        }

        builder = builder.add_source(
            ::config::Environment::with_prefix(&self.env_prefix)
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Load configuration, taking the file path from `TURNSTILE_CONFIG` or
/// `CONFIG_PATH` when `path` is not given.
pub fn load_config(path: Option<String>) -> Result<GatewayConfig> {
    let config_path = path
        .or_else(|| std::env::var("TURNSTILE_CONFIG").ok())
        .or_else(|| std::env::var("CONFIG_PATH").ok());

    let mut loader = ConfigLoader::new();
    if let Some(path) = config_path {
        loader = loader.with_config_path(path);
    }

    loader.load()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::VerifierMode;
    use std::io::Write;

    #[test]
    fn test_defaults_load() {
        let config = ConfigLoader::new()
            .with_env_prefix("TURNSTILE_TEST_DEFAULTS")
            .load()
            .unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.verifier.mode, VerifierMode::Http);
        assert_eq!(config.identity.correlation_header, "x-request-id");
        let names: Vec<_> = config.rate_limit.tiers.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["auth", "refresh", "protected"]);
        assert!(config.routes.is_empty());
    }

    #[test]
    fn test_file_overrides_defaults() {
        let dir = std::env::temp_dir().join(format!("turnstile-config-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("gateway.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
[server]
port = 9090

[[backends]]
name = "user-service"
url = "http://user-service:8000"

[[routes]]
pattern = "/api/auth/login"
methods = ["POST"]
class = "public"
backend = "user-service"
tiers = ["auth"]
"#
        )
        .unwrap();

        let config = ConfigLoader::new()
            .with_env_prefix("TURNSTILE_TEST_FILE")
            .with_config_path(path.to_string_lossy().to_string())
            .load()
            .unwrap();

        assert_eq!(config.server.port, 9090);
        assert_eq!(config.backends.len(), 1);
        assert_eq!(config.routes[0].tiers, vec!["auth".to_string()]);

        std::fs::remove_dir_all(dir).ok();
    }
}
