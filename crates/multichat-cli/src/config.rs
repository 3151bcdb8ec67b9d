//! Multichat CLI Configuration Management
//!
//! Configuration is layered with figment, lowest priority first:
//! - Built-in defaults
//! - `multichat.toml` in the working directory
//! - An explicit `--config` file
//! - Environment variables (`MULTICHAT_*`, nested keys separated by `__`,
//!   e.g. `MULTICHAT_CLIENT__HOST=chat.example.org`)

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use multichat_core::ClientConfig;
use multichat_socketio::SocketIoConfig;

/// Configuration file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "multichat.toml";

/// Prefix for environment overrides
pub const ENV_PREFIX: &str = "MULTICHAT_";

// ----------------------------------------------------------------------------
// CLI Application Configuration
// ----------------------------------------------------------------------------

/// Complete configuration for the multichat CLI
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliAppConfig {
    /// Servers, wire event names and status texts
    pub client: ClientConfig,

    /// Socket.IO transport settings
    pub socketio: SocketIoConfig,

    /// Terminal front-end settings
    pub cli: CliConfig,
}

/// CLI-specific configuration options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Prompt shown before each input line
    pub prompt: String,

    /// Print roster changes as they arrive
    pub show_roster_updates: bool,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            prompt: "multichat> ".to_string(),
            show_roster_updates: true,
        }
    }
}

// ----------------------------------------------------------------------------
// Configuration Loading Logic
// ----------------------------------------------------------------------------

impl CliAppConfig {
    /// Load configuration from every layer, then validate it
    pub fn load(config_file: Option<&str>) -> Result<Self, ConfigError> {
        Self::from_figment(Self::figment(config_file))
    }

    /// The layered figment without extraction
    pub fn figment(config_file: Option<&str>) -> Figment {
        let mut figment = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(DEFAULT_CONFIG_FILE));

        if let Some(path) = config_file {
            figment = figment.merge(Toml::file(Path::new(path)));
        }

        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: CliAppConfig = figment
            .extract()
            .map_err(|e| ConfigError::Loading(format!("Failed to load configuration: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration for consistency and correctness
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.client
            .validate()
            .map_err(|e| ConfigError::Validation(e.to_string()))?;

        if !self.socketio.path.starts_with('/') {
            return Err(ConfigError::Validation(format!(
                "Socket.IO path must start with '/': {}",
                self.socketio.path
            )));
        }

        Ok(())
    }

    /// Effective configuration rendered as TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self)
            .map_err(|e| ConfigError::Serialization(format!("Failed to serialize config: {}", e)))
    }
}

/// Configuration-related errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration loading error: {0}")]
    Loading(String),

    #[error("Configuration validation error: {0}")]
    Validation(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn with_toml(source: &str) -> Result<CliAppConfig, ConfigError> {
        CliAppConfig::from_figment(
            Figment::new()
                .merge(Serialized::defaults(CliAppConfig::default()))
                .merge(Toml::string(source)),
        )
    }

    #[test]
    fn test_default_config_creation() {
        let config = CliAppConfig::default();
        assert_eq!(config.cli.prompt, "multichat> ");
        assert_eq!(config.client.ports, vec![3001, 3002, 3003, 3004]);
        assert_eq!(config.socketio.path, "/socket.io/");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_overrides_defaults() {
        let config = with_toml(
            r#"
            [client]
            host = "chat.example.org"
            ports = [4000, 4001]
            default_port = 4001

            [client.events]
            instant_message = "message"

            [cli]
            prompt = "> "
            "#,
        )
        .unwrap();

        assert_eq!(config.client.host, "chat.example.org");
        assert_eq!(config.client.default_port, 4001);
        assert_eq!(config.client.events.instant_message, "message");
        // Untouched nested values keep their defaults
        assert_eq!(config.client.events.identify, "identify");
        assert_eq!(config.cli.prompt, "> ");
    }

    #[test]
    fn test_invalid_default_port_is_rejected() {
        let result = with_toml(
            r#"
            [client]
            ports = [4000]
            default_port = 3001
            "#,
        );

        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_relative_socketio_path_is_rejected() {
        let result = with_toml(
            r#"
            [socketio]
            path = "socket.io"
            "#,
        );

        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_malformed_values_fail_to_load() {
        let result = with_toml(
            r#"
            [client]
            ports = "not a list"
            "#,
        );

        assert!(matches!(result, Err(ConfigError::Loading(_))));
    }

    #[test]
    fn test_toml_output_reloads() {
        let mut config = CliAppConfig::default();
        config.client.host = "10.0.0.5".to_string();

        let rendered = config.to_toml().unwrap();
        assert_eq!(with_toml(&rendered).unwrap(), config);
    }
}
