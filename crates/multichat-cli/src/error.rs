//! Error handling for the multichat CLI

use thiserror::Error;

use crate::config::ConfigError;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Chat error: {0}")]
    Chat(#[from] multichat_core::ChatError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Client task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
