//! Command handlers for the multichat CLI

use serde::Serialize;
use tracing::{info, warn};

use multichat_core::{ClientConfig, ClientTask, PortNumber};
use multichat_socketio::SocketIoConnector;

use crate::cli::{Cli, Commands};
use crate::config::CliAppConfig;
use crate::error::Result;
use crate::terminal;

/// Command dispatcher for handling CLI commands
pub struct CommandDispatcher;

impl CommandDispatcher {
    /// Execute a CLI command
    pub async fn execute(cli: Cli, config: CliAppConfig) -> Result<()> {
        match cli.command {
            Commands::Chat { user, port } => Self::handle_chat_command(config, user, port).await,
            Commands::Ports { json } => Self::handle_ports_command(&config.client, json),
            Commands::Config => {
                println!("{}", config.to_toml()?);
                Ok(())
            }
        }
    }

    /// Handle the chat command: run a client task and the interactive loop on top of it
    async fn handle_chat_command(
        config: CliAppConfig,
        user: Option<String>,
        port: Option<PortNumber>,
    ) -> Result<()> {
        let connector = SocketIoConnector::new(&config.client, config.socketio.clone());
        let (task, handle) = ClientTask::new(config.client.clone(), connector);
        let client_task = tokio::spawn(task.run());

        if let Some(port) = port {
            handle.change_port(port).await?;
        }
        if let Some(user) = user {
            info!("Starting chat as {}", user);
            handle.change_user(user).await?;
            if let Err(e) = handle.connect().await {
                warn!("Initial connect failed: {}", e);
            }
        }

        let outcome = terminal::run_interactive(&handle, &config.cli).await;

        if let Err(e) = handle.shutdown().await {
            warn!("Client task already stopped: {}", e);
        }
        let client = client_task.await?;
        let stats = client.manager().statistics();
        info!(
            "Session ended: {} transports opened, {} messages sent, {} stale events ignored",
            stats.transports_opened, stats.messages_sent, stats.stale_events_ignored
        );
        outcome
    }

    /// Handle the ports command
    fn handle_ports_command(config: &ClientConfig, json: bool) -> Result<()> {
        let servers = server_list(config);

        if json {
            println!("{}", serde_json::to_string_pretty(&servers)?);
        } else {
            for server in &servers {
                let marker = if server.default { " (default)" } else { "" };
                println!("{:>5}  {}{}", server.port, server.url, marker);
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerEntry {
    pub port: PortNumber,
    pub url: String,
    pub default: bool,
}

/// Configured servers in port order
pub fn server_list(config: &ClientConfig) -> Vec<ServerEntry> {
    config
        .ports
        .iter()
        .map(|&port| ServerEntry {
            port,
            url: config
                .server_url(port)
                .map(|url| url.to_string())
                .unwrap_or_else(|e| format!("<{}>", e)),
            default: port == config.default_port,
        })
        .collect()
}
