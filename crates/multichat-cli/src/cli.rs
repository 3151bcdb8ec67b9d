//! Command-line interface definitions and parsing

use clap::{Parser, Subcommand};

use multichat_core::PortNumber;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<String>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Start interactive chat mode
    Chat {
        /// Connect immediately as this user
        #[arg(short, long)]
        user: Option<String>,
        /// Server port to use (must be one of the configured ports)
        #[arg(short, long)]
        port: Option<PortNumber>,
    },
    /// List the configured chat servers
    Ports {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the effective configuration as TOML
    Config,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chat_with_options() {
        let cli = Cli::try_parse_from(["multichat", "-v", "chat", "--user", "alice", "-p", "3002"])
            .unwrap();

        assert!(cli.verbose);
        assert_eq!(
            cli.command,
            Commands::Chat {
                user: Some("alice".to_string()),
                port: Some(3002),
            }
        );
    }

    #[test]
    fn test_parse_ports() {
        let cli = Cli::try_parse_from(["multichat", "--config", "servers.toml", "ports"]).unwrap();

        assert_eq!(cli.config.as_deref(), Some("servers.toml"));
        assert_eq!(cli.command, Commands::Ports { json: false });
    }

    #[test]
    fn test_rejects_non_numeric_port() {
        assert!(Cli::try_parse_from(["multichat", "chat", "--port", "abc"]).is_err());
    }
}
