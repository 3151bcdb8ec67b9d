//! Multichat CLI entry point

use clap::Parser;
use tracing::{error, info};

use multichat_cli::{cli::Cli, commands::CommandDispatcher, config::CliAppConfig, error::Result};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    // Initialize logging
    setup_logging(cli.verbose);

    // Load configuration
    let config = load_configuration(&cli)?;

    // Execute the command
    if let Err(e) = CommandDispatcher::execute(cli, config).await {
        error!("Command execution failed: {}", e);
        std::process::exit(1);
    }

    info!("Multichat exited");
    Ok(())
}

/// Setup logging based on verbosity level. Logs go to stderr so they do not interleave
/// with the chat transcript on stdout.
fn setup_logging(verbose: bool) {
    let log_level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

/// Load layered configuration, with an optional explicit file on top of `multichat.toml`
fn load_configuration(cli: &Cli) -> Result<CliAppConfig> {
    match &cli.config {
        Some(config_path) => info!("Loading configuration from: {}", config_path),
        None => info!("Using default configuration sources"),
    }
    Ok(CliAppConfig::load(cli.config.as_deref())?)
}
