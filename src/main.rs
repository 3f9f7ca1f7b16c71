// WeFeed webhook service - Main Entry Point
//
// Subcommands:
// - serve: run the HTTP API (webhook registry, event dispatch, one-time codes)
// - check-config: load and validate a configuration file

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use wefeed_dispatch::api::ApiServer;
use wefeed_dispatch::{logging, Config};

/// WeFeed: webhook registry and event dispatcher
#[derive(Parser, Debug)]
#[command(name = "wefeed")]
#[command(author = "WeFeed Contributors")]
#[command(version)]
#[command(about = "Webhook registry and event dispatcher", long_about = None)]
struct Args {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP API server
    Serve {
        /// Address to bind, overriding the configuration (e.g. 0.0.0.0:8080)
        #[arg(long)]
        bind: Option<String>,
    },
    /// Validate the configuration and print the effective values
    CheckConfig,
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from_path(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => Config::load().context("Failed to load configuration"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = load_config(args.config.as_ref())?;
    logging::init(&config.logging, args.verbose)?;

    match args.command {
        Some(Commands::Serve { bind }) => {
            if let Some(bind) = bind {
                let (host, port) = bind
                    .rsplit_once(':')
                    .with_context(|| format!("Bind address must be HOST:PORT, got {}", bind))?;
                config.server.host = host.to_string();
                config.server.port = port
                    .parse()
                    .with_context(|| format!("Invalid port in bind address {}", bind))?;
            }

            info!("WeFeed v{} starting...", env!("CARGO_PKG_VERSION"));
            ApiServer::new(config).start().await?;
        }
        Some(Commands::CheckConfig) => {
            let rendered =
                toml::to_string_pretty(&config).context("Failed to render configuration")?;
            println!("Configuration OK\n\n{}", rendered);
        }
        None => {
            info!("No command specified. Use \"wefeed --help\" for usage.");
        }
    }

    Ok(())
}
