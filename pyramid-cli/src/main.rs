//! # pyramid
//!
//! Command-line client for the Mahjong pyramid device.
//!
//! ## Commands
//!
//! - `ports`: List serial endpoints
//! - `probe`: Open a device, deal a board and print it
//! - `play`: Interactive session with automatic reconnection
//!
//! ## Example
//!
//! ```bash
//! # Find the board
//! pyramid ports
//!
//! # Check the link end to end
//! pyramid probe --port /dev/ttyACM0
//!
//! # Play
//! pyramid play --port /dev/ttyACM0
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use pyramid_client::{GameClient, SerialLink};
use pyramid_types::Addressing;

mod commands;
mod config;
mod render;

use commands::{play, ports, probe};
use config::Config;

/// Command-line client for the Mahjong pyramid device.
#[derive(Parser, Debug)]
#[command(name = "pyramid")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Config file (default: pyramid.toml in the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// More logging (-v debug, -vv trace); overrides RUST_LOG
    #[arg(long, short, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List serial endpoints
    Ports,

    /// Open a device, deal a board and print it
    Probe {
        /// Serial endpoint (defaults to `port` in the config file)
        #[arg(long, short)]
        port: Option<String>,
    },

    /// Interactive session
    Play {
        /// Serial endpoint (defaults to `port` in the config file)
        #[arg(long, short)]
        port: Option<String>,

        /// Address tiles by packed coordinates instead of flat index
        #[arg(long)]
        coordinates: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = Config::load(cli.config.as_deref()).context("Failed to load config")?;
    let link = SerialLink::new();

    match cli.command {
        Commands::Ports => {
            ports::run(&link).await?;
        }
        Commands::Probe { port } => {
            let port = commands::resolve_port(&link, port, config.port.as_deref()).await?;
            let client = GameClient::new(config.client_config(), link);
            probe::run(&client, &port).await?;
        }
        Commands::Play { port, coordinates } => {
            let port = commands::resolve_port(&link, port, config.port.as_deref()).await?;
            let mut client_config = config.client_config();
            if coordinates {
                client_config = client_config.with_addressing(Addressing::Coordinate);
            }
            let client = GameClient::new(client_config, link);
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            play::run(&client, &port, stdin).await?;
        }
    }

    Ok(())
}

/// Log to stderr so board output on stdout stays clean.
fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
