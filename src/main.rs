use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use whispr_bridge::config::BridgeConfig;
use whispr_bridge::core::bluetooth::{BluestRadio, BridgeController};
use whispr_bridge::logging;

mod cli;

/// Desktop bridge for Whispr BLE speakers.
#[derive(Debug, Parser)]
#[command(name = "whispr-bridge", version, about)]
struct Args {
    /// Path to the bridge configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v: debug, -vv: trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(args.verbose);

    let config = match &args.config {
        Some(path) => BridgeConfig::load(path)
            .await
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => BridgeConfig::default(),
    };

    let (radio, events) = BluestRadio::init()
        .await
        .context("bluetooth adapter unavailable")?;
    let handle = BridgeController::spawn(radio, events, config);

    cli::run(handle).await
}
