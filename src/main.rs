//! AOAv2 HID Accessory Driver CLI
//!
//! Runs the hot-plug daemon and talks to it over its Unix sockets.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use aoa_driver::{DriverConfig, KnownDevices, Supervisor};
use aoa_hid::{AccessoryHub, DeviceKind};
use aoa_transport::UsbDiscovery;

// CLI definitions
mod cli;
use cli::{Cli, Commands};

// Command handlers
mod commands;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match &cli.command {
        Commands::Daemon => {
            let (config, path) = commands::load_config(&cli)?;
            info!("Loaded config from {:?}", path);
            run_daemon(config).await?;
        }

        // === Utility Commands ===
        Commands::Devices { json } => {
            let (config, _) = commands::load_config(&cli)?;
            commands::utility::devices(&config, *json).await?;
        }
        Commands::Descriptor => {
            commands::utility::descriptor()?;
        }

        // === Administration ===
        Commands::Known(known) => {
            let (config, _) = commands::load_config(&cli)?;
            commands::known::known(&config.runtime_dir, known.clone()).await?;
        }
        Commands::Slots => {
            let (config, _) = commands::load_config(&cli)?;
            commands::known::slots(&config.runtime_dir).await?;
        }

        // === Input Commands ===
        Commands::Type { slot, text } => {
            let (config, _) = commands::load_config(&cli)?;
            commands::input::type_text(&config.runtime_dir, *slot, text).await?;
        }
        Commands::Mouse {
            slot,
            dx,
            dy,
            wheel,
            click,
        } => {
            let (config, _) = commands::load_config(&cli)?;
            commands::input::mouse(&config.runtime_dir, *slot, *dx, *dy, *wheel, *click).await?;
        }
        Commands::Volume { slot, step } => {
            let (config, _) = commands::load_config(&cli)?;
            commands::input::step(&config.runtime_dir, DeviceKind::Volume, *slot, *step).await?;
        }
        Commands::Brightness { slot, step } => {
            let (config, _) = commands::load_config(&cli)?;
            commands::input::step(&config.runtime_dir, DeviceKind::Brightness, *slot, *step)
                .await?;
        }
    }

    Ok(())
}

async fn run_daemon(config: DriverConfig) -> Result<()> {
    let known = Arc::new(KnownDevices::with_entries(
        config.known_devices.iter().copied(),
    )?);
    let hub = Arc::new(AccessoryHub::new(config.hub_config()?, known.clone())?);

    info!(
        "Starting AOAv2 HID driver: {} slots, {} known devices, sockets in {}",
        hub.capacity(),
        known.len(),
        config.runtime_dir.display()
    );

    let supervisor = Supervisor::new(
        hub,
        known,
        Arc::new(UsbDiscovery::new()),
        &config.runtime_dir,
    );
    supervisor
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for Ctrl-C: {}", e);
            }
        })
        .await
}
