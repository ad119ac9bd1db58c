//! Command handlers for the CLI application.
//!
//! This module organizes command handlers by category:
//! - `utility`: Local commands that need no daemon (devices, descriptor)
//! - `known`: Control socket commands (known add/remove/list, slots)
//! - `input`: Channel socket commands (type, mouse, volume, brightness)

pub mod input;
pub mod known;
pub mod utility;

use std::path::PathBuf;

use anyhow::Context;
use aoa_driver::DriverConfig;

use crate::cli::Cli;

/// Result type for command handlers
pub type CommandResult = anyhow::Result<()>;

/// Load the config the CLI points at and apply command-line overrides
pub fn load_config(cli: &Cli) -> anyhow::Result<(DriverConfig, PathBuf)> {
    let path = cli.config.clone().unwrap_or_else(DriverConfig::default_path);
    let mut config = DriverConfig::load(&path)
        .with_context(|| format!("loading config from {}", path.display()))?;
    if let Some(dir) = &cli.runtime_dir {
        config.runtime_dir = dir.clone();
    }
    Ok((config, path))
}
