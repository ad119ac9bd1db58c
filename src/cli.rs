// CLI definitions using clap

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "aoa_driver")]
#[command(author, version, about = "Drive Android phones as HID devices over AOAv2")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Config file path (default: ~/.config/aoa-hid/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Socket directory (overrides runtime_dir from the config file)
    #[arg(long, global = true, value_name = "DIR")]
    pub runtime_dir: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace); RUST_LOG takes precedence
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the hot-plug daemon
    #[command(visible_alias = "serve")]
    Daemon,

    // === Utility Commands ===
    /// List attached USB devices and how the driver sees them
    #[command(visible_aliases = ["list", "ls"])]
    Devices {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Hex dump of the HID report descriptor
    Descriptor,

    // === Administration (control socket) ===
    /// Manage the known-device allow-list of a running daemon
    #[command(subcommand)]
    Known(KnownCommands),

    /// List bound slots of a running daemon
    Slots,

    // === Input Commands (channel sockets) ===
    /// Type letters and digits on a slot's keyboard
    Type {
        /// Slot number
        slot: usize,
        /// Text to type (other characters are skipped)
        text: String,
    },

    /// Move the mouse of a slot
    Mouse {
        /// Slot number
        slot: usize,
        /// Horizontal movement
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        dx: i8,
        /// Vertical movement
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        dy: i8,
        /// Wheel movement
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        wheel: i8,
        /// Hold the primary button
        #[arg(long)]
        click: bool,
    },

    /// Step the volume of a slot
    #[command(visible_alias = "vol")]
    Volume {
        /// Slot number
        slot: usize,
        step: Step,
    },

    /// Step the screen brightness of a slot
    #[command(visible_alias = "bri")]
    Brightness {
        /// Slot number
        slot: usize,
        step: Step,
    },
}

/// Allow-list commands
#[derive(Clone, Subcommand)]
pub enum KnownCommands {
    /// Add a device (e.g. `04e8:6860` or `04e8 6860`)
    Add {
        /// Vendor:product in hex
        #[arg(num_args = 1..=2, required = true)]
        id: Vec<String>,
    },

    /// Remove a device
    #[command(visible_alias = "rm")]
    Remove {
        /// Vendor:product in hex
        #[arg(num_args = 1..=2, required = true)]
        id: Vec<String>,
    },

    /// Show all known devices
    #[command(visible_alias = "ls")]
    List,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum Step {
    Up,
    Down,
}
