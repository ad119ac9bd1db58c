//! Driver configuration
//!
//! Loaded from TOML. Every field is optional; a missing file gives the
//! defaults. Example:
//!
//! ```toml
//! runtime_dir = "/run/aoa-hid"
//! transfer_timeout_ms = 1000
//! known_devices = ["04e8:6860", "18d1:4ee7"]
//!
//! [accessory]
//! manufacturer = "Not a Real Manufacturer"
//! model = "Not a Real Model"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use aoa_hid::{AccessoryIdentity, EncoderTiming, HubConfig};
use aoa_transport::protocol::timing;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::known_devices::{UsbId, MAX_KNOWN_DEVICES};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to encode config: {0}")]
    Encode(#[from] toml::ser::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Strings announced to the phone during the handshake
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessoryConfig {
    pub manufacturer: String,
    pub model: String,
    pub description: String,
    pub version: String,
}

impl Default for AccessoryConfig {
    fn default() -> Self {
        let identity = AccessoryIdentity::default();
        Self {
            manufacturer: identity.manufacturer,
            model: identity.model,
            description: identity.description,
            version: identity.version,
        }
    }
}

/// Complete driver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverConfig {
    /// Directory holding the channel sockets and the control socket
    #[serde(default = "default_runtime_dir")]
    pub runtime_dir: PathBuf,
    /// Timeout for every USB control transfer
    #[serde(default = "default_transfer_timeout_ms")]
    pub transfer_timeout_ms: u64,
    /// Initial allow-list
    #[serde(default)]
    pub known_devices: Vec<UsbId>,
    #[serde(default)]
    pub accessory: AccessoryConfig,
}

fn default_runtime_dir() -> PathBuf {
    dirs::runtime_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("aoa-hid")
}

fn default_transfer_timeout_ms() -> u64 {
    timing::TRANSFER_TIMEOUT_MS
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            runtime_dir: default_runtime_dir(),
            transfer_timeout_ms: default_transfer_timeout_ms(),
            known_devices: Vec::new(),
            accessory: AccessoryConfig::default(),
        }
    }
}

impl DriverConfig {
    /// Get the default config file path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("aoa-hid")
            .join("config.toml")
    }

    /// Load and validate config from a file, or return defaults if not found
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config = if path.exists() {
            let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            toml::from_str(&content)?
        } else {
            Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Save config to a file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(io)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.transfer_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "transfer_timeout_ms must be non-zero".into(),
            ));
        }
        if self.known_devices.len() > MAX_KNOWN_DEVICES {
            return Err(ConfigError::Invalid(format!(
                "at most {} known devices are supported, got {}",
                MAX_KNOWN_DEVICES,
                self.known_devices.len()
            )));
        }
        self.identity()?;
        Ok(())
    }

    pub fn transfer_timeout(&self) -> Duration {
        Duration::from_millis(self.transfer_timeout_ms)
    }

    pub fn identity(&self) -> Result<AccessoryIdentity, ConfigError> {
        let accessory = &self.accessory;
        AccessoryIdentity::new(
            accessory.manufacturer.as_str(),
            accessory.model.as_str(),
            accessory.description.as_str(),
            accessory.version.as_str(),
        )
        .map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Hub parameters with the production key dwell
    pub fn hub_config(&self) -> Result<HubConfig, ConfigError> {
        Ok(HubConfig {
            identity: self.identity()?,
            timing: EncoderTiming {
                transfer_timeout: self.transfer_timeout(),
                ..EncoderTiming::default()
            },
            ..HubConfig::default()
        })
    }
}
