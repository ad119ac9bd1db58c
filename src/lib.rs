// AOAv2 HID accessory driver - Shared Library
// Configuration, allow-list, socket endpoints and the hot-plug daemon

pub mod config;
pub mod control;
pub mod daemon;
pub mod endpoint;
pub mod known_devices;

pub use config::{AccessoryConfig, ConfigError, DriverConfig};
pub use control::{ControlCommand, ControlContext, ControlError, CONTROL_SOCKET};
pub use daemon::Supervisor;
pub use endpoint::{socket_path, EndpointClient, Reply, SlotEndpoints};
pub use known_devices::{KnownDeviceError, KnownDevices, UsbId, MAX_KNOWN_DEVICES};
