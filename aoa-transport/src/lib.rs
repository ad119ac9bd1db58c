//! Transport layer for Android Open Accessory (AOAv2) peers
//!
//! This crate provides the USB side of the accessory driver:
//!
//! - A synchronous vendor control-transfer interface over one USB device ([`UsbPeer`])
//! - AOA wire constants and request builders ([`protocol`])
//! - The accessory-mode identity table ([`device_registry`])
//! - An `nusb`-backed peer and hot-plug discovery ([`UsbDiscovery`])

pub mod device_registry;
pub mod error;
pub mod protocol;
pub mod types;

mod discovery;
mod usb;

pub use device_registry::{
    accessory_mode_name, is_accessory_mode, is_accessory_pid, ACCESSORY_PIDS, ACCESSORY_VENDOR_ID,
};
pub use error::TransportError;
pub use types::{HotplugEvent, PeerId, PeerInfo, VendorRequest};

pub use discovery::{DeviceDiscovery, PeerTable, UsbDiscovery};
pub use usb::NusbPeer;

use std::sync::Arc;
use std::time::Duration;

/// One USB device as seen by the accessory driver
///
/// All transfers are vendor requests addressed to the device and block the
/// calling thread for at most `timeout`. Implementations report the number of
/// bytes actually moved; callers decide whether a short count is an error.
pub trait UsbPeer: Send + Sync {
    /// Device identification
    fn info(&self) -> &PeerInfo;

    /// Enumeration identity (shortcut for `info().id`)
    fn id(&self) -> PeerId {
        self.info().id
    }

    /// Vendor control read (device to host) into `buf`
    ///
    /// # Returns
    /// Number of bytes received
    fn control_in(
        &self,
        request: VendorRequest,
        buf: &mut [u8],
        timeout: Duration,
    ) -> Result<usize, TransportError>;

    /// Vendor control write (host to device) of `data`
    ///
    /// # Returns
    /// Number of bytes sent
    fn control_out(
        &self,
        request: VendorRequest,
        data: &[u8],
        timeout: Duration,
    ) -> Result<usize, TransportError>;
}

/// Type alias for a shared peer handle
pub type SharedPeer = Arc<dyn UsbPeer>;
