//! Common types for transport layer

use std::fmt;

/// Identity of one enumeration of a USB device
///
/// A phone that switches into accessory mode disconnects and comes back
/// with a new `PeerId`; no attempt is made to correlate the two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId(u64);

impl PeerId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer#{}", self.0)
    }
}

/// A vendor control request addressed to the device (recipient = device)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VendorRequest {
    /// bRequest
    pub request: u8,
    /// wValue
    pub value: u16,
    /// wIndex
    pub index: u16,
}

impl VendorRequest {
    pub const fn new(request: u8, value: u16, index: u16) -> Self {
        Self {
            request,
            value,
            index,
        }
    }
}

/// Device identification information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerInfo {
    /// Enumeration identity
    pub id: PeerId,
    /// USB Vendor ID
    pub vid: u16,
    /// USB Product ID
    pub pid: u16,
    /// Bus the device is attached to
    pub bus_id: String,
    /// Address on the bus
    pub device_address: u8,
    /// Interface numbers of the active configuration
    pub interfaces: Vec<u8>,
    /// Manufacturer string if available
    pub manufacturer: Option<String>,
    /// Product name if available
    pub product_name: Option<String>,
    /// Serial number if available
    pub serial: Option<String>,
}

impl PeerInfo {
    /// Minimal info for a device with only interface 0
    pub fn new(id: PeerId, vid: u16, pid: u16) -> Self {
        Self {
            id,
            vid,
            pid,
            bus_id: String::new(),
            device_address: 0,
            interfaces: vec![0],
            manufacturer: None,
            product_name: None,
            serial: None,
        }
    }

    /// Human readable `vvvv:pppp` identity
    pub fn vid_pid(&self) -> String {
        format!("{:04x}:{:04x}", self.vid, self.pid)
    }
}

/// Hot-plug events delivered by discovery
#[derive(Debug, Clone)]
pub enum HotplugEvent {
    /// A device was enumerated
    Arrived(PeerInfo),
    /// A device went away
    Departed(PeerId),
}
