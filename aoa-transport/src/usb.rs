//! `nusb`-backed peer for a USB device on the host bus

use std::time::Duration;

use nusb::transfer::{ControlIn, ControlOut, ControlType, Recipient};
use nusb::{Device, DeviceInfo, MaybeFuture};
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::error::TransportError;
use crate::protocol::request;
use crate::types::{PeerId, PeerInfo, VendorRequest};
use crate::UsbPeer;

/// Peer backed by a host USB device
///
/// The device node is opened on the first transfer, so devices that are only
/// inspected (vendor/product checks) are never opened.
pub struct NusbPeer {
    /// Enumeration data used to open the device
    device_info: DeviceInfo,
    /// Device identification
    info: PeerInfo,
    /// Open handle, populated lazily
    device: Mutex<Option<Device>>,
}

impl NusbPeer {
    /// Wrap an enumerated device
    pub fn new(id: PeerId, device_info: DeviceInfo) -> Self {
        let info = peer_info(id, &device_info);
        Self {
            device_info,
            info,
            device: Mutex::new(None),
        }
    }

    /// Get the open device handle, opening it on first use
    fn device(&self) -> Result<Device, TransportError> {
        let mut slot = self.device.lock();
        if let Some(device) = slot.as_ref() {
            return Ok(device.clone());
        }

        let device = self.device_info.open().wait().map_err(|e| {
            let err = TransportError::from(e);
            debug!(peer = %self.info.id, vid_pid = %self.info.vid_pid(), "Open failed: {}", err);
            err
        })?;
        debug!(peer = %self.info.id, vid_pid = %self.info.vid_pid(), "Opened USB device");
        *slot = Some(device.clone());
        Ok(device)
    }
}

impl UsbPeer for NusbPeer {
    fn info(&self) -> &PeerInfo {
        &self.info
    }

    fn control_in(
        &self,
        req: VendorRequest,
        buf: &mut [u8],
        timeout: Duration,
    ) -> Result<usize, TransportError> {
        let length = u16::try_from(buf.len())
            .map_err(|_| TransportError::Internal(format!("IN buffer too large: {}", buf.len())))?;
        let device = self.device()?;

        trace!(
            peer = %self.info.id,
            "IN {} value={} index={} len={}",
            request::name(req.request),
            req.value,
            req.index,
            length
        );

        let data = device
            .control_in(
                ControlIn {
                    control_type: ControlType::Vendor,
                    recipient: Recipient::Device,
                    request: req.request,
                    value: req.value,
                    index: req.index,
                    length,
                },
                timeout,
            )
            .wait()?;

        let n = data.len().min(buf.len());
        buf[..n].copy_from_slice(&data[..n]);
        Ok(n)
    }

    fn control_out(
        &self,
        req: VendorRequest,
        data: &[u8],
        timeout: Duration,
    ) -> Result<usize, TransportError> {
        let device = self.device()?;

        trace!(
            peer = %self.info.id,
            "OUT {} value={} index={} data={:02X?}",
            request::name(req.request),
            req.value,
            req.index,
            data
        );

        device
            .control_out(
                ControlOut {
                    control_type: ControlType::Vendor,
                    recipient: Recipient::Device,
                    request: req.request,
                    value: req.value,
                    index: req.index,
                    data,
                },
                timeout,
            )
            .wait()?;

        // A completed OUT transfer always moves the whole data stage
        Ok(data.len())
    }
}

/// Build a `PeerInfo` from `nusb` enumeration data
pub(crate) fn peer_info(id: PeerId, device_info: &DeviceInfo) -> PeerInfo {
    let mut interfaces: Vec<u8> = device_info
        .interfaces()
        .map(|iface| iface.interface_number())
        .collect();
    // Interface list is not reported on every platform
    if interfaces.is_empty() {
        interfaces.push(0);
    }

    PeerInfo {
        id,
        vid: device_info.vendor_id(),
        pid: device_info.product_id(),
        bus_id: device_info.bus_id().to_string(),
        device_address: device_info.device_address(),
        interfaces,
        manufacturer: device_info.manufacturer_string().map(String::from),
        product_name: device_info.product_string().map(String::from),
        serial: device_info.serial_number().map(String::from),
    }
}
