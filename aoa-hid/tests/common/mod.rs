//! Shared test fixtures: a recording USB peer and hub constructors

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use aoa_hid::{AccessoryHub, EncoderTiming, HubConfig};
use aoa_transport::protocol::request;
use aoa_transport::{
    PeerId, PeerInfo, SharedPeer, TransportError, UsbPeer, VendorRequest, ACCESSORY_VENDOR_ID,
};
use parking_lot::Mutex;

/// Vendor/product of the phone the test predicate recognizes
pub const PHONE: (u16, u16) = (0x04E8, 0x6860);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    pub request: VendorRequest,
    pub data: Vec<u8>,
}

/// USB peer that records transfers and injects faults on request
pub struct RecordingPeer {
    info: PeerInfo,
    protocol: u16,
    transfers: Mutex<Vec<Transfer>>,
    fail_request: Mutex<Option<u8>>,
    short_request: Mutex<Option<u8>>,
    /// Fail the HID event with this zero-based index
    fail_event_at: Mutex<Option<usize>>,
    events_seen: AtomicUsize,
    latency: Duration,
}

impl RecordingPeer {
    pub fn new(id: u64, vid: u16, pid: u16) -> Self {
        Self {
            info: PeerInfo::new(PeerId::new(id), vid, pid),
            protocol: 2,
            transfers: Mutex::new(Vec::new()),
            fail_request: Mutex::new(None),
            short_request: Mutex::new(None),
            fail_event_at: Mutex::new(None),
            events_seen: AtomicUsize::new(0),
            latency: Duration::ZERO,
        }
    }

    pub fn phone(id: u64) -> Self {
        Self::new(id, PHONE.0, PHONE.1)
    }

    pub fn accessory(id: u64) -> Self {
        Self::new(id, ACCESSORY_VENDOR_ID, 0x2D00)
    }

    pub fn with_protocol(mut self, protocol: u16) -> Self {
        self.protocol = protocol;
        self
    }

    /// Simulated time per transfer
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_interfaces(mut self, interfaces: &[u8]) -> Self {
        self.info.interfaces = interfaces.to_vec();
        self
    }

    pub fn fail_on(&self, code: u8) {
        *self.fail_request.lock() = Some(code);
    }

    pub fn short_on(&self, code: u8) {
        *self.short_request.lock() = Some(code);
    }

    pub fn fail_event_at(&self, index: usize) {
        *self.fail_event_at.lock() = Some(index);
    }

    pub fn transfers(&self) -> Vec<Transfer> {
        self.transfers.lock().clone()
    }

    pub fn request_codes(&self) -> Vec<u8> {
        self.transfers.lock().iter().map(|t| t.request.request).collect()
    }

    pub fn hid_events(&self) -> Vec<Vec<u8>> {
        self.transfers
            .lock()
            .iter()
            .filter(|t| t.request.request == request::SEND_HID_EVENT)
            .map(|t| t.data.clone())
            .collect()
    }

    pub fn clear(&self) {
        self.transfers.lock().clear();
    }

    fn record(&self, request: VendorRequest, data: &[u8]) -> Result<(), TransportError> {
        if !self.latency.is_zero() {
            std::thread::sleep(self.latency);
        }
        self.transfers.lock().push(Transfer {
            request,
            data: data.to_vec(),
        });
        if *self.fail_request.lock() == Some(request.request) {
            return Err(TransportError::Timeout);
        }
        if request.request == request::SEND_HID_EVENT {
            let index = self.events_seen.fetch_add(1, Ordering::SeqCst);
            if *self.fail_event_at.lock() == Some(index) {
                return Err(TransportError::Usb("pipe error".into()));
            }
        }
        Ok(())
    }

    fn count(&self, request: VendorRequest, len: usize) -> usize {
        if *self.short_request.lock() == Some(request.request) {
            len.checked_sub(1).unwrap_or(1)
        } else {
            len
        }
    }
}

impl UsbPeer for RecordingPeer {
    fn info(&self) -> &PeerInfo {
        &self.info
    }

    fn control_in(
        &self,
        request: VendorRequest,
        buf: &mut [u8],
        _timeout: Duration,
    ) -> Result<usize, TransportError> {
        self.record(request, &[])?;
        let version = self.protocol.to_le_bytes();
        let n = buf.len().min(version.len());
        buf[..n].copy_from_slice(&version[..n]);
        Ok(self.count(request, n))
    }

    fn control_out(
        &self,
        request: VendorRequest,
        data: &[u8],
        _timeout: Duration,
    ) -> Result<usize, TransportError> {
        self.record(request, data)?;
        Ok(self.count(request, data.len()))
    }
}

/// Keep a typed handle for assertions and a shared one for the hub
pub fn shared(peer: RecordingPeer) -> (Arc<RecordingPeer>, SharedPeer) {
    let typed = Arc::new(peer);
    let shared: SharedPeer = typed.clone();
    (typed, shared)
}

/// Hub with the given capacity, no dwell, recognizing [`PHONE`]
pub fn hub(capacity: usize) -> Arc<AccessoryHub> {
    let config = HubConfig {
        capacity,
        timing: EncoderTiming::without_dwell(),
        ..HubConfig::default()
    };
    let predicate = Arc::new(|vid: u16, pid: u16| (vid, pid) == PHONE);
    Arc::new(AccessoryHub::new(config, predicate).expect("hub"))
}
