//! Recording USB peer for unit tests

use std::sync::Arc;
use std::time::Duration;

use aoa_transport::protocol::request;
use aoa_transport::{
    PeerId, PeerInfo, SharedPeer, TransportError, UsbPeer, VendorRequest, ACCESSORY_VENDOR_ID,
};
use parking_lot::Mutex;

/// One recorded control transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    pub request: VendorRequest,
    pub data: Vec<u8>,
}

/// Peer that records every transfer and can be told to misbehave
pub struct MockPeer {
    info: PeerInfo,
    protocol: u16,
    transfers: Mutex<Vec<Transfer>>,
    fail_request: Mutex<Option<u8>>,
    short_request: Mutex<Option<u8>>,
}

impl MockPeer {
    pub fn new(id: u64, vid: u16, pid: u16) -> Self {
        Self {
            info: PeerInfo::new(PeerId::new(id), vid, pid),
            protocol: 2,
            transfers: Mutex::new(Vec::new()),
            fail_request: Mutex::new(None),
            short_request: Mutex::new(None),
        }
    }

    /// Peer already in accessory mode
    pub fn accessory(id: u64) -> Self {
        Self::new(id, ACCESSORY_VENDOR_ID, 0x2D01)
    }

    pub fn with_protocol(mut self, protocol: u16) -> Self {
        self.protocol = protocol;
        self
    }

    pub fn shared(self) -> SharedPeer {
        Arc::new(self)
    }

    /// Make every transfer with this request code time out
    pub fn fail_on(&self, code: u8) {
        *self.fail_request.lock() = Some(code);
    }

    /// Make every transfer with this request code report a short count
    pub fn short_on(&self, code: u8) {
        *self.short_request.lock() = Some(code);
    }

    pub fn transfers(&self) -> Vec<Transfer> {
        self.transfers.lock().clone()
    }

    /// Payloads of SEND_HID_EVENT transfers, in order
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
        self.transfers.lock().push(Transfer {
            request,
            data: data.to_vec(),
        });
        if *self.fail_request.lock() == Some(request.request) {
            return Err(TransportError::Timeout);
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

impl UsbPeer for MockPeer {
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
