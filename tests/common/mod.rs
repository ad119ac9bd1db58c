//! Shared fixtures: an in-memory USB backend for driving the supervisor

#![allow(dead_code)]

use std::collections::HashMap;
use std::future::Future;
use std::sync::mpsc as std_mpsc;
use std::sync::Arc;
use std::time::Duration;

use aoa_hid::{AccessoryHub, EncoderTiming, HubConfig};
use aoa_transport::protocol::request;
use aoa_transport::{
    DeviceDiscovery, HotplugEvent, PeerId, PeerInfo, SharedPeer, TransportError, UsbPeer,
    VendorRequest,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

/// Peer that accepts everything and records request codes and HID reports
pub struct FakePeer {
    info: PeerInfo,
    requests: Mutex<Vec<u8>>,
    reports: Mutex<Vec<Vec<u8>>>,
    /// First `info()` call blocks until the sender fires or is dropped
    gate: Mutex<Option<std_mpsc::Receiver<()>>>,
}

impl FakePeer {
    pub fn new(id: u64, vid: u16, pid: u16) -> Arc<Self> {
        Arc::new(Self {
            info: PeerInfo::new(PeerId::new(id), vid, pid),
            requests: Mutex::new(Vec::new()),
            reports: Mutex::new(Vec::new()),
            gate: Mutex::new(None),
        })
    }

    /// Peer whose probe stalls until the returned sender fires
    pub fn gated(id: u64, vid: u16, pid: u16) -> (Arc<Self>, std_mpsc::Sender<()>) {
        let (tx, rx) = std_mpsc::channel();
        let peer = Self::new(id, vid, pid);
        *peer.gate.lock() = Some(rx);
        (peer, tx)
    }

    pub fn info_clone(&self) -> PeerInfo {
        self.info.clone()
    }

    pub fn requests(&self) -> Vec<u8> {
        self.requests.lock().clone()
    }

    pub fn reports(&self) -> Vec<Vec<u8>> {
        self.reports.lock().clone()
    }
}

impl UsbPeer for FakePeer {
    fn info(&self) -> &PeerInfo {
        let gate = self.gate.lock().take();
        if let Some(gate) = gate {
            let _ = gate.recv();
        }
        &self.info
    }

    fn control_in(
        &self,
        request: VendorRequest,
        buf: &mut [u8],
        _timeout: Duration,
    ) -> Result<usize, TransportError> {
        self.requests.lock().push(request.request);
        let version = 2u16.to_le_bytes();
        let n = buf.len().min(version.len());
        buf[..n].copy_from_slice(&version[..n]);
        Ok(n)
    }

    fn control_out(
        &self,
        request: VendorRequest,
        data: &[u8],
        _timeout: Duration,
    ) -> Result<usize, TransportError> {
        self.requests.lock().push(request.request);
        if request.request == request::SEND_HID_EVENT {
            self.reports.lock().push(data.to_vec());
        }
        Ok(data.len())
    }
}

/// Discovery backend fed by the test
pub struct FakeDiscovery {
    attached: Mutex<Vec<PeerInfo>>,
    peers: Mutex<HashMap<PeerId, SharedPeer>>,
    events: Mutex<Option<mpsc::Receiver<HotplugEvent>>>,
}

impl FakeDiscovery {
    /// Backend plus the sender for hot-plug events
    pub fn new() -> (Arc<Self>, mpsc::Sender<HotplugEvent>) {
        let (tx, rx) = mpsc::channel(16);
        let discovery = Arc::new(Self {
            attached: Mutex::new(Vec::new()),
            peers: Mutex::new(HashMap::new()),
            events: Mutex::new(Some(rx)),
        });
        (discovery, tx)
    }

    /// Make a peer openable; `listed` also puts it in the startup listing
    pub fn add(&self, peer: Arc<FakePeer>, listed: bool) -> PeerInfo {
        let info = peer.info_clone();
        if listed {
            self.attached.lock().push(info.clone());
        }
        self.peers.lock().insert(info.id, peer);
        info
    }
}

#[async_trait]
impl DeviceDiscovery for FakeDiscovery {
    async fn list_devices(&self) -> Result<Vec<PeerInfo>, TransportError> {
        Ok(self.attached.lock().clone())
    }

    fn open_peer(&self, info: &PeerInfo) -> Result<SharedPeer, TransportError> {
        self.peers
            .lock()
            .get(&info.id)
            .cloned()
            .ok_or_else(|| TransportError::DeviceNotFound(info.id.to_string()))
    }

    async fn watch(&self) -> Result<mpsc::Receiver<HotplugEvent>, TransportError> {
        self.events
            .lock()
            .take()
            .ok_or_else(|| TransportError::Internal("already watching".into()))
    }
}

pub fn hub(capacity: usize, predicate: Arc<dyn aoa_hid::DevicePredicate>) -> Arc<AccessoryHub> {
    let config = HubConfig {
        capacity,
        timing: EncoderTiming::without_dwell(),
        ..HubConfig::default()
    };
    Arc::new(AccessoryHub::new(config, predicate).expect("hub"))
}

/// Poll `check` until it holds or five seconds pass
pub async fn eventually<F, Fut>(what: &str, mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..500 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {what}");
}
