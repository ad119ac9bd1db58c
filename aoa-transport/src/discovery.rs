//! Device discovery and hot-plug monitoring for USB peers

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use nusb::{DeviceId, DeviceInfo, MaybeFuture};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::TransportError;
use crate::types::{HotplugEvent, PeerId, PeerInfo};
use crate::usb::{peer_info, NusbPeer};
use crate::SharedPeer;

/// Hot-plug channel capacity
const HOTPLUG_CHANNEL_CAPACITY: usize = 64;

/// Device discovery abstraction
#[async_trait]
pub trait DeviceDiscovery: Send + Sync {
    /// List currently attached devices
    async fn list_devices(&self) -> Result<Vec<PeerInfo>, TransportError>;

    /// Get a peer handle for a listed or hot-plugged device
    fn open_peer(&self, info: &PeerInfo) -> Result<SharedPeer, TransportError>;

    /// Subscribe to hot-plug events
    async fn watch(&self) -> Result<mpsc::Receiver<HotplugEvent>, TransportError>;
}

/// Maps backend device keys to stable `PeerId`s
///
/// A device reported twice (initial listing and hot-plug stream) keeps its
/// id. Ids are never reused after [`PeerTable::remove`].
pub struct PeerTable<K, V> {
    next_id: u64,
    by_key: HashMap<K, PeerId>,
    by_id: HashMap<PeerId, V>,
}

impl<K: Eq + Hash + Copy, V> Default for PeerTable<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash + Copy, V> PeerTable<K, V> {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            by_key: HashMap::new(),
            by_id: HashMap::new(),
        }
    }

    /// Record a device, returning its id and whether it was newly seen
    pub fn insert(&mut self, key: K, value: V) -> (PeerId, bool) {
        if let Some(&id) = self.by_key.get(&key) {
            self.by_id.insert(id, value);
            return (id, false);
        }
        let id = PeerId::new(self.next_id);
        self.next_id += 1;
        self.by_key.insert(key, id);
        self.by_id.insert(id, value);
        (id, true)
    }

    /// Forget a departed device
    pub fn remove(&mut self, key: &K) -> Option<PeerId> {
        let id = self.by_key.remove(key)?;
        self.by_id.remove(&id);
        Some(id)
    }

    pub fn get(&self, id: PeerId) -> Option<&V> {
        self.by_id.get(&id)
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}

/// USB device discovery backed by `nusb`
pub struct UsbDiscovery {
    table: Arc<Mutex<PeerTable<DeviceId, DeviceInfo>>>,
}

impl Default for UsbDiscovery {
    fn default() -> Self {
        Self::new()
    }
}

impl UsbDiscovery {
    pub fn new() -> Self {
        Self {
            table: Arc::new(Mutex::new(PeerTable::new())),
        }
    }
}

#[async_trait]
impl DeviceDiscovery for UsbDiscovery {
    async fn list_devices(&self) -> Result<Vec<PeerInfo>, TransportError> {
        let iter = nusb::list_devices().wait()?;
        let mut table = self.table.lock();
        let mut devices = Vec::new();

        for device_info in iter {
            let (id, _) = table.insert(device_info.id(), device_info.clone());
            let info = peer_info(id, &device_info);
            debug!(
                peer = %id,
                "Found device: VID={:04X} PID={:04X} bus={} addr={}",
                info.vid, info.pid, info.bus_id, info.device_address
            );
            devices.push(info);
        }

        info!("Found {} USB devices", devices.len());
        Ok(devices)
    }

    fn open_peer(&self, info: &PeerInfo) -> Result<SharedPeer, TransportError> {
        let table = self.table.lock();
        let device_info = table.get(info.id).ok_or_else(|| {
            TransportError::DeviceNotFound(format!("{} ({})", info.id, info.vid_pid()))
        })?;
        Ok(Arc::new(NusbPeer::new(info.id, device_info.clone())))
    }

    async fn watch(&self) -> Result<mpsc::Receiver<HotplugEvent>, TransportError> {
        let mut stream = nusb::watch_devices()?;
        let (tx, rx) = mpsc::channel(HOTPLUG_CHANNEL_CAPACITY);
        let table = self.table.clone();

        tokio::spawn(async move {
            while let Some(event) = stream.next().await {
                let event = match event {
                    nusb::hotplug::HotplugEvent::Connected(device_info) => {
                        let (id, _) = table.lock().insert(device_info.id(), device_info.clone());
                        HotplugEvent::Arrived(peer_info(id, &device_info))
                    }
                    nusb::hotplug::HotplugEvent::Disconnected(key) => {
                        match table.lock().remove(&key) {
                            Some(id) => HotplugEvent::Departed(id),
                            None => {
                                debug!("Departure of unknown device {:?}", key);
                                continue;
                            }
                        }
                    }
                };
                if tx.send(event).await.is_err() {
                    debug!("Hot-plug receiver dropped, stopping watch");
                    break;
                }
            }
            warn!("Hot-plug stream ended");
        });

        info!("Watching for USB hot-plug events");
        Ok(rx)
    }
}
