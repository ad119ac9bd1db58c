//! Hot-plug supervisor
//!
//! Feeds USB arrivals and departures into the hub, creates channel
//! endpoints for every newly bound slot and tears them down again when the
//! peer leaves. Handshakes and disconnects block on USB transfers, so they
//! run on blocking workers while the event loop keeps consuming events.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use aoa_hid::{AccessoryHub, HidError, ProbeOutcome, SlotId, SlotToken};
use aoa_transport::{DeviceDiscovery, HotplugEvent, PeerId, PeerInfo};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::control::{self, ControlContext};
use crate::endpoint::SlotEndpoints;
use crate::known_devices::KnownDevices;

/// Result of a blocking worker
enum WorkerDone {
    Probed {
        peer: PeerId,
        outcomes: Vec<Result<ProbeOutcome, HidError>>,
    },
    Disconnected {
        peer: PeerId,
        slot: Option<SlotId>,
    },
}

pub struct Supervisor {
    hub: Arc<AccessoryHub>,
    known: Arc<KnownDevices>,
    discovery: Arc<dyn DeviceDiscovery>,
    runtime_dir: PathBuf,
    /// Peers currently attached (arrival seen, no departure yet)
    attached: HashSet<PeerId>,
    endpoints: HashMap<PeerId, SlotEndpoints>,
    workers: JoinSet<WorkerDone>,
}

impl Supervisor {
    pub fn new(
        hub: Arc<AccessoryHub>,
        known: Arc<KnownDevices>,
        discovery: Arc<dyn DeviceDiscovery>,
        runtime_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            hub,
            known,
            discovery,
            runtime_dir: runtime_dir.into(),
            attached: HashSet::new(),
            endpoints: HashMap::new(),
            workers: JoinSet::new(),
        }
    }

    pub fn runtime_dir(&self) -> &Path {
        &self.runtime_dir
    }

    /// Run until `shutdown` resolves or the hot-plug stream ends
    pub async fn run(mut self, shutdown: impl Future<Output = ()>) -> Result<()> {
        std::fs::create_dir_all(&self.runtime_dir).with_context(|| {
            format!("creating runtime directory {}", self.runtime_dir.display())
        })?;

        let listener = control::bind(&self.runtime_dir).context("binding control socket")?;
        let context = ControlContext {
            known: Arc::clone(&self.known),
            hub: Arc::clone(&self.hub),
        };
        let control_task = tokio::spawn(control::serve(listener, context));

        // Subscribe before listing so nothing attached in between is missed
        let mut events = self.discovery.watch().await?;
        let devices = self.discovery.list_devices().await?;
        info!("Replaying {} attached devices", devices.len());
        for info in devices {
            self.on_arrival(info);
        }

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutting down");
                    break;
                }
                event = events.recv() => match event {
                    Some(HotplugEvent::Arrived(info)) => self.on_arrival(info),
                    Some(HotplugEvent::Departed(peer)) => self.on_departure(peer),
                    None => {
                        warn!("Hot-plug stream closed");
                        break;
                    }
                },
                Some(done) = self.workers.join_next() => match done {
                    Ok(done) => self.on_worker_done(done),
                    Err(e) => error!("Worker failed: {}", e),
                },
            }
        }

        control_task.abort();
        self.endpoints.clear();
        self.workers.shutdown().await;
        let path = control::control_path(&self.runtime_dir);
        if let Err(e) = std::fs::remove_file(&path) {
            debug!(path = %path.display(), "Control socket not removed: {}", e);
        }
        Ok(())
    }

    fn on_arrival(&mut self, info: PeerInfo) {
        if !self.attached.insert(info.id) {
            debug!(peer = %info.id, "Duplicate arrival ignored");
            return;
        }
        let peer = match self.discovery.open_peer(&info) {
            Ok(peer) => peer,
            Err(e) => {
                warn!(peer = %info.id, vid_pid = %info.vid_pid(), "Cannot open device: {}", e);
                return;
            }
        };

        let hub = Arc::clone(&self.hub);
        let id = info.id;
        self.workers.spawn_blocking(move || {
            let outcomes = info
                .interfaces
                .iter()
                .map(|&interface| hub.probe(&peer, interface))
                .collect();
            WorkerDone::Probed { peer: id, outcomes }
        });
    }

    fn on_departure(&mut self, peer: PeerId) {
        if !self.attached.remove(&peer) {
            debug!(%peer, "Departure of unknown peer");
            return;
        }
        // Endpoints go first so no new connection reaches the slot
        self.endpoints.remove(&peer);

        let hub = Arc::clone(&self.hub);
        self.workers.spawn_blocking(move || WorkerDone::Disconnected {
            peer,
            slot: hub.disconnect(peer),
        });
    }

    fn on_worker_done(&mut self, done: WorkerDone) {
        match done {
            WorkerDone::Probed { peer, outcomes } => {
                for outcome in outcomes {
                    match outcome {
                        Ok(ProbeOutcome::Bound(token)) => self.on_bound(peer, token),
                        Ok(other) => debug!(%peer, ?other, "Probe finished"),
                        Err(e) => warn!(%peer, "Probe failed: {}", e),
                    }
                }
            }
            WorkerDone::Disconnected { peer, slot } => {
                debug!(%peer, ?slot, "Disconnect finished");
            }
        }
    }

    fn on_bound(&mut self, peer: PeerId, token: SlotToken) {
        if self.hub.registry().lease(token).is_err() {
            debug!(%peer, slot = %token.slot(), "Binding went stale before endpoints were created");
            return;
        }
        // Departed before its registration reserved a slot, so the earlier
        // disconnect found nothing to free
        if !self.attached.contains(&peer) {
            debug!(%peer, slot = %token.slot(), "Bound after departure, releasing slot");
            let hub = Arc::clone(&self.hub);
            self.workers.spawn_blocking(move || WorkerDone::Disconnected {
                peer,
                slot: hub.disconnect(peer),
            });
            return;
        }
        match SlotEndpoints::spawn(Arc::clone(&self.hub), &self.runtime_dir, token) {
            Ok(endpoints) => {
                info!(%peer, slot = %token.slot(), "Accessory ready");
                self.endpoints.insert(peer, endpoints);
            }
            Err(e) => error!(%peer, slot = %token.slot(), "Failed to create endpoints: {}", e),
        }
    }
}
