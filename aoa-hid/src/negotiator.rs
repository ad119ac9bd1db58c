//! AOAv2 negotiation
//!
//! Phase 1 runs on a recognized phone in its normal USB mode: protocol
//! query, identification strings, START. The phone then drops off the bus
//! and comes back with an accessory-mode identity, where phase 2 registers
//! the HID descriptor and binds the new peer into the registry. The two
//! phases share no state; the re-enumerated device is a different peer.

use std::sync::Arc;
use std::time::Duration;

use aoa_transport::protocol::{self, string_index};
use aoa_transport::{is_accessory_mode, PeerId, SharedPeer, TransportError, UsbPeer};
use tracing::{debug, info, warn};

use crate::descriptor::HidDescriptor;
use crate::error::HidError;
use crate::registry::{DeviceRegistry, SlotId, SlotScan, SlotToken};

/// Identification strings sent during the handshake
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessoryIdentity {
    pub manufacturer: String,
    pub model: String,
    pub description: String,
    pub version: String,
}

impl Default for AccessoryIdentity {
    fn default() -> Self {
        Self {
            manufacturer: "Not a Real Manufacturer".into(),
            model: "Not a Real Model".into(),
            description: "Connection for using HID over the AOAv2 protocol".into(),
            version: "1.0".into(),
        }
    }
}

impl AccessoryIdentity {
    pub fn new(
        manufacturer: impl Into<String>,
        model: impl Into<String>,
        description: impl Into<String>,
        version: impl Into<String>,
    ) -> Result<Self, HidError> {
        let identity = Self {
            manufacturer: manufacturer.into(),
            model: model.into(),
            description: description.into(),
            version: version.into(),
        };
        identity.validate()?;
        Ok(identity)
    }

    /// Strings must be non-empty and free of NUL (they are sent NUL-terminated)
    pub fn validate(&self) -> Result<(), HidError> {
        for (name, value) in self.fields() {
            if value.is_empty() {
                return Err(HidError::invalid(format!("accessory {name} is empty")));
            }
            if value.contains('\0') {
                return Err(HidError::invalid(format!(
                    "accessory {name} contains a NUL byte"
                )));
            }
            if value.len() + 1 > u16::MAX as usize {
                return Err(HidError::invalid(format!("accessory {name} is too long")));
            }
        }
        Ok(())
    }

    fn fields(&self) -> [(&'static str, &str); 4] {
        [
            ("manufacturer", &self.manufacturer),
            ("model", &self.model),
            ("description", &self.description),
            ("version", &self.version),
        ]
    }

    /// (string index, value) in send order
    fn indexed(&self) -> [(u16, &str); 4] {
        [
            (string_index::MANUFACTURER, &self.manufacturer),
            (string_index::MODEL, &self.model),
            (string_index::DESCRIPTION, &self.description),
            (string_index::VERSION, &self.version),
        ]
    }
}

/// Decides which vendor/product ids are phones worth switching to accessory mode
pub trait DevicePredicate: Send + Sync {
    fn is_recognized(&self, vendor_id: u16, product_id: u16) -> bool;
}

impl<F> DevicePredicate for F
where
    F: Fn(u16, u16) -> bool + Send + Sync,
{
    fn is_recognized(&self, vendor_id: u16, product_id: u16) -> bool {
        self(vendor_id, product_id)
    }
}

/// Why a probe did nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Only interface 0 is handled
    NotInterfaceZero,
    /// Neither in accessory mode nor a recognized phone
    Unrecognized,
}

/// Result of a successful probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    Ignored(IgnoreReason),
    /// Phase 1 completed; the peer will re-enumerate
    AccessoryStarted,
    /// Phase 2 completed; channels for the slot are live
    Bound(SlotToken),
    /// Peer was already bound; nothing changed
    AlreadyBound(SlotId),
}

#[derive(Debug, Clone, Copy)]
enum Phase1State {
    Unconfigured,
    ProtocolQueried,
    IdentitySent,
    Started,
}

#[derive(Debug, Clone, Copy)]
enum Phase2State {
    Discovered,
    HidRegistered,
    DescriptorSet,
    Bound,
}

pub struct Negotiator {
    identity: AccessoryIdentity,
    predicate: Arc<dyn DevicePredicate>,
    timeout: Duration,
}

impl Negotiator {
    pub fn new(
        identity: AccessoryIdentity,
        predicate: Arc<dyn DevicePredicate>,
        timeout: Duration,
    ) -> Result<Self, HidError> {
        identity.validate()?;
        Ok(Self {
            identity,
            predicate,
            timeout,
        })
    }

    pub fn identity(&self) -> &AccessoryIdentity {
        &self.identity
    }

    /// Handle one enumerated interface of `peer`
    ///
    /// Accessory-mode identities go to phase 2; other recognized devices
    /// to phase 1. Failures are returned as-is and never retried here.
    pub fn probe(
        &self,
        peer: &SharedPeer,
        interface: u8,
        registry: &DeviceRegistry,
        descriptor: &HidDescriptor,
    ) -> Result<ProbeOutcome, HidError> {
        if interface != 0 {
            return Ok(ProbeOutcome::Ignored(IgnoreReason::NotInterfaceZero));
        }

        let info = peer.info();
        if is_accessory_mode(info.vid, info.pid) {
            return self.register_hid(peer, registry, descriptor);
        }
        if !self.predicate.is_recognized(info.vid, info.pid) {
            return Ok(ProbeOutcome::Ignored(IgnoreReason::Unrecognized));
        }

        info!(peer = %info.id, vid_pid = %info.vid_pid(), "Android device found, starting AOAv2 handshake");
        self.start_accessory(peer.as_ref())?;
        Ok(ProbeOutcome::AccessoryStarted)
    }

    /// Phase 1: switch a recognized phone into accessory mode
    pub fn start_accessory(&self, peer: &dyn UsbPeer) -> Result<(), HidError> {
        let id = peer.id();
        let mut state = Phase1State::Unconfigured;
        debug!(peer = %id, ?state, "Phase 1");

        let result = self.run_phase1(peer, &mut state);
        match &result {
            Ok(()) => info!(peer = %id, "Accessory mode started, waiting for re-enumeration"),
            Err(e) => warn!(peer = %id, ?state, "AOAv2 handshake failed: {}", e),
        }
        result
    }

    fn run_phase1(&self, peer: &dyn UsbPeer, state: &mut Phase1State) -> Result<(), HidError> {
        let id = peer.id();

        let mut buf = [0u8; protocol::PROTOCOL_RESPONSE_LEN];
        let n = peer.control_in(protocol::get_protocol(), &mut buf, self.timeout)?;
        TransportError::check_len(buf.len(), n)?;
        let version = protocol::decode_protocol(&buf);
        if version != protocol::SUPPORTED_PROTOCOL {
            return Err(HidError::ProtocolMismatch {
                expected: protocol::SUPPORTED_PROTOCOL,
                actual: version,
            });
        }
        *state = Phase1State::ProtocolQueried;
        debug!(peer = %id, ?state, version, "Phase 1");

        for (index, value) in self.identity.indexed() {
            let payload = protocol::encode_string(value);
            let n = peer.control_out(protocol::send_string(index), &payload, self.timeout)?;
            TransportError::check_len(payload.len(), n)?;
        }
        *state = Phase1State::IdentitySent;
        debug!(peer = %id, ?state, "Phase 1");

        let n = peer.control_out(protocol::start(), &[], self.timeout)?;
        TransportError::check_len(0, n)?;
        *state = Phase1State::Started;
        debug!(peer = %id, ?state, "Phase 1");

        Ok(())
    }

    /// Phase 2: register the HID descriptor and bind the peer to a slot
    ///
    /// A peer that is already bound is left alone; one whose registration
    /// is still running on another thread is refused. On any transfer
    /// failure the reserved slot is returned to the pool.
    pub fn register_hid(
        &self,
        peer: &SharedPeer,
        registry: &DeviceRegistry,
        descriptor: &HidDescriptor,
    ) -> Result<ProbeOutcome, HidError> {
        let id = peer.id();
        let mut state = Phase2State::Discovered;
        debug!(peer = %id, ?state, "Phase 2");

        let table = registry.lock_table();
        let slot = match table.scan(id) {
            SlotScan::Duplicate(slot) => {
                debug!(peer = %id, %slot, "Already bound, ignoring re-probe");
                return Ok(ProbeOutcome::AlreadyBound(slot));
            }
            SlotScan::Registering(slot) => {
                debug!(peer = %id, %slot, "Registration already running, rejecting re-probe");
                return Err(HidError::RegistrationInProgress { slot: slot.index() });
            }
            SlotScan::Available(slot) => slot,
            SlotScan::Full => {
                warn!(peer = %id, "No free accessory slot");
                return Err(HidError::CapacityExceeded {
                    capacity: registry.capacity(),
                });
            }
        };
        let reservation = table.reserve(slot, Arc::clone(peer))?;

        if let Err(e) = self.run_phase2(peer.as_ref(), slot, descriptor, &mut state) {
            warn!(peer = %id, %slot, ?state, "HID registration failed: {}", e);
            return Err(e);
        }

        let token = reservation.bind()?;
        state = Phase2State::Bound;
        debug!(peer = %id, %slot, ?state, "Phase 2");
        Ok(ProbeOutcome::Bound(token))
    }

    fn run_phase2(
        &self,
        peer: &dyn UsbPeer,
        slot: SlotId,
        descriptor: &HidDescriptor,
        state: &mut Phase2State,
    ) -> Result<(), HidError> {
        let id = peer.id();

        let n = peer.control_out(protocol::register_hid(descriptor.len()), &[], self.timeout)?;
        TransportError::check_len(0, n)?;
        *state = Phase2State::HidRegistered;
        debug!(peer = %id, %slot, ?state, "Phase 2");

        let n = peer.control_out(
            protocol::set_hid_report_desc(0),
            descriptor.bytes(),
            self.timeout,
        )?;
        TransportError::check_len(descriptor.bytes().len(), n)?;
        *state = Phase2State::DescriptorSet;
        debug!(peer = %id, %slot, ?state, "Phase 2");

        Ok(())
    }

    /// Forget a departed peer; returns the slot it held, if it was bound
    pub fn disconnect(&self, peer: PeerId, registry: &DeviceRegistry) -> Option<SlotId> {
        let slot = registry.release_peer(peer);
        match slot {
            Some(slot) => info!(%peer, %slot, "Accessory disconnected"),
            None => debug!(%peer, "Disconnect of unbound peer"),
        }
        slot
    }
}
