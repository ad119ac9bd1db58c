//! HID-over-AOAv2 accessory core
//!
//! This crate turns attached Android phones into HID sinks:
//!
//! - [`Negotiator`] drives the two-phase AOAv2 handshake
//! - [`DeviceRegistry`] maps accessory-mode peers to a fixed set of slots
//! - [`Encoders`] translate channel writes into HID reports
//! - [`AccessGuard`] admits one writer per (device kind, slot)
//!
//! [`AccessoryHub`] ties them together behind one API.

pub mod descriptor;
pub mod encoder;
pub mod error;
pub mod guard;
pub mod hid_codes;
pub mod negotiator;
pub mod registry;

#[cfg(test)]
mod test_support;

pub use descriptor::{HidDescriptor, REPORT_DESCRIPTOR};
pub use encoder::{
    DeviceKind, EncoderTiming, Encoders, InputEncoder, MAX_KEYBOARD_WRITE, MOUSE_PAYLOAD_LEN,
    STEP_DOWN, STEP_UP,
};
pub use error::HidError;
pub use guard::{AccessGuard, OpenGuard};
pub use negotiator::{AccessoryIdentity, DevicePredicate, IgnoreReason, Negotiator, ProbeOutcome};
pub use registry::{
    BoundSlot, DeviceRegistry, Reservation, SlotId, SlotLease, SlotScan, SlotTable, SlotToken,
    MAX_SLOTS,
};

use std::sync::Arc;

use aoa_transport::{PeerId, SharedPeer};
use tracing::debug;

/// Hub construction parameters
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Number of registry slots
    pub capacity: usize,
    /// Strings sent during the handshake
    pub identity: AccessoryIdentity,
    /// Transfer timeout and key dwell
    pub timing: EncoderTiming,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            capacity: MAX_SLOTS,
            identity: AccessoryIdentity::default(),
            timing: EncoderTiming::default(),
        }
    }
}

/// Descriptor, registry, guard, encoders and negotiator for one host
pub struct AccessoryHub {
    descriptor: HidDescriptor,
    registry: DeviceRegistry,
    guard: AccessGuard,
    encoders: Encoders,
    negotiator: Negotiator,
}

impl AccessoryHub {
    pub fn new(config: HubConfig, predicate: Arc<dyn DevicePredicate>) -> Result<Self, HidError> {
        let descriptor = HidDescriptor::initialize()?;
        let registry = DeviceRegistry::new(config.capacity)?;
        let guard = AccessGuard::new(config.capacity)?;
        let encoders = Encoders::new(config.capacity, config.timing)?;
        let negotiator = Negotiator::new(
            config.identity,
            predicate,
            config.timing.transfer_timeout,
        )?;

        Ok(Self {
            descriptor,
            registry,
            guard,
            encoders,
            negotiator,
        })
    }

    pub fn descriptor(&self) -> &HidDescriptor {
        &self.descriptor
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    pub fn capacity(&self) -> usize {
        self.registry.capacity()
    }

    /// Hot-plug arrival of one interface of `peer`
    pub fn probe(&self, peer: &SharedPeer, interface: u8) -> Result<ProbeOutcome, HidError> {
        self.negotiator
            .probe(peer, interface, &self.registry, &self.descriptor)
    }

    /// Hot-plug departure of `peer`
    pub fn disconnect(&self, peer: PeerId) -> Option<SlotId> {
        self.negotiator.disconnect(peer, &self.registry)
    }

    pub fn acquire(&self, kind: DeviceKind, slot: usize) -> Result<(), HidError> {
        self.guard.acquire(kind, slot)
    }

    pub fn release(&self, kind: DeviceKind, slot: usize) -> Result<(), HidError> {
        self.guard.release(kind, slot)
    }

    pub fn is_open(&self, kind: DeviceKind, slot: usize) -> bool {
        self.guard.is_open(kind, slot)
    }

    /// Write to whatever peer currently holds `slot`
    ///
    /// # Returns
    /// Bytes consumed (the full payload on success)
    pub fn write(&self, kind: DeviceKind, slot: usize, payload: &[u8]) -> Result<usize, HidError> {
        let encoder = self.encoders.get(kind);
        encoder.validate(payload)?;
        let lease = self
            .registry
            .lookup(slot)
            .ok_or(HidError::Unbound { slot })?;
        encoder.write(slot, lease.peer(), payload)
    }

    /// Write to the binding `token` was issued for
    pub fn write_token(
        &self,
        kind: DeviceKind,
        token: SlotToken,
        payload: &[u8],
    ) -> Result<usize, HidError> {
        let encoder = self.encoders.get(kind);
        encoder.validate(payload)?;
        let lease = self.registry.lease(token)?;
        encoder.write(token.slot().index(), lease.peer(), payload)
    }

    /// Open the `kind` channel of a bound slot for exclusive writing
    pub fn open_channel(
        self: &Arc<Self>,
        kind: DeviceKind,
        token: SlotToken,
    ) -> Result<Channel, HidError> {
        // Fail early for stale tokens
        drop(self.registry.lease(token)?);
        self.guard.acquire(kind, token.slot().index())?;
        Ok(Channel {
            hub: Arc::clone(self),
            kind,
            token,
        })
    }

    pub fn bound_slots(&self) -> Vec<BoundSlot> {
        self.registry.bound_slots()
    }
}

/// An open channel; releases its access flag when dropped
pub struct Channel {
    hub: Arc<AccessoryHub>,
    kind: DeviceKind,
    token: SlotToken,
}

impl Channel {
    pub fn kind(&self) -> DeviceKind {
        self.kind
    }

    pub fn token(&self) -> SlotToken {
        self.token
    }

    /// Fails with `Unbound` once the peer behind the slot has gone
    pub fn write(&self, payload: &[u8]) -> Result<usize, HidError> {
        self.hub.write_token(self.kind, self.token, payload)
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        if let Err(e) = self.hub.release(self.kind, self.token.slot().index()) {
            debug!("Closing channel: {}", e);
        }
    }
}
