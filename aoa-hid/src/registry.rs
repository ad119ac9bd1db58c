//! Fixed-capacity table mapping accessory-mode peers to slots
//!
//! Each slot sits behind its own `RwLock`. Writers addressing a slot hold a
//! read lease for the duration of their transfers, so releasing a slot
//! waits for in-flight writes to finish. Allocation decisions (duplicate
//! scan, reservation, release) are serialized by a table lock that is
//! always taken before any slot lock.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use aoa_transport::{PeerId, PeerInfo, SharedPeer, TransportError, UsbPeer};
use parking_lot::{MappedRwLockReadGuard, Mutex, MutexGuard, RwLock, RwLockReadGuard};
use tracing::{debug, info};

use crate::error::HidError;

/// Default number of slots
pub const MAX_SLOTS: usize = 64;

/// Slot index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(usize);

impl SlotId {
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A slot plus the generation of the binding it was issued for
///
/// A token stops resolving once its binding is released, even if the slot
/// is later bound to another peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotToken {
    slot: SlotId,
    generation: u64,
}

impl SlotToken {
    pub fn slot(&self) -> SlotId {
        self.slot
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Snapshot of one bound slot
#[derive(Debug, Clone)]
pub struct BoundSlot {
    pub token: SlotToken,
    pub info: PeerInfo,
}

struct Binding {
    peer: SharedPeer,
    generation: u64,
}

enum SlotState {
    Free,
    /// Registration transfers in progress; `cancelled` is set by a
    /// disconnect that arrives before the bind
    Reserved { peer: PeerId, cancelled: bool },
    Bound(Binding),
}

impl SlotState {
    fn is_bound_to(&self, id: PeerId) -> bool {
        matches!(self, SlotState::Bound(binding) if binding.peer.id() == id)
    }

    fn holds(&self, id: PeerId) -> bool {
        match self {
            SlotState::Free => false,
            SlotState::Reserved { peer, .. } => *peer == id,
            SlotState::Bound(binding) => binding.peer.id() == id,
        }
    }
}

/// Result of a phase-2 slot scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotScan {
    /// The peer is already bound to this slot
    Duplicate(SlotId),
    /// The peer has this slot reserved and is still registering
    Registering(SlotId),
    /// Highest free slot
    Available(SlotId),
    Full,
}

pub struct DeviceRegistry {
    slots: Box<[RwLock<SlotState>]>,
    table: Mutex<()>,
    next_generation: AtomicU64,
}

impl DeviceRegistry {
    pub fn new(capacity: usize) -> Result<Self, HidError> {
        if capacity == 0 {
            return Err(HidError::invalid("registry capacity must be non-zero"));
        }
        let mut slots = Vec::new();
        slots
            .try_reserve_exact(capacity)
            .map_err(|e| HidError::ResourceExhausted(format!("slot table: {e}")))?;
        slots.extend((0..capacity).map(|_| RwLock::new(SlotState::Free)));

        Ok(Self {
            slots: slots.into_boxed_slice(),
            table: Mutex::new(()),
            next_generation: AtomicU64::new(1),
        })
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Exclusive view of the table for scan-then-reserve
    pub fn lock_table(&self) -> SlotTable<'_> {
        SlotTable {
            registry: self,
            _guard: self.table.lock(),
        }
    }

    /// Bind `peer` to the highest free slot
    ///
    /// Returns the existing token if the peer is already bound.
    pub fn bind(&self, peer: SharedPeer) -> Result<SlotToken, HidError> {
        let table = self.lock_table();
        match table.scan(peer.id()) {
            SlotScan::Duplicate(slot) => table
                .token(slot)
                .ok_or(HidError::Unbound { slot: slot.index() }),
            SlotScan::Registering(slot) => Err(HidError::RegistrationInProgress {
                slot: slot.index(),
            }),
            SlotScan::Available(slot) => table.reserve(slot, peer)?.bind(),
            SlotScan::Full => Err(HidError::CapacityExceeded {
                capacity: self.capacity(),
            }),
        }
    }

    /// Read lease on a bound slot; `None` if out of range or not bound
    pub fn lookup(&self, slot: usize) -> Option<SlotLease<'_>> {
        let lock = self.slots.get(slot)?;
        let binding = RwLockReadGuard::try_map(lock.read(), |state| match state {
            SlotState::Bound(binding) => Some(binding),
            _ => None,
        })
        .ok()?;

        Some(SlotLease {
            slot: SlotId(slot),
            binding,
        })
    }

    /// Read lease on the binding a token was issued for
    pub fn lease(&self, token: SlotToken) -> Result<SlotLease<'_>, HidError> {
        let unbound = HidError::Unbound {
            slot: token.slot.index(),
        };
        match self.lookup(token.slot.index()) {
            Some(lease) if lease.binding.generation == token.generation => Ok(lease),
            _ => Err(unbound),
        }
    }

    /// Free a slot, waiting for outstanding leases
    ///
    /// # Returns
    /// The peer that was bound there, if any
    pub fn release(&self, slot: usize) -> Option<PeerId> {
        let _table = self.table.lock();
        self.release_locked(slot)
    }

    /// Free whatever slot `peer` holds (bound or still registering)
    pub fn release_peer(&self, peer: PeerId) -> Option<SlotId> {
        let _table = self.table.lock();
        let index = (0..self.slots.len()).find(|&i| self.slots[i].read().holds(peer))?;
        self.release_locked(index).map(|_| SlotId(index))
    }

    fn release_locked(&self, index: usize) -> Option<PeerId> {
        let mut state = self.slots.get(index)?.write();
        match std::mem::replace(&mut *state, SlotState::Free) {
            SlotState::Bound(binding) => {
                let peer = binding.peer.id();
                info!(slot = index, %peer, "Slot released");
                Some(peer)
            }
            SlotState::Reserved { peer, .. } => {
                debug!(slot = index, %peer, "Cancelling in-flight registration");
                *state = SlotState::Reserved {
                    peer,
                    cancelled: true,
                };
                None
            }
            SlotState::Free => None,
        }
    }

    /// All currently bound slots, lowest index first
    pub fn bound_slots(&self) -> Vec<BoundSlot> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, lock)| match &*lock.read() {
                SlotState::Bound(binding) => Some(BoundSlot {
                    token: SlotToken {
                        slot: SlotId(index),
                        generation: binding.generation,
                    },
                    info: binding.peer.info().clone(),
                }),
                _ => None,
            })
            .collect()
    }
}

/// Table lock held across the duplicate scan and reservation
pub struct SlotTable<'a> {
    registry: &'a DeviceRegistry,
    _guard: MutexGuard<'a, ()>,
}

impl<'a> SlotTable<'a> {
    /// Scan from the highest index down
    ///
    /// The first free slot seen is the candidate, but the scan always runs
    /// to the end: a slot already holding `peer` anywhere takes precedence.
    /// Only a bound slot is a duplicate; a reservation still in flight is
    /// reported as `Registering`.
    pub fn scan(&self, peer: PeerId) -> SlotScan {
        let mut candidate = None;
        for index in (0..self.registry.slots.len()).rev() {
            let state = self.registry.slots[index].read();
            if state.is_bound_to(peer) {
                return SlotScan::Duplicate(SlotId(index));
            }
            if state.holds(peer) {
                return SlotScan::Registering(SlotId(index));
            }
            if candidate.is_none() && matches!(*state, SlotState::Free) {
                candidate = Some(SlotId(index));
            }
        }
        candidate.map_or(SlotScan::Full, SlotScan::Available)
    }

    /// Token of a bound slot
    pub fn token(&self, slot: SlotId) -> Option<SlotToken> {
        match &*self.registry.slots.get(slot.index())?.read() {
            SlotState::Bound(binding) => Some(SlotToken {
                slot,
                generation: binding.generation,
            }),
            _ => None,
        }
    }

    /// Mark a free slot as reserved for `peer` and drop the table lock
    pub fn reserve(self, slot: SlotId, peer: SharedPeer) -> Result<Reservation<'a>, HidError> {
        let lock = self
            .registry
            .slots
            .get(slot.index())
            .ok_or_else(|| HidError::invalid(format!("slot {slot} out of range")))?;
        let peer_id = peer.id();
        {
            let mut state = lock.write();
            if !matches!(*state, SlotState::Free) {
                return Err(HidError::invalid(format!("slot {slot} is not free")));
            }
            *state = SlotState::Reserved {
                peer: peer_id,
                cancelled: false,
            };
        }
        debug!(%slot, peer = %peer_id, "Slot reserved");

        Ok(Reservation {
            registry: self.registry,
            slot,
            peer_id,
            peer: Some(peer),
            finished: false,
        })
    }
}

/// A reserved slot; rolls back to free on drop unless bound
pub struct Reservation<'a> {
    registry: &'a DeviceRegistry,
    slot: SlotId,
    peer_id: PeerId,
    peer: Option<SharedPeer>,
    finished: bool,
}

impl Reservation<'_> {
    pub fn slot(&self) -> SlotId {
        self.slot
    }

    /// Turn the reservation into a binding
    ///
    /// Fails with `Disconnected` if the peer went away while registering.
    pub fn bind(mut self) -> Result<SlotToken, HidError> {
        self.finished = true;
        let mut state = self.registry.slots[self.slot.index()].write();

        let cancelled = match &*state {
            SlotState::Reserved { peer, cancelled } if *peer == self.peer_id => *cancelled,
            _ => return Err(HidError::Unbound { slot: self.slot.index() }),
        };
        if cancelled {
            *state = SlotState::Free;
            debug!(slot = %self.slot, peer = %self.peer_id, "Peer left during registration");
            return Err(TransportError::Disconnected.into());
        }

        let peer = self
            .peer
            .take()
            .ok_or_else(|| HidError::invalid("reservation already consumed"))?;
        let generation = self.registry.next_generation.fetch_add(1, Ordering::Relaxed);
        *state = SlotState::Bound(Binding { peer, generation });
        info!(slot = %self.slot, peer = %self.peer_id, generation, "Slot bound");

        Ok(SlotToken {
            slot: self.slot,
            generation,
        })
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let mut state = self.registry.slots[self.slot.index()].write();
        if state.holds(self.peer_id) {
            *state = SlotState::Free;
            debug!(slot = %self.slot, peer = %self.peer_id, "Reservation rolled back");
        }
    }
}

/// Read access to a bound slot; the slot cannot be released while held
pub struct SlotLease<'a> {
    slot: SlotId,
    binding: MappedRwLockReadGuard<'a, Binding>,
}

impl SlotLease<'_> {
    pub fn slot(&self) -> SlotId {
        self.slot
    }

    pub fn peer(&self) -> &dyn UsbPeer {
        self.binding.peer.as_ref()
    }

    pub fn token(&self) -> SlotToken {
        SlotToken {
            slot: self.slot,
            generation: self.binding.generation,
        }
    }
}
