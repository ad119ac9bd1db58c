//! Single-writer admission per (device kind, slot)

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

use crate::encoder::DeviceKind;
use crate::error::HidError;

/// One open/closed flag per channel
///
/// `acquire` and `release` are compare-and-swap; a contended acquire fails
/// immediately instead of waiting.
pub struct AccessGuard {
    flags: Box<[AtomicBool]>,
    capacity: usize,
}

impl AccessGuard {
    pub fn new(capacity: usize) -> Result<Self, HidError> {
        let len = capacity
            .checked_mul(DeviceKind::COUNT)
            .ok_or_else(|| HidError::ResourceExhausted("access flags overflow".into()))?;
        let mut flags = Vec::new();
        flags
            .try_reserve_exact(len)
            .map_err(|e| HidError::ResourceExhausted(format!("access flags: {e}")))?;
        flags.extend((0..len).map(|_| AtomicBool::new(false)));

        Ok(Self {
            flags: flags.into_boxed_slice(),
            capacity,
        })
    }

    fn flag(&self, kind: DeviceKind, slot: usize) -> Result<&AtomicBool, HidError> {
        if slot >= self.capacity {
            return Err(HidError::invalid(format!("slot {slot} out of range")));
        }
        Ok(&self.flags[kind.index() * self.capacity + slot])
    }

    /// Mark the channel open; fails with `AlreadyOpen` if it already is
    pub fn acquire(&self, kind: DeviceKind, slot: usize) -> Result<(), HidError> {
        let flag = self.flag(kind, slot)?;
        if flag
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(HidError::AlreadyOpen { kind, slot });
        }
        debug!(%kind, slot, "Channel opened");
        Ok(())
    }

    /// Mark the channel closed; fails with `AlreadyClosed` if it already is
    pub fn release(&self, kind: DeviceKind, slot: usize) -> Result<(), HidError> {
        let flag = self.flag(kind, slot)?;
        if flag
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(HidError::AlreadyClosed { kind, slot });
        }
        debug!(%kind, slot, "Channel closed");
        Ok(())
    }

    pub fn is_open(&self, kind: DeviceKind, slot: usize) -> bool {
        self.flag(kind, slot)
            .map(|flag| flag.load(Ordering::Acquire))
            .unwrap_or(false)
    }

    /// Acquire and get a guard that releases on drop
    pub fn open(&self, kind: DeviceKind, slot: usize) -> Result<OpenGuard<'_>, HidError> {
        self.acquire(kind, slot)?;
        Ok(OpenGuard {
            guard: self,
            kind,
            slot,
        })
    }
}

/// Open channel; closes it when dropped
pub struct OpenGuard<'a> {
    guard: &'a AccessGuard,
    kind: DeviceKind,
    slot: usize,
}

impl OpenGuard<'_> {
    pub fn kind(&self) -> DeviceKind {
        self.kind
    }

    pub fn slot(&self) -> usize {
        self.slot
    }
}

impl Drop for OpenGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.guard.release(self.kind, self.slot) {
            debug!("{}", e);
        }
    }
}
