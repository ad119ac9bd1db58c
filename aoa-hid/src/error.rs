//! Accessory driver error types

use aoa_transport::TransportError;
use thiserror::Error;

use crate::encoder::DeviceKind;

/// Errors from negotiation, registry and encoder operations
#[derive(Error, Debug)]
pub enum HidError {
    /// Transport layer error (failed, timed out or short control transfer)
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Peer speaks an AOA version without HID support
    #[error("Unsupported AOA protocol version {actual} (need {expected})")]
    ProtocolMismatch { expected: u16, actual: u16 },

    /// Every registry slot is occupied
    #[error("All {capacity} accessory slots are in use")]
    CapacityExceeded { capacity: usize },

    /// Malformed write payload or out-of-range index
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Channel already has a writer
    #[error("{kind} channel for slot {slot} is already open")]
    AlreadyOpen { kind: DeviceKind, slot: usize },

    /// Channel has no writer to release
    #[error("{kind} channel for slot {slot} is already closed")]
    AlreadyClosed { kind: DeviceKind, slot: usize },

    /// Allocation failure while setting up shared buffers
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    /// Another probe of the same peer is still registering it
    #[error("Peer registration in progress on slot {slot}")]
    RegistrationInProgress { slot: usize },

    /// Slot has no bound peer, or was rebound since the caller looked it up
    #[error("Slot {slot} is not bound")]
    Unbound { slot: usize },
}

impl HidError {
    /// Shorthand for `InvalidArgument`
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        HidError::InvalidArgument(msg.into())
    }
}
