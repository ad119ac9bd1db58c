//! Transport error types

use thiserror::Error;

/// Errors that can occur during USB control transfers
#[derive(Error, Debug)]
pub enum TransportError {
    // Common errors
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Device disconnected")]
    Disconnected,

    #[error("Communication timeout")]
    Timeout,

    /// A control transfer moved fewer (or more) bytes than requested
    #[error("Short transfer: expected {expected} bytes, transferred {actual}")]
    ShortTransfer { expected: usize, actual: usize },

    // USB-specific errors
    #[error("USB error: {0}")]
    Usb(String),

    #[error("USB permission denied: {0}")]
    PermissionDenied(String),

    // Generic
    #[error("Internal error: {0}")]
    Internal(String),
}

impl TransportError {
    /// Check the byte count reported by a transfer against the expected length
    pub fn check_len(expected: usize, actual: usize) -> Result<(), TransportError> {
        if expected == actual {
            Ok(())
        } else {
            Err(TransportError::ShortTransfer { expected, actual })
        }
    }
}

impl From<nusb::transfer::TransferError> for TransportError {
    fn from(e: nusb::transfer::TransferError) -> Self {
        use nusb::transfer::TransferError;
        match e {
            // Blocking transfers are cancelled when their timeout expires
            TransferError::Cancelled => TransportError::Timeout,
            TransferError::Disconnected => TransportError::Disconnected,
            other => TransportError::Usb(other.to_string()),
        }
    }
}

impl From<std::io::Error> for TransportError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::PermissionDenied => TransportError::PermissionDenied(e.to_string()),
            std::io::ErrorKind::NotFound => TransportError::DeviceNotFound(e.to_string()),
            _ => TransportError::Usb(e.to_string()),
        }
    }
}

impl From<nusb::Error> for TransportError {
    fn from(e: nusb::Error) -> Self {
        TransportError::from(std::io::Error::from(e))
    }
}
