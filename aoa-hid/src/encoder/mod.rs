//! Input encoders: raw channel payloads to timed HID report sequences

mod consumer;
mod keyboard;
mod mouse;

pub use consumer::{ConsumerEncoder, STEP_DOWN, STEP_UP};
pub use keyboard::{KeyboardEncoder, MAX_KEYBOARD_WRITE};
pub use mouse::{MouseEncoder, MOUSE_PAYLOAD_LEN};

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use aoa_transport::protocol::{self, timing};
use aoa_transport::{TransportError, UsbPeer};
use parking_lot::{Mutex, MutexGuard};
use tracing::trace;

use crate::error::HidError;

/// The four per-slot input channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DeviceKind {
    Keyboard,
    Mouse,
    Volume,
    Brightness,
}

impl DeviceKind {
    pub const ALL: [DeviceKind; 4] = [
        DeviceKind::Keyboard,
        DeviceKind::Mouse,
        DeviceKind::Volume,
        DeviceKind::Brightness,
    ];

    pub const COUNT: usize = Self::ALL.len();

    /// Stable index into per-kind tables
    pub const fn index(self) -> usize {
        match self {
            DeviceKind::Keyboard => 0,
            DeviceKind::Mouse => 1,
            DeviceKind::Volume => 2,
            DeviceKind::Brightness => 3,
        }
    }

    /// Name of the user-facing channel node (slot number is appended)
    pub const fn node_name(self) -> &'static str {
        match self {
            DeviceKind::Keyboard => "android_keyboard",
            DeviceKind::Mouse => "android_mouse",
            DeviceKind::Volume => "android_volume",
            DeviceKind::Brightness => "android_brightness",
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            DeviceKind::Keyboard => "keyboard",
            DeviceKind::Mouse => "mouse",
            DeviceKind::Volume => "volume",
            DeviceKind::Brightness => "brightness",
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceKind {
    type Err = HidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DeviceKind::ALL
            .into_iter()
            .find(|k| s == k.as_str() || s == k.node_name())
            .ok_or_else(|| HidError::invalid(format!("unknown device kind '{s}'")))
    }
}

/// Transfer timeout and press/release dwell used by all encoders
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderTiming {
    pub transfer_timeout: Duration,
    pub dwell: Duration,
}

impl Default for EncoderTiming {
    fn default() -> Self {
        Self {
            transfer_timeout: Duration::from_millis(timing::TRANSFER_TIMEOUT_MS),
            dwell: Duration::from_millis(timing::KEY_DWELL_MS),
        }
    }
}

impl EncoderTiming {
    /// Default timeout, no dwell (for tests and simulations)
    pub fn without_dwell() -> Self {
        Self {
            dwell: Duration::ZERO,
            ..Self::default()
        }
    }

    pub(crate) fn pause(&self) {
        if !self.dwell.is_zero() {
            std::thread::sleep(self.dwell);
        }
    }
}

/// Per-slot report buffers for one encoder
///
/// Allocated once for the whole registry capacity and reused for every
/// write. Holding a buffer's lock serializes writes to that slot.
pub(crate) struct ScratchBank<const LEN: usize> {
    buffers: Box<[Mutex<[u8; LEN]>]>,
}

impl<const LEN: usize> ScratchBank<LEN> {
    pub(crate) fn new(capacity: usize) -> Result<Self, HidError> {
        let mut buffers = Vec::new();
        buffers
            .try_reserve_exact(capacity)
            .map_err(|e| HidError::ResourceExhausted(format!("scratch buffers: {e}")))?;
        buffers.extend((0..capacity).map(|_| Mutex::new([0u8; LEN])));
        Ok(Self {
            buffers: buffers.into_boxed_slice(),
        })
    }

    pub(crate) fn lock(&self, slot: usize) -> Result<MutexGuard<'_, [u8; LEN]>, HidError> {
        self.buffers
            .get(slot)
            .map(Mutex::lock)
            .ok_or_else(|| HidError::invalid(format!("slot {slot} out of range")))
    }
}

/// Transmit one report as SEND_HID_EVENT, requiring the full length to go out
pub(crate) fn send_report(
    peer: &dyn UsbPeer,
    report: &[u8],
    timing: &EncoderTiming,
) -> Result<(), HidError> {
    trace!(peer = %peer.id(), "HID report {:02X?}", report);
    let sent = peer.control_out(protocol::send_hid_event(), report, timing.transfer_timeout)?;
    TransportError::check_len(report.len(), sent)?;
    Ok(())
}

/// Send a press report, wait the dwell, then send the matching release
pub(crate) fn press_release<const LEN: usize>(
    peer: &dyn UsbPeer,
    report: &mut [u8; LEN],
    press: [u8; LEN],
    release: [u8; LEN],
    timing: &EncoderTiming,
) -> Result<(), HidError> {
    *report = press;
    send_report(peer, report, timing)?;
    timing.pause();
    *report = release;
    send_report(peer, report, timing)
}

/// Translates a payload written to one channel into HID reports
pub trait InputEncoder: Send + Sync {
    /// Which channel this encoder serves
    fn kind(&self) -> DeviceKind;

    /// Reject malformed payloads before anything is sent
    fn validate(&self, payload: &[u8]) -> Result<(), HidError>;

    /// Encode and transmit `payload` to `peer` using the scratch buffer of `slot`
    ///
    /// # Returns
    /// Number of payload bytes consumed (always the full payload on success)
    fn write(&self, slot: usize, peer: &dyn UsbPeer, payload: &[u8]) -> Result<usize, HidError>;
}

/// One encoder per device kind
pub struct Encoders {
    keyboard: KeyboardEncoder,
    mouse: MouseEncoder,
    volume: ConsumerEncoder,
    brightness: ConsumerEncoder,
}

impl Encoders {
    pub fn new(capacity: usize, timing: EncoderTiming) -> Result<Self, HidError> {
        Ok(Self {
            keyboard: KeyboardEncoder::new(capacity, timing)?,
            mouse: MouseEncoder::new(capacity, timing)?,
            volume: ConsumerEncoder::volume(capacity, timing)?,
            brightness: ConsumerEncoder::brightness(capacity, timing)?,
        })
    }

    pub fn get(&self, kind: DeviceKind) -> &dyn InputEncoder {
        match kind {
            DeviceKind::Keyboard => &self.keyboard,
            DeviceKind::Mouse => &self.mouse,
            DeviceKind::Volume => &self.volume,
            DeviceKind::Brightness => &self.brightness,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_names() {
        let names: Vec<_> = DeviceKind::ALL.iter().map(|k| k.node_name()).collect();
        assert_eq!(
            names,
            ["android_keyboard", "android_mouse", "android_volume", "android_brightness"]
        );
    }

    #[test]
    fn test_kind_indices_are_dense() {
        for (i, kind) in DeviceKind::ALL.into_iter().enumerate() {
            assert_eq!(kind.index(), i);
        }
        assert_eq!(DeviceKind::COUNT, 4);
    }

    #[test]
    fn test_kind_from_str() {
        assert_eq!("mouse".parse::<DeviceKind>().unwrap(), DeviceKind::Mouse);
        assert_eq!(
            "android_brightness".parse::<DeviceKind>().unwrap(),
            DeviceKind::Brightness
        );
        assert!("trackpad".parse::<DeviceKind>().is_err());
    }

    #[test]
    fn test_default_timing() {
        let timing = EncoderTiming::default();
        assert_eq!(timing.transfer_timeout, Duration::from_millis(1000));
        assert_eq!(timing.dwell, Duration::from_millis(100));
        assert_eq!(EncoderTiming::without_dwell().dwell, Duration::ZERO);
    }

    #[test]
    fn test_scratch_bank_bounds() {
        let bank: ScratchBank<3> = ScratchBank::new(2).unwrap();
        assert!(bank.lock(1).is_ok());
        assert!(matches!(bank.lock(2), Err(HidError::InvalidArgument(_))));
    }
}
