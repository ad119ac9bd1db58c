//! Keyboard channel: types ASCII letters and digits

use aoa_transport::protocol::report_id;
use aoa_transport::UsbPeer;
use tracing::{debug, trace};

use super::{press_release, DeviceKind, EncoderTiming, InputEncoder, ScratchBank};
use crate::error::HidError;
use crate::hid_codes::char_to_key;

/// Maximum characters accepted by one keyboard write
pub const MAX_KEYBOARD_WRITE: usize = 32;

/// Report: [report id, modifier, keycode]
const REPORT_LEN: usize = 3;

const RELEASE: [u8; REPORT_LEN] = [report_id::KEYBOARD, 0, 0];

pub struct KeyboardEncoder {
    scratch: ScratchBank<REPORT_LEN>,
    timing: EncoderTiming,
}

impl KeyboardEncoder {
    pub fn new(capacity: usize, timing: EncoderTiming) -> Result<Self, HidError> {
        Ok(Self {
            scratch: ScratchBank::new(capacity)?,
            timing,
        })
    }
}

impl InputEncoder for KeyboardEncoder {
    fn kind(&self) -> DeviceKind {
        DeviceKind::Keyboard
    }

    fn validate(&self, payload: &[u8]) -> Result<(), HidError> {
        if payload.is_empty() || payload.len() > MAX_KEYBOARD_WRITE {
            return Err(HidError::invalid(format!(
                "keyboard write must be 1..={} bytes, got {}",
                MAX_KEYBOARD_WRITE,
                payload.len()
            )));
        }
        Ok(())
    }

    /// One full press/release cycle per mapped character, in order
    ///
    /// Unmapped bytes are skipped. A failed transfer aborts the rest of the
    /// payload; characters already typed stay typed.
    fn write(&self, slot: usize, peer: &dyn UsbPeer, payload: &[u8]) -> Result<usize, HidError> {
        self.validate(payload)?;
        let mut report = self.scratch.lock(slot)?;

        for (i, &byte) in payload.iter().enumerate() {
            let Some(stroke) = char_to_key(byte) else {
                trace!(slot, "Skipping unmapped byte {:#04x}", byte);
                continue;
            };

            let press = [report_id::KEYBOARD, stroke.modifier, stroke.keycode];
            if let Err(e) = press_release(peer, &mut report, press, RELEASE, &self.timing) {
                debug!(slot, "Keyboard write aborted at byte {} of {}: {}", i, payload.len(), e);
                return Err(e);
            }
            self.timing.pause();
        }

        Ok(payload.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockPeer;

    fn encoder() -> KeyboardEncoder {
        KeyboardEncoder::new(4, EncoderTiming::without_dwell()).unwrap()
    }

    #[test]
    fn test_press_release_sequence() {
        let peer = MockPeer::accessory(1);
        let written = encoder().write(0, &peer, b"aA1").unwrap();
        assert_eq!(written, 3);
        assert_eq!(
            peer.hid_events(),
            vec![
                vec![1, 0x00, 0x04],
                vec![1, 0, 0],
                vec![1, 0x02, 0x04],
                vec![1, 0, 0],
                vec![1, 0x00, 0x1E],
                vec![1, 0, 0],
            ]
        );
    }

    #[test]
    fn test_unmapped_bytes_skipped_but_counted() {
        let peer = MockPeer::accessory(1);
        assert_eq!(encoder().write(0, &peer, b"a b!").unwrap(), 4);
        assert_eq!(peer.hid_events().len(), 4);
    }

    #[test]
    fn test_only_unmapped_sends_nothing() {
        let peer = MockPeer::accessory(1);
        assert_eq!(encoder().write(0, &peer, b" \n").unwrap(), 2);
        assert!(peer.hid_events().is_empty());
    }

    #[test]
    fn test_length_limits() {
        let peer = MockPeer::accessory(1);
        let enc = encoder();
        assert!(enc.write(0, &peer, &[b'a'; MAX_KEYBOARD_WRITE]).is_ok());
        peer.clear();

        let too_long = [b'a'; MAX_KEYBOARD_WRITE + 1];
        assert!(matches!(
            enc.write(0, &peer, &too_long),
            Err(HidError::InvalidArgument(_))
        ));
        assert!(matches!(enc.write(0, &peer, b""), Err(HidError::InvalidArgument(_))));
        assert!(peer.transfers().is_empty());
    }

    #[test]
    fn test_dwell_between_press_and_release() {
        let peer = MockPeer::accessory(1);
        let timing = EncoderTiming {
            dwell: std::time::Duration::from_millis(20),
            ..EncoderTiming::default()
        };
        let enc = KeyboardEncoder::new(1, timing).unwrap();
        let start = std::time::Instant::now();
        enc.write(0, &peer, b"ab").unwrap();
        // press, dwell, release, dwell per character
        assert!(start.elapsed() >= std::time::Duration::from_millis(80));
    }
}
