//! Consumer-control channels (volume and brightness)
//!
//! Both send report ID 3 with a single consumer code, which the phone's
//! HID stack accepts even though the registered descriptor only declares
//! the keyboard and mouse collections.

use aoa_transport::protocol::report_id;
use aoa_transport::UsbPeer;

use super::{press_release, DeviceKind, EncoderTiming, InputEncoder, ScratchBank};
use crate::error::HidError;
use crate::hid_codes::consumer;

/// Payload byte requesting "up"
pub const STEP_UP: u8 = 0x01;
/// Payload byte requesting "down"
pub const STEP_DOWN: u8 = 0xFF;

/// Report: [report id, consumer code]
const REPORT_LEN: usize = 2;

const RELEASE: [u8; REPORT_LEN] = [report_id::CONSUMER, 0];

pub struct ConsumerEncoder {
    kind: DeviceKind,
    up_code: u8,
    down_code: u8,
    scratch: ScratchBank<REPORT_LEN>,
    timing: EncoderTiming,
}

impl ConsumerEncoder {
    pub fn volume(capacity: usize, timing: EncoderTiming) -> Result<Self, HidError> {
        Self::new(
            DeviceKind::Volume,
            consumer::VOLUME_UP,
            consumer::VOLUME_DOWN,
            capacity,
            timing,
        )
    }

    pub fn brightness(capacity: usize, timing: EncoderTiming) -> Result<Self, HidError> {
        Self::new(
            DeviceKind::Brightness,
            consumer::BRIGHTNESS_UP,
            consumer::BRIGHTNESS_DOWN,
            capacity,
            timing,
        )
    }

    fn new(
        kind: DeviceKind,
        up_code: u8,
        down_code: u8,
        capacity: usize,
        timing: EncoderTiming,
    ) -> Result<Self, HidError> {
        Ok(Self {
            kind,
            up_code,
            down_code,
            scratch: ScratchBank::new(capacity)?,
            timing,
        })
    }

    /// Map a one-byte payload to its consumer code
    fn parse(&self, payload: &[u8]) -> Result<u8, HidError> {
        match payload {
            [STEP_UP] => Ok(self.up_code),
            [STEP_DOWN] => Ok(self.down_code),
            [step] => Err(HidError::invalid(format!(
                "{} write must be 0x01 (up) or 0xFF (down), got {:#04x}",
                self.kind, step
            ))),
            _ => Err(HidError::invalid(format!(
                "{} write must be exactly 1 byte, got {}",
                self.kind,
                payload.len()
            ))),
        }
    }
}

impl InputEncoder for ConsumerEncoder {
    fn kind(&self) -> DeviceKind {
        self.kind
    }

    fn validate(&self, payload: &[u8]) -> Result<(), HidError> {
        self.parse(payload).map(|_| ())
    }

    fn write(&self, slot: usize, peer: &dyn UsbPeer, payload: &[u8]) -> Result<usize, HidError> {
        let code = self.parse(payload)?;

        let mut report = self.scratch.lock(slot)?;
        press_release(
            peer,
            &mut report,
            [report_id::CONSUMER, code],
            RELEASE,
            &self.timing,
        )?;

        Ok(payload.len())
    }
}
