//! Mouse channel: one relative movement report per write

use aoa_transport::protocol::report_id;
use aoa_transport::UsbPeer;

use super::{send_report, DeviceKind, EncoderTiming, InputEncoder, ScratchBank};
use crate::error::HidError;

/// Payload: dx, dy, wheel (two's complement), buttons
pub const MOUSE_PAYLOAD_LEN: usize = 4;

/// Report: [report id, buttons, dx, dy, wheel]
const REPORT_LEN: usize = 5;

pub struct MouseEncoder {
    scratch: ScratchBank<REPORT_LEN>,
    timing: EncoderTiming,
}

impl MouseEncoder {
    pub fn new(capacity: usize, timing: EncoderTiming) -> Result<Self, HidError> {
        Ok(Self {
            scratch: ScratchBank::new(capacity)?,
            timing,
        })
    }
}

impl InputEncoder for MouseEncoder {
    fn kind(&self) -> DeviceKind {
        DeviceKind::Mouse
    }

    fn validate(&self, payload: &[u8]) -> Result<(), HidError> {
        if payload.len() != MOUSE_PAYLOAD_LEN {
            return Err(HidError::invalid(format!(
                "mouse write must be exactly {} bytes, got {}",
                MOUSE_PAYLOAD_LEN,
                payload.len()
            )));
        }
        Ok(())
    }

    fn write(&self, slot: usize, peer: &dyn UsbPeer, payload: &[u8]) -> Result<usize, HidError> {
        self.validate(payload)?;
        let mut report = self.scratch.lock(slot)?;

        let (dx, dy, wheel, buttons) = (payload[0], payload[1], payload[2], payload[3]);
        *report = [report_id::MOUSE, buttons, dx, dy, wheel];
        send_report(peer, &report[..], &self.timing)?;

        Ok(payload.len())
    }
}
