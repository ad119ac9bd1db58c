//! Composite HID report descriptor registered with the phone
//!
//! Keyboard (report ID 1) followed by a three button mouse (report ID 2).

use crate::error::HidError;

/// Report descriptor bytes
#[rustfmt::skip]
pub const REPORT_DESCRIPTOR: &[u8] = &[
    0x05, 0x01,         // Usage Page (Generic Desktop)
    0x09, 0x06,         // Usage (Keyboard)
    0xA1, 0x01,         // Collection (Application)
    0x85, 0x01,         //   Report ID (1)
    0x05, 0x07,         //   Usage Page (Keyboard/Keypad)
    0x75, 0x01,         //   Report Size (1)
    0x95, 0x08,         //   Report Count (8)
    0x19, 0xE0,         //   Usage Minimum (Left Control)
    0x29, 0xE7,         //   Usage Maximum (Right GUI)
    0x15, 0x00,         //   Logical Minimum (0)
    0x25, 0x01,         //   Logical Maximum (1)
    0x81, 0x02,         //   Input (Data, Var, Abs) - modifier bits
    0x95, 0x01,         //   Report Count (1)
    0x75, 0x08,         //   Report Size (8)
    0x15, 0x00,         //   Logical Minimum (0)
    0x25, 0x64,         //   Logical Maximum (100)
    0x05, 0x07,         //   Usage Page (Keyboard/Keypad)
    0x19, 0x00,         //   Usage Minimum (0)
    0x29, 0x65,         //   Usage Maximum (0x65)
    0x81, 0x00,         //   Input (Data, Array, Abs) - keycode
    0xC0,               // End Collection

    0x05, 0x01,         // Usage Page (Generic Desktop)
    0x09, 0x02,         // Usage (Mouse)
    0xA1, 0x01,         // Collection (Application)
    0x85, 0x02,         //   Report ID (2)
    0x09, 0x01,         //   Usage (Pointer)
    0xA1, 0x00,         //   Collection (Physical)
    0x05, 0x09,         //     Usage Page (Button)
    0x19, 0x01,         //     Usage Minimum (1)
    0x29, 0x03,         //     Usage Maximum (3)
    0x15, 0x00,         //     Logical Minimum (0)
    0x25, 0x01,         //     Logical Maximum (1)
    0x95, 0x03,         //     Report Count (3)
    0x75, 0x01,         //     Report Size (1)
    0x81, 0x02,         //     Input (Data, Var, Abs) - buttons
    0x95, 0x01,         //     Report Count (1)
    0x75, 0x05,         //     Report Size (5)
    0x81, 0x03,         //     Input (Const, Var, Abs) - padding
    0x05, 0x01,         //     Usage Page (Generic Desktop)
    0x09, 0x30,         //     Usage (X)
    0x09, 0x31,         //     Usage (Y)
    0x09, 0x38,         //     Usage (Wheel)
    0x15, 0x81,         //     Logical Minimum (-127)
    0x25, 0x7F,         //     Logical Maximum (127)
    0x75, 0x08,         //     Report Size (8)
    0x95, 0x03,         //     Report Count (3)
    0x81, 0x06,         //     Input (Data, Var, Rel) - X, Y, wheel
    0xC0,               //   End Collection
    0xC0,               // End Collection
];

/// Owned copy of the report descriptor, immutable once initialized
#[derive(Debug)]
pub struct HidDescriptor {
    bytes: Box<[u8]>,
}

impl HidDescriptor {
    /// Allocate and copy the report descriptor
    pub fn initialize() -> Result<Self, HidError> {
        Self::from_bytes(REPORT_DESCRIPTOR)
    }

    fn from_bytes(src: &[u8]) -> Result<Self, HidError> {
        if u16::try_from(src.len()).is_err() {
            return Err(HidError::ResourceExhausted(format!(
                "descriptor of {} bytes exceeds the 16-bit length field",
                src.len()
            )));
        }

        let mut bytes = Vec::new();
        bytes
            .try_reserve_exact(src.len())
            .map_err(|e| HidError::ResourceExhausted(format!("HID descriptor: {e}")))?;
        bytes.extend_from_slice(src);

        Ok(Self {
            bytes: bytes.into_boxed_slice(),
        })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Descriptor length as sent in REGISTER_HID
    pub fn len(&self) -> u16 {
        // Checked in from_bytes
        self.bytes.len() as u16
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Release the descriptor (same as dropping it)
    pub fn teardown(self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initialize_copies_descriptor() {
        let desc = HidDescriptor::initialize().unwrap();
        assert_eq!(desc.bytes(), REPORT_DESCRIPTOR);
        assert_eq!(desc.len() as usize, REPORT_DESCRIPTOR.len());
        assert!(!desc.is_empty());
        desc.teardown();
    }

    #[test]
    fn test_descriptor_length() {
        assert_eq!(REPORT_DESCRIPTOR.len(), 95);
    }

    #[test]
    fn test_collections_and_report_ids() {
        let d = REPORT_DESCRIPTOR;
        // Keyboard collection opens the descriptor
        assert_eq!(&d[..8], &[0x05, 0x01, 0x09, 0x06, 0xA1, 0x01, 0x85, 0x01]);
        // Mouse collection follows the keyboard's End Collection
        let mouse = d.iter().position(|&b| b == 0xC0).unwrap() + 1;
        assert_eq!(
            &d[mouse..mouse + 8],
            &[0x05, 0x01, 0x09, 0x02, 0xA1, 0x01, 0x85, 0x02]
        );
        // Two nested End Collection items close the mouse
        assert_eq!(&d[d.len() - 2..], &[0xC0, 0xC0]);
    }

    #[test]
    fn test_oversized_descriptor_rejected() {
        let big = vec![0u8; u16::MAX as usize + 1];
        assert!(matches!(
            HidDescriptor::from_bytes(&big),
            Err(HidError::ResourceExhausted(_))
        ));
    }
}
