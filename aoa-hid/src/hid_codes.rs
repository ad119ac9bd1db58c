//! HID usage codes for the reports this driver sends
//!
//! Keyboard usages from the HID Usage Tables, Keyboard/Keypad page (0x07);
//! consumer codes from the Consumer page (0x0C).

/// Keyboard modifier byte bits
pub mod modifier {
    pub const NONE: u8 = 0x00;
    pub const LEFT_SHIFT: u8 = 0x02;
}

/// Keyboard usages
pub mod key {
    /// 'a' (and 'A' with shift); letters are contiguous from here
    pub const A: u8 = 0x04;
    /// '1'; digits 1-9 are contiguous from here
    pub const ONE: u8 = 0x1E;
    pub const ZERO: u8 = 0x27;
}

/// Consumer control codes
pub mod consumer {
    pub const VOLUME_UP: u8 = 0xE9;
    pub const VOLUME_DOWN: u8 = 0xEA;
    pub const BRIGHTNESS_UP: u8 = 0x6F;
    pub const BRIGHTNESS_DOWN: u8 = 0x70;
}

/// One key press: modifier byte plus keycode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyStroke {
    pub modifier: u8,
    pub keycode: u8,
}

impl KeyStroke {
    const fn plain(keycode: u8) -> Self {
        Self {
            modifier: modifier::NONE,
            keycode,
        }
    }

    const fn shifted(keycode: u8) -> Self {
        Self {
            modifier: modifier::LEFT_SHIFT,
            keycode,
        }
    }
}

/// Convert an input byte to a key stroke
/// Returns None for bytes the keyboard channel does not type
pub fn char_to_key(byte: u8) -> Option<KeyStroke> {
    match byte {
        b'a'..=b'z' => Some(KeyStroke::plain(key::A + (byte - b'a'))),
        b'A'..=b'Z' => Some(KeyStroke::shifted(key::A + (byte - b'A'))),
        b'0' => Some(KeyStroke::plain(key::ZERO)),
        b'1'..=b'9' => Some(KeyStroke::plain(key::ONE + (byte - b'1'))),
        _ => None,
    }
}
