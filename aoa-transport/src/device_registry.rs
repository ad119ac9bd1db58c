//! Accessory-mode identity table
//!
//! After ACCESSORY_START a phone re-enumerates with Google's vendor ID and
//! one of a fixed set of product IDs. Those are the only devices the
//! registration phase will talk to.

/// Google vendor ID used by devices in accessory mode
pub const ACCESSORY_VENDOR_ID: u16 = 0x18D1;

/// Accessory-mode PIDs
pub const ACCESSORY_PIDS: &[u16] = &[
    0x2D00, // accessory
    0x2D01, // accessory + ADB
    0x2D02, // audio
    0x2D03, // audio + ADB
    0x2D04, // accessory + audio
    0x2D05, // accessory + audio + ADB
];

/// Check if PID is one of the accessory-mode PIDs
#[inline]
pub fn is_accessory_pid(pid: u16) -> bool {
    ACCESSORY_PIDS.contains(&pid)
}

/// Check if VID/PID identifies a device already in accessory mode
#[inline]
pub fn is_accessory_mode(vid: u16, pid: u16) -> bool {
    vid == ACCESSORY_VENDOR_ID && is_accessory_pid(pid)
}

/// Short description of an accessory-mode PID
pub fn accessory_mode_name(pid: u16) -> Option<&'static str> {
    match pid {
        0x2D00 => Some("accessory"),
        0x2D01 => Some("accessory+adb"),
        0x2D02 => Some("audio"),
        0x2D03 => Some("audio+adb"),
        0x2D04 => Some("accessory+audio"),
        0x2D05 => Some("accessory+audio+adb"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_accessory_pids() {
        for pid in 0x2D00..=0x2D05 {
            assert!(is_accessory_pid(pid));
            assert!(accessory_mode_name(pid).is_some());
        }
    }

    #[test]
    fn test_outside_range_not_accessory() {
        assert!(!is_accessory_pid(0x2D06));
        assert!(!is_accessory_pid(0x2CFF));
        assert!(!is_accessory_pid(0x4EE7)); // Pixel in MTP mode
        assert_eq!(accessory_mode_name(0x2D06), None);
    }

    #[test]
    fn test_vendor_must_match() {
        assert!(is_accessory_mode(0x18D1, 0x2D00));
        assert!(!is_accessory_mode(0x04E8, 0x2D00));
    }
}
