//! Protocol constants and request builders for the Android Open Accessory protocol
//!
//! References:
//! - <https://source.android.com/docs/core/interaction/accessories/aoa>
//! - <https://source.android.com/docs/core/interaction/accessories/aoa2>

use crate::types::VendorRequest;

/// AOA vendor control requests (ACCESSORY_*)
pub mod request {
    pub const GET_PROTOCOL: u8 = 51;
    pub const SEND_STRING: u8 = 52;
    pub const START: u8 = 53;
    pub const REGISTER_HID: u8 = 54;
    pub const UNREGISTER_HID: u8 = 55;
    pub const SET_HID_REPORT_DESC: u8 = 56;
    pub const SEND_HID_EVENT: u8 = 57;

    /// Get human-readable name for request code
    pub fn name(request: u8) -> &'static str {
        match request {
            GET_PROTOCOL => "GET_PROTOCOL",
            SEND_STRING => "SEND_STRING",
            START => "START",
            REGISTER_HID => "REGISTER_HID",
            UNREGISTER_HID => "UNREGISTER_HID",
            SET_HID_REPORT_DESC => "SET_HID_REPORT_DESC",
            SEND_HID_EVENT => "SEND_HID_EVENT",
            _ => "UNKNOWN",
        }
    }
}

/// Identification string indices for SEND_STRING
pub mod string_index {
    pub const MANUFACTURER: u16 = 0;
    pub const MODEL: u16 = 1;
    pub const DESCRIPTION: u16 = 2;
    pub const VERSION: u16 = 3;
}

/// HID report IDs used on the wire
pub mod report_id {
    pub const KEYBOARD: u8 = 1;
    pub const MOUSE: u8 = 2;
    /// Consumer/media keys (volume and brightness)
    pub const CONSUMER: u8 = 3;
}

/// Timing constants
pub mod timing {
    /// Timeout for every control transfer (ms)
    pub const TRANSFER_TIMEOUT_MS: u64 = 1000;
    /// Hold time between a key press report and its release (ms)
    pub const KEY_DWELL_MS: u64 = 100;
}

/// AOA protocol version that supports HID (AOAv2)
pub const SUPPORTED_PROTOCOL: u16 = 2;

/// Length of the GET_PROTOCOL response
pub const PROTOCOL_RESPONSE_LEN: usize = 2;

/// Accessory-assigned id of the single HID device this driver registers
pub const HID_ID: u16 = 1;

/// ACCESSORY_GET_PROTOCOL (IN, 2 bytes little endian)
pub const fn get_protocol() -> VendorRequest {
    VendorRequest::new(request::GET_PROTOCOL, 0, 0)
}

/// ACCESSORY_SEND_STRING with a NUL terminated payload
pub const fn send_string(index: u16) -> VendorRequest {
    VendorRequest::new(request::SEND_STRING, 0, index)
}

/// ACCESSORY_START (no payload)
pub const fn start() -> VendorRequest {
    VendorRequest::new(request::START, 0, 0)
}

/// ACCESSORY_REGISTER_HID: value = HID id, index = total descriptor length
pub const fn register_hid(descriptor_len: u16) -> VendorRequest {
    VendorRequest::new(request::REGISTER_HID, HID_ID, descriptor_len)
}

/// ACCESSORY_SET_HID_REPORT_DESC: value = HID id, index = offset into the descriptor
pub const fn set_hid_report_desc(offset: u16) -> VendorRequest {
    VendorRequest::new(request::SET_HID_REPORT_DESC, HID_ID, offset)
}

/// ACCESSORY_SEND_HID_EVENT: value = HID id, payload = one report
pub const fn send_hid_event() -> VendorRequest {
    VendorRequest::new(request::SEND_HID_EVENT, HID_ID, 0)
}

/// Encode an identification string the way the device expects it (NUL terminated)
pub fn encode_string(s: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(s.len() + 1);
    buf.extend_from_slice(s.as_bytes());
    buf.push(0);
    buf
}

/// Decode the GET_PROTOCOL response
pub fn decode_protocol(buf: &[u8; PROTOCOL_RESPONSE_LEN]) -> u16 {
    u16::from_le_bytes(*buf)
}
