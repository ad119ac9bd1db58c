//! Utility command handlers.

use super::CommandResult;
use aoa_driver::{DriverConfig, KnownDevices};
use aoa_hid::{DevicePredicate, HidDescriptor};
use aoa_transport::{
    accessory_mode_name, is_accessory_mode, DeviceDiscovery, PeerInfo, UsbDiscovery,
};
use serde::Serialize;

/// How the daemon would treat a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    /// Already in accessory mode; phase 2 would bind it
    Accessory,
    /// On the allow-list; phase 1 would switch it
    Known,
    Other,
}

impl Classification {
    pub fn of(info: &PeerInfo, known: &KnownDevices) -> Self {
        if is_accessory_mode(info.vid, info.pid) {
            Classification::Accessory
        } else if known.is_recognized(info.vid, info.pid) {
            Classification::Known
        } else {
            Classification::Other
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Accessory => "accessory",
            Classification::Known => "known",
            Classification::Other => "-",
        }
    }
}

#[derive(Debug, Serialize)]
struct DeviceRow<'a> {
    vid: String,
    pid: String,
    bus: &'a str,
    address: u8,
    manufacturer: Option<&'a str>,
    product: Option<&'a str>,
    class: Classification,
    mode: Option<&'static str>,
}

/// List attached USB devices
pub async fn devices(config: &DriverConfig, json: bool) -> CommandResult {
    let known = KnownDevices::with_entries(config.known_devices.iter().copied())?;
    let discovery = UsbDiscovery::new();
    let devices = discovery.list_devices().await?;

    let rows: Vec<DeviceRow> = devices
        .iter()
        .map(|info| DeviceRow {
            vid: format!("{:04x}", info.vid),
            pid: format!("{:04x}", info.pid),
            bus: &info.bus_id,
            address: info.device_address,
            manufacturer: info.manufacturer.as_deref(),
            product: info.product_name.as_deref(),
            class: Classification::of(info, &known),
            mode: is_accessory_mode(info.vid, info.pid)
                .then(|| accessory_mode_name(info.pid))
                .flatten(),
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    println!("All USB devices:");
    for row in &rows {
        println!(
            "  VID={} PID={} bus={} addr={:<3} {:<9} {} {}",
            row.vid,
            row.pid,
            row.bus,
            row.address,
            row.class.as_str(),
            row.manufacturer.unwrap_or("?"),
            row.mode.or(row.product).unwrap_or("?"),
        );
    }
    Ok(())
}

/// Hex dump of the HID report descriptor
pub fn descriptor() -> CommandResult {
    let descriptor = HidDescriptor::initialize()?;
    println!("HID report descriptor ({} bytes):", descriptor.len());
    print!("{}", hex_dump(descriptor.bytes()));
    Ok(())
}

/// 16 bytes per line, prefixed by the offset
fn hex_dump(bytes: &[u8]) -> String {
    bytes
        .chunks(16)
        .enumerate()
        .map(|(i, chunk)| {
            let hex: Vec<String> = chunk.iter().map(|b| format!("{b:02x}")).collect();
            format!("{:04x}: {}\n", i * 16, hex.join(" "))
        })
        .collect()
}
