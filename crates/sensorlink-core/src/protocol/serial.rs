//! Serial port handling
//!
//! Port enumeration and opening for the telemetry device.

use serde::Serialize;
use serialport::{SerialPortInfo, SerialPortType};
use std::collections::HashMap;
#[cfg(target_os = "linux")]
use std::fs;
use tokio_serial::{DataBits, FlowControl, Parity, SerialPortBuilderExt, SerialStream, StopBits};

use super::LinkError;

/// Information about an available serial port
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortInfo {
    /// Port name (e.g., "/dev/ttyUSB0" or "COM3")
    pub name: String,

    /// USB vendor ID (if USB device)
    pub vid: Option<u16>,

    /// USB product ID (if USB device)
    pub pid: Option<u16>,

    /// Manufacturer name (if available)
    pub manufacturer: Option<String>,

    /// Product name (if available)
    pub product: Option<String>,
}

impl PortInfo {
    /// A port known only by its path
    pub fn from_path(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            vid: None,
            pid: None,
            manufacturer: None,
            product: None,
        }
    }

    /// Builder-style manufacturer override
    pub fn with_manufacturer(mut self, manufacturer: impl Into<String>) -> Self {
        self.manufacturer = Some(manufacturer.into());
        self
    }
}

impl From<SerialPortInfo> for PortInfo {
    fn from(info: SerialPortInfo) -> Self {
        let (vid, pid, manufacturer, product) = match info.port_type {
            SerialPortType::UsbPort(usb_info) => (
                Some(usb_info.vid),
                Some(usb_info.pid),
                usb_info.manufacturer,
                usb_info.product,
            ),
            _ => (None, None, None, None),
        };

        Self {
            name: info.port_name,
            vid,
            pid,
            manufacturer,
            product,
        }
    }
}

/// Ordering rank: ttyACM*, then ttyUSB* (each by numeric suffix), then the
/// rest by name.
fn port_rank(name: &str) -> (u8, u32, &str) {
    let base = name.rsplit('/').next().unwrap_or(name);
    for (rank, prefix) in [(0, "ttyACM"), (1, "ttyUSB")] {
        if let Some(suffix) = base.strip_prefix(prefix) {
            return (rank, suffix.parse().unwrap_or(u32::MAX), base);
        }
    }
    (2, 0, base)
}

fn sort_ports(ports: &mut [PortInfo]) {
    ports.sort_by(|a, b| port_rank(&a.name).cmp(&port_rank(&b.name)));
}

/// USB CDC/serial nodes present in /dev. Freshly plugged adapters can show up
/// here before udev reports them.
#[cfg(target_os = "linux")]
fn dev_serial_nodes() -> Vec<String> {
    let Ok(entries) = fs::read_dir("/dev") else {
        return Vec::new();
    };
    entries
        .flatten()
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| name.starts_with("ttyACM") || name.starts_with("ttyUSB"))
        .map(|name| format!("/dev/{name}"))
        .collect()
}

/// Enumerate candidate ports in a stable order. Platform enumeration errors
/// are logged and treated as "no ports".
pub fn list_ports() -> Vec<PortInfo> {
    #[cfg_attr(not(target_os = "linux"), allow(unused_mut))]
    let mut ports: HashMap<String, PortInfo> = match serialport::available_ports() {
        Ok(found) => found
            .into_iter()
            .map(PortInfo::from)
            .map(|port| (port.name.clone(), port))
            .collect(),
        Err(e) => {
            tracing::debug!("serial port enumeration failed: {e}");
            HashMap::new()
        }
    };

    #[cfg(target_os = "linux")]
    for path in dev_serial_nodes() {
        ports
            .entry(path.clone())
            .or_insert_with(|| PortInfo::from_path(path));
    }

    let mut ports: Vec<PortInfo> = ports.into_values().collect();
    sort_ports(&mut ports);
    ports
}

/// Open a serial port 8N1 without flow control.
///
/// Must be called from within a tokio runtime.
pub fn open_port(name: &str, baud_rate: u32) -> Result<SerialStream, LinkError> {
    tokio_serial::new(name, baud_rate)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .open_native_async()
        .map_err(|e| LinkError::from_open(name, e))
}
