//! Device selection
//!
//! Picks the endpoint most likely to be the sensor board out of whatever
//! the platform currently reports. Runs fresh on every connection attempt.

use super::PortInfo;

/// Manufacturer substrings of USB-serial bridges found on common
/// microcontroller boards. Matched case-sensitively.
pub const KNOWN_VENDORS: &[&str] = &[
    "Silicon Labs",
    "wch.cn",
    "WCH",
    "QinHeng",
    "FTDI",
    "Espressif",
    "Arduino",
    "Prolific",
    "Adafruit",
    "Raspberry Pi",
];

/// Chooses which port to open
#[derive(Debug, Clone)]
pub struct DeviceLocator {
    vendors: Vec<String>,
    pinned: Option<String>,
}

impl Default for DeviceLocator {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceLocator {
    /// Locator using [`KNOWN_VENDORS`]
    pub fn new() -> Self {
        Self::with_vendors(KNOWN_VENDORS.iter().copied())
    }

    /// Locator with a custom vendor allow-list
    pub fn with_vendors<I, S>(vendors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            vendors: vendors.into_iter().map(Into::into).collect(),
            pinned: None,
        }
    }

    /// Always select `path`, whether or not it is currently enumerated
    pub fn pin(mut self, path: impl Into<String>) -> Self {
        self.pinned = Some(path.into());
        self
    }

    /// The pinned path, if any
    pub fn pinned(&self) -> Option<&str> {
        self.pinned.as_deref()
    }

    /// True if the port's manufacturer contains an allow-listed vendor
    pub fn is_known_vendor(&self, port: &PortInfo) -> bool {
        port.manufacturer.as_deref().is_some_and(|manufacturer| {
            self.vendors
                .iter()
                .any(|vendor| manufacturer.contains(vendor.as_str()))
        })
    }

    /// Select a port: pinned path, else first allow-listed vendor, else the
    /// first port in enumeration order.
    pub fn select(&self, ports: &[PortInfo]) -> Option<PortInfo> {
        if let Some(path) = &self.pinned {
            let port = ports
                .iter()
                .find(|p| &p.name == path)
                .cloned()
                .unwrap_or_else(|| PortInfo::from_path(path.clone()));
            return Some(port);
        }

        ports
            .iter()
            .find(|p| self.is_known_vendor(p))
            .or_else(|| ports.first())
            .cloned()
    }
}
