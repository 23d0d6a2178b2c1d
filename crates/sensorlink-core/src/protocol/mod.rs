//! Device Protocol
//!
//! Newline-delimited JSON telemetry over a serial byte stream.
//!
//! Covers finding the device, opening it, splitting its output into lines,
//! decoding those lines, and keeping the link alive across unplug/replug.

mod codec;
mod connection;
mod error;
mod frame;
pub mod locator;
pub mod serial;
mod stream;

pub use codec::LineCodec;
pub use connection::{LinkConfig, LinkEvent, LinkManager, LinkState, LinkStatus, RetryCause};
pub use error::LinkError;
pub use frame::{parse_line, Frame, RejectReason};
pub use locator::{DeviceLocator, KNOWN_VENDORS};
pub use serial::{list_ports, open_port, PortInfo};
pub use stream::{DeviceBackend, DeviceStream, SerialBackend};

use std::time::Duration;

/// Default baud rate for the sensor board
pub const DEFAULT_BAUD_RATE: u32 = 115200;

/// Retry delay when no serial endpoint exists at all
pub const NO_DEVICE_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Retry delay after a failed open
pub const OPEN_FAILURE_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Reconnect delay after an established link closes
pub const LINK_LOST_RETRY_DELAY: Duration = Duration::from_secs(3);

/// Longest device line kept; anything longer is treated as noise
pub const MAX_LINE_LENGTH: usize = 4096;
