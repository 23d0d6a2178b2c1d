use tokio::io::AsyncRead;

use super::{serial, LinkError, PortInfo};

/// Byte stream read from an opened device
pub type DeviceStream = Box<dyn AsyncRead + Send + Unpin>;

/// Abstraction over where devices come from (real serial ports, or a
/// scripted source in tests)
pub trait DeviceBackend: Send + Sync + 'static {
    /// Enumerate currently visible endpoints
    fn list_ports(&self) -> Vec<PortInfo>;

    /// Open `port` at `baud_rate`
    fn open(&self, port: &PortInfo, baud_rate: u32) -> Result<DeviceStream, LinkError>;
}

/// Host serial ports via `serialport` / `tokio-serial`
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialBackend;

impl DeviceBackend for SerialBackend {
    fn list_ports(&self) -> Vec<PortInfo> {
        serial::list_ports()
    }

    fn open(&self, port: &PortInfo, baud_rate: u32) -> Result<DeviceStream, LinkError> {
        let stream = serial::open_port(&port.name, baud_rate)?;
        Ok(Box::new(stream))
    }
}
