//! Link errors

use thiserror::Error;

/// Errors raised while talking to the serial device
#[derive(Error, Debug)]
pub enum LinkError {
    #[error("Serial port error: {0}")]
    SerialError(String),

    #[error("Port not found: {0}")]
    PortNotFound(String),

    #[error("Port busy or access denied: {0}")]
    PortUnavailable(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl LinkError {
    /// Classify a `serialport` error raised while opening `port`
    pub fn from_open(port: &str, err: serialport::Error) -> Self {
        match err.kind() {
            serialport::ErrorKind::NoDevice => LinkError::PortNotFound(port.to_string()),
            serialport::ErrorKind::Io(std::io::ErrorKind::PermissionDenied) => {
                LinkError::PortUnavailable(format!("{port}: {}", err.description))
            }
            _ => LinkError::SerialError(format!("{port}: {}", err.description)),
        }
    }
}
