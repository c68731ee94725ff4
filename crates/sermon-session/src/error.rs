//! Error types for port sessions

use std::io;

use sermon_config::ConfigError;
use thiserror::Error;

/// Errors that can occur while opening or using a port session
#[derive(Debug, Error)]
pub enum SessionError {
    /// The configured device does not exist
    #[error("port not found: {0}")]
    PortNotFound(String),

    /// The device exists but is held by another process or access is denied
    #[error("port busy or access denied: {0}")]
    PortBusy(String),

    /// The device or driver rejected the line parameters
    #[error("unsupported line parameters for {port}: {reason}")]
    UnsupportedParameters {
        /// Port being opened
        port: String,
        /// What was rejected
        reason: String,
    },

    /// Any other failure while opening or configuring the device
    #[error("failed to open {port}: {reason}")]
    IoSetupError {
        /// Port being opened
        port: String,
        /// Driver message
        reason: String,
    },

    /// A read from the device failed
    #[error("read error: {0}")]
    IoReadError(#[source] io::Error),

    /// A write to the device failed
    #[error("write error: {0}")]
    IoWriteError(#[source] io::Error),

    /// There is no open device handle
    #[error("not connected")]
    NotConnected,

    /// Invalid configuration value
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl SessionError {
    /// Classify a driver error raised while opening `port`
    pub fn from_serialport(port: &str, err: serialport::Error) -> Self {
        use serialport::ErrorKind;

        match err.kind() {
            ErrorKind::NoDevice => Self::PortNotFound(port.to_string()),
            ErrorKind::InvalidInput => Self::UnsupportedParameters {
                port: port.to_string(),
                reason: err.description,
            },
            ErrorKind::Io(io::ErrorKind::NotFound) => Self::PortNotFound(port.to_string()),
            ErrorKind::Io(io::ErrorKind::ResourceBusy | io::ErrorKind::PermissionDenied) => {
                Self::PortBusy(port.to_string())
            }
            _ => Self::IoSetupError {
                port: port.to_string(),
                reason: err.description,
            },
        }
    }
}
