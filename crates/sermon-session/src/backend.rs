//! Device backends
//!
//! A [`PortBackend`] resolves port names to open byte streams. The session
//! only ever talks to this trait, so the same state machine drives real
//! serial ports ([`SerialBackend`](crate::SerialBackend)) and in-memory ports
//! ([`VirtualBus`](crate::VirtualBus)).

use std::time::Duration;

use sermon_config::PortConfiguration;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::SessionError;

/// Source of device handles
pub trait PortBackend: Send + Sync + 'static {
    /// Open device handle
    type Io: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    /// Names of the ports currently present, sorted
    fn port_names(&self) -> Vec<String>;

    /// Whether `name` currently resolves to a device
    fn is_present(&self, name: &str) -> bool {
        self.port_names().iter().any(|port| port == name)
    }

    /// Open `name` and apply the line parameters from `config`
    ///
    /// Must be called from within a Tokio runtime.
    fn open(
        &self,
        name: &str,
        config: &PortConfiguration,
        open_timeout: Duration,
    ) -> Result<Self::Io, SessionError>;
}

/// Line parameters in the form the serial driver layer accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverSettings {
    pub baud_rate: u32,
    pub data_bits: serialport::DataBits,
    pub stop_bits: serialport::StopBits,
    pub parity: serialport::Parity,
    pub flow_control: serialport::FlowControl,
}

impl DriverSettings {
    /// Convert `config`, rejecting combinations the driver layer cannot express
    pub fn resolve(port: &str, config: &PortConfiguration) -> Result<Self, SessionError> {
        let unsupported = |reason: String| SessionError::UnsupportedParameters {
            port: port.to_string(),
            reason,
        };

        let stop_bits = config
            .stop_bits()
            .to_serialport()
            .ok_or_else(|| unsupported(format!("{} stop bits", config.stop_bits())))?;
        let parity = config
            .parity()
            .to_serialport()
            .ok_or_else(|| unsupported(format!("{} parity", config.parity())))?;
        let flow_control = config
            .flow_control()
            .to_serialport()
            .ok_or_else(|| unsupported(format!("flow control {}", config.flow_control())))?;

        Ok(Self {
            baud_rate: config.baud_rate().get(),
            data_bits: config.data_bits().to_serialport(),
            stop_bits,
            parity,
            flow_control,
        })
    }
}
