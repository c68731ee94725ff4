//! Serial port backend on top of tokio-serial

use std::path::Path;
use std::time::Duration;

use sermon_config::{PortConfiguration, PortScanner};
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::debug;

use crate::backend::{DriverSettings, PortBackend};
use crate::error::SessionError;

/// Opens OS serial devices
#[derive(Debug, Clone, Default)]
pub struct SerialBackend {
    scanner: PortScanner,
}

impl SerialBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scanner(scanner: PortScanner) -> Self {
        Self { scanner }
    }
}

impl PortBackend for SerialBackend {
    type Io = SerialStream;

    fn port_names(&self) -> Vec<String> {
        self.scanner.port_names()
    }

    fn is_present(&self, name: &str) -> bool {
        // Device nodes vanish on unplug; COM names have no path and need enumeration
        Path::new(name).exists() || self.port_names().iter().any(|port| port == name)
    }

    fn open(
        &self,
        name: &str,
        config: &PortConfiguration,
        open_timeout: Duration,
    ) -> Result<SerialStream, SessionError> {
        let settings = DriverSettings::resolve(name, config)?;
        if !self.is_present(name) {
            return Err(SessionError::PortNotFound(name.to_string()));
        }
        debug!("Opening {} at {}", name, config.line_summary());

        tokio_serial::new(name, settings.baud_rate)
            .data_bits(settings.data_bits)
            .stop_bits(settings.stop_bits)
            .parity(settings.parity)
            .flow_control(settings.flow_control)
            .timeout(open_timeout)
            .open_native_async()
            .map_err(|e| SessionError::from_serialport(name, e))
    }
}
