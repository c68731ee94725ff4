//! Serial port scanner
//!
//! Enumerates the serial devices the OS currently offers. The list is a live
//! query: callers re-run it whenever they need a fresh view.

use serialport::{available_ports, SerialPortType};
use tracing::{debug, warn};

use crate::error::ConfigError;

/// Information about a serial port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialPortInfo {
    /// Port name (e.g., /dev/ttyUSB0, COM3)
    pub port: String,
    /// USB Vendor ID (if USB)
    pub vid: Option<u16>,
    /// USB Product ID (if USB)
    pub pid: Option<u16>,
    /// USB serial number (if available)
    pub serial_number: Option<String>,
    /// USB manufacturer string
    pub manufacturer: Option<String>,
    /// USB product string
    pub product: Option<String>,
}

impl SerialPortInfo {
    /// A port known only by name
    pub fn named(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            vid: None,
            pid: None,
            serial_number: None,
            manufacturer: None,
            product: None,
        }
    }

    fn from_serialport(name: String, port_type: &SerialPortType) -> Self {
        match port_type {
            SerialPortType::UsbPort(usb) => Self {
                port: name,
                vid: Some(usb.vid),
                pid: Some(usb.pid),
                serial_number: usb.serial_number.clone(),
                manufacturer: usb.manufacturer.clone(),
                product: usb.product.clone(),
            },
            _ => Self::named(name),
        }
    }

    /// One-line description for port pickers, e.g. "/dev/ttyUSB0 (FT232R, 0403:6001)"
    pub fn describe(&self) -> String {
        match (self.product.as_deref(), self.vid, self.pid) {
            (Some(product), Some(vid), Some(pid)) => {
                format!("{} ({}, {:04x}:{:04x})", self.port, product, vid, pid)
            }
            (None, Some(vid), Some(pid)) => format!("{} ({:04x}:{:04x})", self.port, vid, pid),
            (Some(product), _, _) => format!("{} ({})", self.port, product),
            _ => self.port.clone(),
        }
    }
}

/// Serial port scanner configuration
#[derive(Debug, Clone, Default)]
pub struct ScannerConfig {
    /// Skip ports whose name contains any of these patterns
    pub skip_patterns: Vec<String>,
}

/// Serial port scanner
#[derive(Debug, Clone)]
pub struct PortScanner {
    config: ScannerConfig,
}

impl PortScanner {
    /// Scanner that hides the macOS Bluetooth pseudo-ports
    pub fn new() -> Self {
        Self {
            config: ScannerConfig {
                skip_patterns: vec!["Bluetooth".to_string()],
            },
        }
    }

    pub fn with_config(config: ScannerConfig) -> Self {
        Self { config }
    }

    /// Enumerate the available serial ports, sorted by name
    pub fn enumerate_ports(&self) -> Result<Vec<SerialPortInfo>, ConfigError> {
        let ports = available_ports().map_err(|e| ConfigError::EnumerationFailed(e.to_string()))?;

        let mut result: Vec<_> = ports
            .into_iter()
            .map(|p| SerialPortInfo::from_serialport(p.port_name, &p.port_type))
            .filter(|p| !self.should_skip_port(p))
            .collect();
        result.sort_by(|a, b| a.port.cmp(&b.port));
        result.dedup_by(|a, b| a.port == b.port);

        debug!("Found {} serial port(s)", result.len());
        Ok(result)
    }

    /// Names of the available ports; an enumeration failure yields an empty list
    pub fn port_names(&self) -> Vec<String> {
        match self.enumerate_ports() {
            Ok(ports) => ports.into_iter().map(|p| p.port).collect(),
            Err(e) => {
                warn!("{}", e);
                Vec::new()
            }
        }
    }

    fn should_skip_port(&self, port: &SerialPortInfo) -> bool {
        self.config
            .skip_patterns
            .iter()
            .any(|pattern| port.port.contains(pattern.as_str()))
    }
}

impl Default for PortScanner {
    fn default() -> Self {
        Self::new()
    }
}

/// Names of the serial ports currently present, sorted and de-duplicated
///
/// Never fails: if the OS query fails the error is logged and the list is
/// empty.
pub fn list_available_port_names() -> Vec<String> {
    PortScanner::new().port_names()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serialport::UsbPortInfo;

    #[test]
    fn test_serial_port_info_from_usb() {
        let usb_info = SerialPortType::UsbPort(UsbPortInfo {
            vid: 0x0403,
            pid: 0x6001,
            serial_number: Some("A50285BI".to_string()),
            manufacturer: Some("FTDI".to_string()),
            product: Some("FT232R".to_string()),
        });

        let info = SerialPortInfo::from_serialport("/dev/ttyUSB0".to_string(), &usb_info);

        assert_eq!(info.vid, Some(0x0403));
        assert_eq!(info.pid, Some(0x6001));
        assert_eq!(info.describe(), "/dev/ttyUSB0 (FT232R, 0403:6001)");
    }

    #[test]
    fn test_non_usb_port_is_named_only() {
        let info = SerialPortInfo::from_serialport("COM1".to_string(), &SerialPortType::Unknown);
        assert_eq!(info, SerialPortInfo::named("COM1"));
        assert_eq!(info.describe(), "COM1");
    }

    #[test]
    fn test_skip_patterns() {
        let scanner = PortScanner::with_config(ScannerConfig {
            skip_patterns: vec!["Bluetooth".to_string(), "ttyS".to_string()],
        });
        assert!(scanner.should_skip_port(&SerialPortInfo::named("/dev/cu.Bluetooth-Incoming-Port")));
        assert!(scanner.should_skip_port(&SerialPortInfo::named("/dev/ttyS0")));
        assert!(!scanner.should_skip_port(&SerialPortInfo::named("/dev/ttyACM0")));
    }

    #[test]
    fn test_port_names_never_fails() {
        let names = list_available_port_names();
        let mut sorted = names.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(names, sorted);
    }
}
