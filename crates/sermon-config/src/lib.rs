//! Serial Port Configuration Library
//!
//! This crate holds everything needed to describe which serial device to open
//! and how to frame bits on its line: the line-parameter domains, the
//! [`PortConfiguration`] value object, and live port enumeration.
//!
//! # Example
//!
//! ```rust,no_run
//! use sermon_config::{list_available_port_names, PortConfiguration};
//!
//! let ports = list_available_port_names();
//! let mut config = PortConfiguration::default();
//! if let Some(first) = ports.first() {
//!     config.set_port_name(first.as_str());
//! }
//! config.set_baud_rate("115200").unwrap();
//! println!("{}", config);
//! ```

pub mod config;
pub mod error;
pub mod line;
pub mod port_list;
pub mod scanner;

pub use config::PortConfiguration;
pub use error::ConfigError;
pub use line::{BaudRate, DataBits, FlowControl, Parity, StopBits};
pub use port_list::PortListChange;
pub use scanner::{list_available_port_names, PortScanner, ScannerConfig, SerialPortInfo};
