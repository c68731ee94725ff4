//! Port configuration value object

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::line::{BaudRate, DataBits, FlowControl, Parity, StopBits};

/// Which device to open and how to frame bits on its line
///
/// Every field except the port name always holds a valid value, so a
/// session can be attempted with incomplete operator input. Without a port
/// name a session never tries to open anything.
///
/// Setters accept either the typed value or a raw value (`u32`, `u8`, `f32`
/// or a UI label). An out-of-domain value is rejected with
/// [`ConfigError::InvalidParameterValue`] and the previous value is kept.
///
/// ```
/// use sermon_config::{PortConfiguration, Parity};
///
/// let mut config = PortConfiguration::new("/dev/ttyUSB0");
/// config.set_baud_rate(115200u32).unwrap();
/// config.set_parity(Parity::Even).unwrap();
/// config.set_stop_bits("1.5").unwrap();
/// assert!(config.set_data_bits(9u8).is_err());
/// assert_eq!(config.data_bits().bits(), 8);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PortConfiguration {
    port_name: Option<String>,
    baud_rate: BaudRate,
    data_bits: DataBits,
    stop_bits: StopBits,
    parity: Parity,
    flow_control: FlowControl,
}

impl PortConfiguration {
    /// Default line parameters (9600 8N1, no flow control) for the given port
    pub fn new(port_name: impl Into<String>) -> Self {
        let mut config = Self::default();
        config.set_port_name(port_name);
        config
    }

    pub fn port_name(&self) -> Option<&str> {
        self.port_name.as_deref()
    }

    pub fn baud_rate(&self) -> BaudRate {
        self.baud_rate
    }

    pub fn data_bits(&self) -> DataBits {
        self.data_bits
    }

    pub fn stop_bits(&self) -> StopBits {
        self.stop_bits
    }

    pub fn parity(&self) -> Parity {
        self.parity
    }

    pub fn flow_control(&self) -> FlowControl {
        self.flow_control
    }

    /// Select the target device; a blank name clears the selection
    pub fn set_port_name(&mut self, port_name: impl Into<String>) {
        let name = port_name.into();
        let trimmed = name.trim();
        self.port_name = if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        };
    }

    /// Forget the selected device
    pub fn clear_port_name(&mut self) {
        self.port_name = None;
    }

    pub fn set_baud_rate<V>(&mut self, value: V) -> Result<(), ConfigError>
    where
        V: TryInto<BaudRate>,
        ConfigError: From<V::Error>,
    {
        self.baud_rate = value.try_into()?;
        Ok(())
    }

    pub fn set_data_bits<V>(&mut self, value: V) -> Result<(), ConfigError>
    where
        V: TryInto<DataBits>,
        ConfigError: From<V::Error>,
    {
        self.data_bits = value.try_into()?;
        Ok(())
    }

    pub fn set_stop_bits<V>(&mut self, value: V) -> Result<(), ConfigError>
    where
        V: TryInto<StopBits>,
        ConfigError: From<V::Error>,
    {
        self.stop_bits = value.try_into()?;
        Ok(())
    }

    pub fn set_parity<V>(&mut self, value: V) -> Result<(), ConfigError>
    where
        V: TryInto<Parity>,
        ConfigError: From<V::Error>,
    {
        self.parity = value.try_into()?;
        Ok(())
    }

    pub fn set_flow_control<V>(&mut self, value: V) -> Result<(), ConfigError>
    where
        V: TryInto<FlowControl>,
        ConfigError: From<V::Error>,
    {
        self.flow_control = value.try_into()?;
        Ok(())
    }

    /// Compact line summary, e.g. "9600 8N1"
    pub fn line_summary(&self) -> String {
        format!(
            "{} {}{}{}",
            self.baud_rate,
            self.data_bits,
            self.parity.code(),
            self.stop_bits
        )
    }
}

impl fmt::Display for PortConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} @ {}, flow control {}",
            self.port_name.as_deref().unwrap_or("<no port>"),
            self.line_summary(),
            self.flow_control
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid_without_port() {
        let config = PortConfiguration::default();
        assert_eq!(config.port_name(), None);
        assert_eq!(config.baud_rate().get(), 9600);
        assert_eq!(config.data_bits(), DataBits::Eight);
        assert_eq!(config.stop_bits(), StopBits::One);
        assert_eq!(config.parity(), Parity::None);
        assert!(config.flow_control().is_none());
        assert_eq!(config.line_summary(), "9600 8N1");
    }

    #[test]
    fn test_rejected_values_keep_previous() {
        let mut config = PortConfiguration::new("COM3");
        config.set_baud_rate(57600u32).unwrap();
        config.set_data_bits(7u8).unwrap();
        config.set_stop_bits(StopBits::Two).unwrap();
        config.set_parity("odd").unwrap();
        config.set_flow_control(FlowControl::XON_XOFF).unwrap();

        assert!(config.set_baud_rate(12345u32).is_err());
        assert!(config.set_data_bits(4u8).is_err());
        assert!(config.set_stop_bits(0.5f32).is_err());
        assert!(config.set_parity("sometimes").is_err());
        assert!(config.set_flow_control("carrier pigeon").is_err());

        assert_eq!(config.baud_rate().get(), 57600);
        assert_eq!(config.data_bits(), DataBits::Seven);
        assert_eq!(config.stop_bits(), StopBits::Two);
        assert_eq!(config.parity(), Parity::Odd);
        assert_eq!(config.flow_control(), FlowControl::XON_XOFF);
    }

    #[test]
    fn test_invalid_value_error_names_parameter() {
        let mut config = PortConfiguration::default();
        let err = config.set_data_bits("nine").unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidParameterValue {
                parameter: "data bits",
                value: "nine".to_string(),
            }
        );
    }

    #[test]
    fn test_blank_port_name_clears_selection() {
        let mut config = PortConfiguration::new("/dev/ttyACM0");
        assert_eq!(config.port_name(), Some("/dev/ttyACM0"));
        config.set_port_name("   ");
        assert_eq!(config.port_name(), None);
    }

    #[test]
    fn test_display_summary() {
        let mut config = PortConfiguration::new("/dev/ttyUSB0");
        config.set_parity(Parity::Even).unwrap();
        config.set_flow_control(FlowControl::RTS_CTS).unwrap();
        assert_eq!(
            config.to_string(),
            "/dev/ttyUSB0 @ 9600 8E1, flow control RTS/CTS"
        );
    }

    #[test]
    fn test_deserialize_validates_fields() {
        let json = r#"{"port_name":"COM7","baud_rate":38400,"data_bits":7,"stop_bits":"1.5","parity":"mark"}"#;
        let config: PortConfiguration = serde_json::from_str(json).unwrap();
        assert_eq!(config.port_name(), Some("COM7"));
        assert_eq!(config.baud_rate().get(), 38400);
        assert_eq!(config.stop_bits(), StopBits::OnePointFive);
        assert_eq!(config.parity(), Parity::Mark);
        assert!(config.flow_control().is_none());

        let bad = r#"{"baud_rate":31337}"#;
        assert!(serde_json::from_str::<PortConfiguration>(bad).is_err());
    }
}
