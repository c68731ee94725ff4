//! Line parameter domains
//!
//! Each parameter that frames bits on the wire has a fixed set of legal
//! values. The types here make out-of-domain values unrepresentable; raw
//! values (numbers, UI labels) enter through `TryFrom`/`FromStr`, which fail
//! with [`ConfigError::InvalidParameterValue`].
//!
//! Every value's `Display` label parses back through `FromStr`, so a
//! configuration form can offer `ALL` as its choices and feed the selected
//! label straight into a setter.

use std::fmt;
use std::ops::BitOr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// ============================================================================
// Baud rate
// ============================================================================

/// Symbol rate of the line, restricted to the rates offered to the operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct BaudRate(u32);

impl BaudRate {
    /// All selectable baud rates, slowest first
    pub const ALL: [BaudRate; 12] = [
        BaudRate(300),
        BaudRate(600),
        BaudRate(1200),
        BaudRate(2400),
        BaudRate(4800),
        BaudRate(9600),
        BaudRate(14400),
        BaudRate(19200),
        BaudRate(28800),
        BaudRate(38400),
        BaudRate(57600),
        BaudRate(115200),
    ];

    /// 9600 baud
    pub const DEFAULT: BaudRate = BaudRate(9600);

    /// Bits per second
    pub fn get(self) -> u32 {
        self.0
    }
}

impl Default for BaudRate {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<u32> for BaudRate {
    type Error = ConfigError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::ALL
            .iter()
            .copied()
            .find(|rate| rate.0 == value)
            .ok_or_else(|| ConfigError::invalid("baud rate", value))
    }
}

impl From<BaudRate> for u32 {
    fn from(rate: BaudRate) -> Self {
        rate.0
    }
}

impl FromStr for BaudRate {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: u32 = s
            .trim()
            .parse()
            .map_err(|_| ConfigError::invalid("baud rate", s))?;
        Self::try_from(value)
    }
}

impl TryFrom<&str> for BaudRate {
    type Error = ConfigError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl fmt::Display for BaudRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Data bits
// ============================================================================

/// Number of data bits per character
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum DataBits {
    Five,
    Six,
    Seven,
    #[default]
    Eight,
}

impl DataBits {
    /// All selectable data bit counts
    pub const ALL: [DataBits; 4] = [
        DataBits::Five,
        DataBits::Six,
        DataBits::Seven,
        DataBits::Eight,
    ];

    /// Number of bits
    pub fn bits(self) -> u8 {
        match self {
            DataBits::Five => 5,
            DataBits::Six => 6,
            DataBits::Seven => 7,
            DataBits::Eight => 8,
        }
    }

    /// Equivalent `serialport` setting
    pub fn to_serialport(self) -> serialport::DataBits {
        match self {
            DataBits::Five => serialport::DataBits::Five,
            DataBits::Six => serialport::DataBits::Six,
            DataBits::Seven => serialport::DataBits::Seven,
            DataBits::Eight => serialport::DataBits::Eight,
        }
    }
}

impl TryFrom<u8> for DataBits {
    type Error = ConfigError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            5 => Ok(DataBits::Five),
            6 => Ok(DataBits::Six),
            7 => Ok(DataBits::Seven),
            8 => Ok(DataBits::Eight),
            other => Err(ConfigError::invalid("data bits", other)),
        }
    }
}

impl From<DataBits> for u8 {
    fn from(bits: DataBits) -> Self {
        bits.bits()
    }
}

impl FromStr for DataBits {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: u8 = s
            .trim()
            .parse()
            .map_err(|_| ConfigError::invalid("data bits", s))?;
        Self::try_from(value)
    }
}

impl TryFrom<&str> for DataBits {
    type Error = ConfigError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl fmt::Display for DataBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.bits())
    }
}

// ============================================================================
// Stop bits
// ============================================================================

/// Number of stop bits after each character
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum StopBits {
    #[default]
    One,
    OnePointFive,
    Two,
}

impl StopBits {
    /// All selectable stop bit settings
    pub const ALL: [StopBits; 3] = [StopBits::One, StopBits::OnePointFive, StopBits::Two];

    /// UI label ("1", "1.5", "2")
    pub fn label(self) -> &'static str {
        match self {
            StopBits::One => "1",
            StopBits::OnePointFive => "1.5",
            StopBits::Two => "2",
        }
    }

    /// Equivalent `serialport` setting; `None` for 1.5, which it cannot express
    pub fn to_serialport(self) -> Option<serialport::StopBits> {
        match self {
            StopBits::One => Some(serialport::StopBits::One),
            StopBits::OnePointFive => None,
            StopBits::Two => Some(serialport::StopBits::Two),
        }
    }
}

impl TryFrom<f32> for StopBits {
    type Error = ConfigError;

    fn try_from(value: f32) -> Result<Self, Self::Error> {
        if value == 1.0 {
            Ok(StopBits::One)
        } else if value == 1.5 {
            Ok(StopBits::OnePointFive)
        } else if value == 2.0 {
            Ok(StopBits::Two)
        } else {
            Err(ConfigError::invalid("stop bits", value))
        }
    }
}

impl FromStr for StopBits {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1" | "1.0" => Ok(StopBits::One),
            "1.5" => Ok(StopBits::OnePointFive),
            "2" | "2.0" => Ok(StopBits::Two),
            _ => Err(ConfigError::invalid("stop bits", s)),
        }
    }
}

impl TryFrom<&str> for StopBits {
    type Error = ConfigError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl TryFrom<String> for StopBits {
    type Error = ConfigError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<StopBits> for String {
    fn from(stop_bits: StopBits) -> Self {
        stop_bits.label().to_string()
    }
}

impl fmt::Display for StopBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ============================================================================
// Parity
// ============================================================================

/// Parity bit mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    #[default]
    None,
    Odd,
    Even,
    Mark,
    Space,
}

impl Parity {
    /// All selectable parity modes
    pub const ALL: [Parity; 5] = [
        Parity::None,
        Parity::Odd,
        Parity::Even,
        Parity::Mark,
        Parity::Space,
    ];

    /// UI label
    pub fn label(self) -> &'static str {
        match self {
            Parity::None => "None",
            Parity::Odd => "Odd",
            Parity::Even => "Even",
            Parity::Mark => "Mark",
            Parity::Space => "Space",
        }
    }

    /// Single-letter code used in "8N1"-style summaries
    pub fn code(self) -> char {
        match self {
            Parity::None => 'N',
            Parity::Odd => 'O',
            Parity::Even => 'E',
            Parity::Mark => 'M',
            Parity::Space => 'S',
        }
    }

    /// Equivalent `serialport` setting; `None` for mark and space parity
    pub fn to_serialport(self) -> Option<serialport::Parity> {
        match self {
            Parity::None => Some(serialport::Parity::None),
            Parity::Odd => Some(serialport::Parity::Odd),
            Parity::Even => Some(serialport::Parity::Even),
            Parity::Mark | Parity::Space => None,
        }
    }
}

impl FromStr for Parity {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|p| {
                p.label().eq_ignore_ascii_case(wanted)
                    || (wanted.len() == 1 && wanted.eq_ignore_ascii_case(&p.code().to_string()))
            })
            .ok_or_else(|| ConfigError::invalid("parity", s))
    }
}

impl TryFrom<&str> for Parity {
    type Error = ConfigError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl fmt::Display for Parity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ============================================================================
// Flow control
// ============================================================================

/// Flow control, as a set of handshake mechanisms
///
/// The empty set means no flow control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowControl {
    /// Hardware handshake on the RTS/CTS lines
    pub rts_cts: bool,
    /// Software handshake with XON/XOFF characters
    pub xon_xoff: bool,
}

impl FlowControl {
    pub const NONE: FlowControl = FlowControl {
        rts_cts: false,
        xon_xoff: false,
    };
    pub const RTS_CTS: FlowControl = FlowControl {
        rts_cts: true,
        xon_xoff: false,
    };
    pub const XON_XOFF: FlowControl = FlowControl {
        rts_cts: false,
        xon_xoff: true,
    };

    /// The single-mechanism choices offered to the operator
    pub const CHOICES: [FlowControl; 3] = [
        FlowControl::NONE,
        FlowControl::RTS_CTS,
        FlowControl::XON_XOFF,
    ];

    /// True if no handshake is enabled
    pub fn is_none(self) -> bool {
        !self.rts_cts && !self.xon_xoff
    }

    /// True if every mechanism in `other` is enabled here
    pub fn contains(self, other: FlowControl) -> bool {
        (!other.rts_cts || self.rts_cts) && (!other.xon_xoff || self.xon_xoff)
    }

    /// Equivalent `serialport` setting; `None` when both mechanisms are set
    pub fn to_serialport(self) -> Option<serialport::FlowControl> {
        match (self.rts_cts, self.xon_xoff) {
            (false, false) => Some(serialport::FlowControl::None),
            (true, false) => Some(serialport::FlowControl::Hardware),
            (false, true) => Some(serialport::FlowControl::Software),
            (true, true) => None,
        }
    }
}

impl BitOr for FlowControl {
    type Output = FlowControl;

    fn bitor(self, rhs: FlowControl) -> FlowControl {
        FlowControl {
            rts_cts: self.rts_cts || rhs.rts_cts,
            xon_xoff: self.xon_xoff || rhs.xon_xoff,
        }
    }
}

impl FromStr for FlowControl {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut flow = FlowControl::NONE;
        for part in s.split(['+', '|', ',']) {
            let token: String = part
                .trim()
                .chars()
                .filter(|c| !matches!(c, '/' | '-' | '_' | ' '))
                .collect::<String>()
                .to_ascii_lowercase();
            flow = flow
                | match token.as_str() {
                    "none" | "off" => FlowControl::NONE,
                    "rtscts" | "hardware" | "hw" => FlowControl::RTS_CTS,
                    "xonxoff" | "software" | "sw" => FlowControl::XON_XOFF,
                    _ => return Err(ConfigError::invalid("flow control", s)),
                };
        }
        Ok(flow)
    }
}

impl TryFrom<&str> for FlowControl {
    type Error = ConfigError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl fmt::Display for FlowControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.rts_cts, self.xon_xoff) {
            (false, false) => f.write_str("None"),
            (true, false) => f.write_str("RTS/CTS"),
            (false, true) => f.write_str("XON/XOFF"),
            (true, true) => f.write_str("RTS/CTS+XON/XOFF"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_baud_rate_domain() {
        assert_eq!(BaudRate::try_from(115200u32).unwrap().get(), 115200);
        assert_eq!(BaudRate::default().get(), 9600);
        assert!(matches!(
            BaudRate::try_from(9601u32),
            Err(ConfigError::InvalidParameterValue { parameter: "baud rate", .. })
        ));
        assert!("fast".parse::<BaudRate>().is_err());
    }

    #[test]
    fn test_labels_parse_back() {
        for rate in BaudRate::ALL {
            assert_eq!(rate.to_string().parse::<BaudRate>().unwrap(), rate);
        }
        for bits in DataBits::ALL {
            assert_eq!(bits.to_string().parse::<DataBits>().unwrap(), bits);
        }
        for stop in StopBits::ALL {
            assert_eq!(stop.to_string().parse::<StopBits>().unwrap(), stop);
        }
        for parity in Parity::ALL {
            assert_eq!(parity.to_string().parse::<Parity>().unwrap(), parity);
        }
        for flow in FlowControl::CHOICES {
            assert_eq!(flow.to_string().parse::<FlowControl>().unwrap(), flow);
        }
    }

    #[test]
    fn test_data_bits_out_of_domain() {
        assert!(DataBits::try_from(4u8).is_err());
        assert!(DataBits::try_from(9u8).is_err());
        assert_eq!(DataBits::try_from(7u8).unwrap(), DataBits::Seven);
    }

    #[test]
    fn test_stop_bits_from_float() {
        assert_eq!(StopBits::try_from(1.5f32).unwrap(), StopBits::OnePointFive);
        assert!(StopBits::try_from(3.0f32).is_err());
        assert!(StopBits::OnePointFive.to_serialport().is_none());
    }

    #[test]
    fn test_parity_accepts_letter_codes() {
        assert_eq!("e".parse::<Parity>().unwrap(), Parity::Even);
        assert_eq!("MARK".parse::<Parity>().unwrap(), Parity::Mark);
        assert!("x".parse::<Parity>().is_err());
        assert!(Parity::Space.to_serialport().is_none());
    }

    #[test]
    fn test_flow_control_is_a_set() {
        let both: FlowControl = "RTS/CTS+XON/XOFF".parse().unwrap();
        assert!(both.contains(FlowControl::RTS_CTS));
        assert!(both.contains(FlowControl::XON_XOFF));
        assert_eq!(both, FlowControl::RTS_CTS | FlowControl::XON_XOFF);
        assert!(both.to_serialport().is_none());

        assert!(FlowControl::NONE.is_none());
        assert_eq!("hardware".parse::<FlowControl>().unwrap(), FlowControl::RTS_CTS);
        assert!("dtr".parse::<FlowControl>().is_err());
    }
}
