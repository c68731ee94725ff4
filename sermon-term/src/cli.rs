//! Command-line arguments

use clap::Parser;
use sermon_config::ConfigError;

use crate::settings::Settings;

#[derive(Debug, Parser)]
#[command(bin_name = "sermon")]
#[command(about = "Serial monitor that keeps watching a port across unplug and replug")]
#[command(version)]
#[command(next_line_help = true)]
/// Values given here override the saved settings and are saved for next time.
pub struct CliArgs {
    #[arg(short, long, help = "Serial port to open, e.g. /dev/ttyUSB0 or COM3")]
    pub port: Option<String>,

    #[arg(short, long, help = "Baud rate, 300 to 115200")]
    pub baud: Option<u32>,

    #[arg(long, help = "Data bits: 5, 6, 7 or 8")]
    pub data_bits: Option<u8>,

    #[arg(long, help = "Stop bits: 1, 1.5 or 2")]
    pub stop_bits: Option<String>,

    #[arg(long, help = "Parity: none, odd, even, mark or space")]
    pub parity: Option<String>,

    #[arg(long, help = "Flow control: none, rts/cts, xon/xoff")]
    pub flow_control: Option<String>,

    #[arg(long, help = "Do not send LF after each line")]
    pub no_lf: bool,

    #[arg(long, help = "Do not send CR after each line")]
    pub no_cr: bool,

    #[arg(long, help = "How often to look for a lost device, in milliseconds")]
    pub scan_interval_ms: Option<u64>,

    #[arg(short, long, help = "List available serial ports and exit")]
    pub list: bool,

    #[arg(
        long = "virtual",
        help = "Monitor an in-memory loopback port instead of real hardware"
    )]
    pub virtual_port: bool,
}

impl CliArgs {
    /// Overlay the arguments onto `settings`; nothing changes if any value is invalid
    pub fn apply(&self, settings: &mut Settings) -> Result<(), ConfigError> {
        let mut port = settings.port.clone();
        if let Some(name) = &self.port {
            port.set_port_name(name.as_str());
        }
        if let Some(baud) = self.baud {
            port.set_baud_rate(baud)?;
        }
        if let Some(bits) = self.data_bits {
            port.set_data_bits(bits)?;
        }
        if let Some(stop) = &self.stop_bits {
            port.set_stop_bits(stop.as_str())?;
        }
        if let Some(parity) = &self.parity {
            port.set_parity(parity.as_str())?;
        }
        if let Some(flow) = &self.flow_control {
            port.set_flow_control(flow.as_str())?;
        }

        settings.port = port;
        if self.no_lf {
            settings.line_ending.lf = false;
        }
        if self.no_cr {
            settings.line_ending.cr = false;
        }
        if let Some(ms) = self.scan_interval_ms {
            settings.scan_interval_ms = ms.max(1);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sermon_config::{FlowControl, StopBits};

    #[test]
    fn test_arguments_override_settings() {
        let args = CliArgs::parse_from([
            "sermon",
            "--port",
            "/dev/ttyUSB1",
            "-b",
            "57600",
            "--stop-bits",
            "2",
            "--flow-control",
            "xon/xoff",
            "--no-cr",
        ]);
        let mut settings = Settings::default();
        args.apply(&mut settings).unwrap();

        assert_eq!(settings.port.port_name(), Some("/dev/ttyUSB1"));
        assert_eq!(settings.port.baud_rate().get(), 57600);
        assert_eq!(settings.port.stop_bits(), StopBits::Two);
        assert_eq!(settings.port.flow_control(), FlowControl::XON_XOFF);
        assert!(settings.line_ending.lf);
        assert!(!settings.line_ending.cr);
    }

    #[test]
    fn test_invalid_argument_changes_nothing() {
        let args = CliArgs::parse_from(["sermon", "--port", "COM9", "--baud", "31337"]);
        let mut settings = Settings::default();
        assert!(args.apply(&mut settings).is_err());
        assert_eq!(settings, Settings::default());
    }
}
