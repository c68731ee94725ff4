//! Operator input parsing
//!
//! Input lines are sent to the device as they are. A line starting with `/`
//! is a command; `//` escapes a literal leading slash.

use sermon_config::{ConfigError, PortConfiguration};
use thiserror::Error;

pub const HELP: &str = "\
Commands:
  /disconnect           close the port (no automatic reconnect)
  /reconnect            open the configured port again
  /ports                list available ports and what changed since last time
  /config               show the port configuration
  /set <field> <value>  change port, baud, data, stop, parity or flow (applies on reconnect)
  /lf [on|off]          toggle sending LF after each line
  /cr [on|off]          toggle sending CR after each line
  /clear                clear the screen
  /help                 show this help
  /quit                 exit
Lines not starting with / are sent to the device; start a line with // to send a leading /.";

/// Errors from parsing or applying operator commands
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown command /{0} (try /help)")]
    Unknown(String),

    #[error("usage: {0}")]
    Usage(&'static str),

    #[error("unknown setting {0:?}; expected port, baud, data, stop, parity or flow")]
    UnknownSetting(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// A configurable field of the port configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Setting {
    Port,
    Baud,
    DataBits,
    StopBits,
    Parity,
    Flow,
}

impl Setting {
    fn parse(name: &str) -> Result<Self, CommandError> {
        match name.to_ascii_lowercase().as_str() {
            "port" => Ok(Setting::Port),
            "baud" | "baudrate" => Ok(Setting::Baud),
            "data" | "databits" => Ok(Setting::DataBits),
            "stop" | "stopbits" => Ok(Setting::StopBits),
            "parity" => Ok(Setting::Parity),
            "flow" | "flowcontrol" => Ok(Setting::Flow),
            _ => Err(CommandError::UnknownSetting(name.to_string())),
        }
    }

    /// Apply `value` to `config`; a rejected value leaves `config` as it was
    pub fn apply(self, config: &mut PortConfiguration, value: &str) -> Result<(), ConfigError> {
        match self {
            Setting::Port => {
                config.set_port_name(value);
                Ok(())
            }
            Setting::Baud => config.set_baud_rate(value),
            Setting::DataBits => config.set_data_bits(value),
            Setting::StopBits => config.set_stop_bits(value),
            Setting::Parity => config.set_parity(value),
            Setting::Flow => config.set_flow_control(value),
        }
    }
}

/// What the operator asked for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Send(String),
    Disconnect,
    Reconnect,
    Ports,
    Config,
    Set(Setting, String),
    /// `None` toggles
    Lf(Option<bool>),
    Cr(Option<bool>),
    Clear,
    Help,
    Quit,
}

/// Parse one input line; empty input yields `None` and is not sent
pub fn parse(line: &str) -> Result<Option<Command>, CommandError> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.is_empty() {
        return Ok(None);
    }
    if let Some(literal) = line.strip_prefix("//") {
        return Ok(Some(Command::Send(format!("/{literal}"))));
    }
    let Some(command) = line.strip_prefix('/') else {
        return Ok(Some(Command::Send(line.to_string())));
    };

    let mut words = command.split_whitespace();
    let name = words.next().unwrap_or_default().to_ascii_lowercase();
    let command = match name.as_str() {
        "disconnect" | "close" => Command::Disconnect,
        "reconnect" | "connect" | "open" => Command::Reconnect,
        "ports" => Command::Ports,
        "config" => Command::Config,
        "set" => {
            let (Some(field), Some(value)) = (words.next(), words.next()) else {
                return Err(CommandError::Usage("/set <field> <value>"));
            };
            let mut value = value.to_string();
            for word in words {
                value.push(' ');
                value.push_str(word);
            }
            Command::Set(Setting::parse(field)?, value)
        }
        "lf" => Command::Lf(parse_switch(words.next(), "/lf [on|off]")?),
        "cr" => Command::Cr(parse_switch(words.next(), "/cr [on|off]")?),
        "clear" | "cls" => Command::Clear,
        "help" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        other => return Err(CommandError::Unknown(other.to_string())),
    };
    Ok(Some(command))
}

fn parse_switch(word: Option<&str>, usage: &'static str) -> Result<Option<bool>, CommandError> {
    match word.map(str::to_ascii_lowercase).as_deref() {
        None => Ok(None),
        Some("on" | "1" | "true" | "yes") => Ok(Some(true)),
        Some("off" | "0" | "false" | "no") => Ok(Some(false)),
        Some(_) => Err(CommandError::Usage(usage)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sermon_config::{FlowControl, Parity};

    #[test]
    fn test_plain_lines_are_sent() {
        assert_eq!(parse("AT+GMR").unwrap(), Some(Command::Send("AT+GMR".into())));
        assert_eq!(parse("  spaced  ").unwrap(), Some(Command::Send("  spaced  ".into())));
        assert_eq!(parse("//etc").unwrap(), Some(Command::Send("/etc".into())));
        assert_eq!(parse("").unwrap(), None);
        assert_eq!(parse("\r\n").unwrap(), None);
    }

    #[test]
    fn test_commands() {
        assert_eq!(parse("/disconnect").unwrap(), Some(Command::Disconnect));
        assert_eq!(parse("/RECONNECT").unwrap(), Some(Command::Reconnect));
        assert_eq!(parse("/lf").unwrap(), Some(Command::Lf(None)));
        assert_eq!(parse("/cr off").unwrap(), Some(Command::Cr(Some(false))));
        assert_eq!(
            parse("/set flow rts/cts + xon/xoff").unwrap(),
            Some(Command::Set(Setting::Flow, "rts/cts + xon/xoff".into()))
        );
        assert_eq!(
            parse("/bogus").unwrap_err(),
            CommandError::Unknown("bogus".into())
        );
        assert!(matches!(parse("/set baud"), Err(CommandError::Usage(_))));
        assert!(matches!(parse("/lf maybe"), Err(CommandError::Usage(_))));
    }

    #[test]
    fn test_settings_apply_or_keep() {
        let mut config = PortConfiguration::new("COM3");
        Setting::Baud.apply(&mut config, "115200").unwrap();
        Setting::Parity.apply(&mut config, "E").unwrap();
        Setting::Flow.apply(&mut config, "rts/cts + xon/xoff").unwrap();
        Setting::Port.apply(&mut config, "COM4").unwrap();

        assert!(Setting::Baud.apply(&mut config, "110").is_err());
        assert!(Setting::StopBits.apply(&mut config, "3").is_err());

        assert_eq!(config.port_name(), Some("COM4"));
        assert_eq!(config.baud_rate().get(), 115200);
        assert_eq!(config.parity(), Parity::Even);
        assert_eq!(config.flow_control(), FlowControl::RTS_CTS | FlowControl::XON_XOFF);
    }
}
