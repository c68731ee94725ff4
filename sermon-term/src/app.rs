//! Session host: ties the port session, the display and operator input together

use std::io::{self, Write};
use std::time::Duration;

use sermon_config::PortListChange;
use sermon_session::{PortBackend, PortSession, SessionEvent, SessionState};
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

use crate::commands::{self, Command, CommandError, Setting, HELP};
use crate::framing::frame;
use crate::monitor::Monitor;
use crate::settings::Settings;

/// How long a line may take to reach the device before the send is abandoned
///
/// A peer holding off flow control would otherwise stall the input loop.
const SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Whether the input loop should keep going
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub struct App<B: PortBackend, W: Write> {
    session: PortSession<B>,
    monitor: Monitor<W>,
    settings: Settings,
    events: UnboundedSender<SessionEvent>,
    /// Port names at the last listing, to show what changed since
    known_ports: Option<Vec<String>>,
    send_timeout: Duration,
}

impl<B: PortBackend, W: Write> App<B, W> {
    pub fn new(
        session: PortSession<B>,
        monitor: Monitor<W>,
        settings: Settings,
        events: UnboundedSender<SessionEvent>,
    ) -> Self {
        Self {
            session,
            monitor,
            settings,
            events,
            known_ports: None,
            send_timeout: SEND_TIMEOUT,
        }
    }

    /// Open the configured port, replacing any open one
    ///
    /// Failures are reported to the operator.
    pub async fn connect(&mut self) -> io::Result<()> {
        // Reopening releases the current device before anything else
        self.monitor.closed()?;

        let config = self.settings.port.clone();
        self.monitor.set_port(config.port_name().map(str::to_string));
        self.session.set_config(config);

        match self.session.connect(self.events.clone()).await {
            Ok(()) if self.session.state() == SessionState::Idle => self.monitor.notify(
                "No port selected. Use /ports to list ports and /set port <name> to pick one.",
            ),
            Ok(()) => Ok(()),
            Err(e) => self.monitor.notify(&format!("Could not connect: {e}")),
        }
    }

    pub fn handle_event(&mut self, event: &SessionEvent) -> io::Result<()> {
        self.monitor.handle_event(event)
    }

    /// Act on one line of operator input
    pub async fn handle_line(&mut self, line: &str) -> io::Result<Flow> {
        let command = match commands::parse(line) {
            Ok(Some(command)) => command,
            Ok(None) => return Ok(Flow::Continue),
            Err(e) => {
                self.monitor.notify(&e.to_string())?;
                return Ok(Flow::Continue);
            }
        };
        debug!("Operator command: {:?}", command);

        match command {
            Command::Send(text) => self.send(&text).await?,
            Command::Disconnect => {
                self.session.disconnect();
                self.monitor.closed()?;
            }
            Command::Reconnect => self.connect().await?,
            Command::Ports => self.list_ports()?,
            Command::Config => self.show_config()?,
            Command::Set(setting, value) => self.apply_setting(setting, &value)?,
            Command::Lf(on) => {
                let ending = &mut self.settings.line_ending;
                ending.lf = on.unwrap_or(!ending.lf);
                let message = format!("Line ending: {}", self.settings.line_ending);
                self.monitor.notify(&message)?;
            }
            Command::Cr(on) => {
                let ending = &mut self.settings.line_ending;
                ending.cr = on.unwrap_or(!ending.cr);
                let message = format!("Line ending: {}", self.settings.line_ending);
                self.monitor.notify(&message)?;
            }
            Command::Clear => self.monitor.clear()?,
            Command::Help => self.monitor.notify(HELP)?,
            Command::Quit => return Ok(Flow::Quit),
        }
        Ok(Flow::Continue)
    }

    async fn send(&mut self, text: &str) -> io::Result<()> {
        if !self.monitor.input_enabled() {
            return self
                .monitor
                .notify("Not connected; input is disabled until the port is open.");
        }

        let ending = self.settings.line_ending;
        let bytes = frame(text, ending);
        let sent = tokio::time::timeout(self.send_timeout, self.session.send(&bytes)).await;
        match sent {
            Ok(Ok(())) => {
                let line = &bytes[..bytes.len() - ending.suffix().len()];
                self.monitor.sent(&String::from_utf8_lossy(line))
            }
            Ok(Err(e)) => self.monitor.notify(&format!("Send failed: {e}")),
            Err(_) => self.monitor.notify(&format!(
                "Send timed out after {:?}; the device is not accepting data (check flow control)",
                self.send_timeout
            )),
        }
    }

    fn apply_setting(&mut self, setting: Setting, value: &str) -> io::Result<()> {
        let mut config = self.settings.port.clone();
        if let Err(e) = setting.apply(&mut config, value).map_err(CommandError::from) {
            return self.monitor.notify(&e.to_string());
        }

        self.settings.port = config.clone();
        self.session.set_config(config);
        if setting == Setting::Port {
            self.list_ports()?;
        }
        let message = format!(
            "Configuration: {} (applies on /reconnect)",
            self.settings.port
        );
        self.monitor.notify(&message)
    }

    fn list_ports(&mut self) -> io::Result<()> {
        let ports = self.session.backend().port_names();

        if let Some(previous) = &self.known_ports {
            let change = PortListChange::between(previous, &ports);
            for port in &change.added {
                self.monitor.notify(&format!("  + {port} (new)"))?;
            }
            for port in &change.removed {
                self.monitor.notify(&format!("  - {port} (gone)"))?;
            }
        }

        if ports.is_empty() {
            self.monitor.notify("No serial ports found")?;
        } else {
            let selected = self.settings.port.port_name();
            self.monitor.notify("Available ports:")?;
            for port in &ports {
                let marker = if Some(port.as_str()) == selected { "*" } else { " " };
                self.monitor.notify(&format!(" {marker} {port}"))?;
            }
        }
        self.known_ports = Some(ports);
        Ok(())
    }

    fn show_config(&mut self) -> io::Result<()> {
        let message = format!(
            "{}\nLine ending: {}\nState: {}",
            self.settings.port,
            self.settings.line_ending,
            self.session.state()
        );
        self.monitor.notify(&message)?;
        if let Some(path) = Settings::settings_path() {
            self.monitor.notify(&format!("Settings: {}", path.display()))?;
        }
        Ok(())
    }

    /// Close the session and hand back the settings to persist
    pub fn shutdown(self) -> Settings {
        self.session.disconnect();
        self.settings
    }

    #[cfg(test)]
    pub fn monitor(&self) -> &Monitor<W> {
        &self.monitor
    }

    #[cfg(test)]
    pub fn session(&self) -> &PortSession<B> {
        &self.session
    }
}
