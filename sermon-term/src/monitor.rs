//! Terminal display adapter
//!
//! Renders session events for the operator: received bytes as text, state
//! changes as notification lines, and the connection status as the terminal
//! title. Input is only accepted while a device is connected.

use std::io::{self, Write};

use sermon_session::{ConnectionChange, SessionEvent};

use crate::decode::TextDecoder;

/// Notification and title texts
pub mod templates {
    pub fn connected(port: &str) -> String {
        format!("Connected to {port}")
    }

    pub fn reconnected(port: &str) -> String {
        format!("Reconnected to {port}")
    }

    pub fn connection_lost(port: &str) -> String {
        format!("Connection lost. Waiting for {port} to come back...")
    }

    pub fn disconnected(port: &str) -> String {
        format!("Disconnected from {port}")
    }

    pub fn title_connected(port: &str) -> String {
        format!("Connected to port: {port}")
    }

    pub const TITLE_NOT_CONNECTED: &str = "Not connected";
}

const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

pub struct Monitor<W: Write> {
    out: W,
    port: Option<String>,
    connected: bool,
    /// The device was lost and the session is waiting for it to return
    waiting: bool,
    decoder: TextDecoder,
    at_line_start: bool,
    /// Mirror the status into the terminal window title
    set_terminal_title: bool,
}

impl<W: Write> Monitor<W> {
    pub fn new(out: W, port: Option<String>) -> Self {
        Self {
            out,
            port,
            connected: false,
            waiting: false,
            decoder: TextDecoder::new(),
            at_line_start: true,
            set_terminal_title: false,
        }
    }

    pub fn with_terminal_title(mut self, enabled: bool) -> Self {
        self.set_terminal_title = enabled;
        self
    }

    /// Port named in notifications; follows the port being opened
    pub fn set_port(&mut self, port: Option<String>) {
        self.port = port;
    }

    pub fn input_enabled(&self) -> bool {
        self.connected
    }

    pub fn title(&self) -> String {
        match (&self.port, self.connected) {
            (Some(port), true) => templates::title_connected(port),
            _ => templates::TITLE_NOT_CONNECTED.to_string(),
        }
    }

    fn port_label(&self) -> &str {
        self.port.as_deref().unwrap_or("<no port>")
    }

    pub fn handle_event(&mut self, event: &SessionEvent) -> io::Result<()> {
        match event {
            SessionEvent::BytesReceived(bytes) => {
                let text = self.decoder.decode(bytes);
                self.write_text(&text)
            }
            SessionEvent::StateChanged(ConnectionChange::Connected { reconnected }) => {
                self.connected = true;
                self.waiting = false;
                let message = if *reconnected {
                    templates::reconnected(self.port_label())
                } else {
                    templates::connected(self.port_label())
                };
                self.notify(&message)?;
                self.update_title()
            }
            SessionEvent::StateChanged(ConnectionChange::Disconnected) => {
                self.connected = false;
                self.waiting = true;
                self.flush_partial()?;
                let message = templates::connection_lost(self.port_label());
                self.notify(&message)?;
                self.update_title()
            }
        }
    }

    /// The operator closed the port, or a reopen replaced it
    ///
    /// Announced when a device was open or being waited for.
    pub fn closed(&mut self) -> io::Result<()> {
        let was_active = self.connected || self.waiting;
        self.connected = false;
        self.waiting = false;
        self.flush_partial()?;
        if was_active {
            let message = templates::disconnected(self.port_label());
            self.notify(&message)?;
        }
        self.update_title()
    }

    /// Echo a line the operator sent
    pub fn sent(&mut self, line: &str) -> io::Result<()> {
        self.notify(&format!("> {line}"))
    }

    /// Print a line of front-end output (command results, errors)
    pub fn notify(&mut self, message: &str) -> io::Result<()> {
        if !self.at_line_start {
            writeln!(self.out)?;
        }
        writeln!(self.out, "{message}")?;
        self.at_line_start = true;
        self.out.flush()
    }

    pub fn clear(&mut self) -> io::Result<()> {
        write!(self.out, "{CLEAR_SCREEN}")?;
        self.at_line_start = true;
        self.out.flush()
    }

    fn write_text(&mut self, text: &str) -> io::Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        write!(self.out, "{text}")?;
        self.at_line_start = text.ends_with('\n');
        self.out.flush()
    }

    fn flush_partial(&mut self) -> io::Result<()> {
        match self.decoder.finish() {
            Some(text) => self.write_text(&text),
            None => Ok(()),
        }
    }

    fn update_title(&mut self) -> io::Result<()> {
        if self.set_terminal_title {
            let title = self.title();
            write!(self.out, "\x1b]0;{title}\x07")?;
            self.out.flush()?;
        }
        Ok(())
    }

    #[cfg(test)]
    pub fn output(&self) -> &W {
        &self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitor() -> Monitor<Vec<u8>> {
        Monitor::new(Vec::new(), Some("/dev/ttyUSB0".to_string()))
    }

    fn text(monitor: &Monitor<Vec<u8>>) -> String {
        String::from_utf8(monitor.output().clone()).unwrap()
    }

    #[test]
    fn test_connection_notifications() {
        let mut monitor = monitor();
        assert!(!monitor.input_enabled());
        assert_eq!(monitor.title(), "Not connected");

        monitor
            .handle_event(&SessionEvent::StateChanged(ConnectionChange::Connected {
                reconnected: false,
            }))
            .unwrap();
        assert!(monitor.input_enabled());
        assert_eq!(monitor.title(), "Connected to port: /dev/ttyUSB0");

        monitor
            .handle_event(&SessionEvent::StateChanged(ConnectionChange::Disconnected))
            .unwrap();
        assert!(!monitor.input_enabled());
        assert_eq!(monitor.title(), "Not connected");

        monitor
            .handle_event(&SessionEvent::StateChanged(ConnectionChange::Connected {
                reconnected: true,
            }))
            .unwrap();

        assert_eq!(
            text(&monitor),
            "Connected to /dev/ttyUSB0\n\
             Connection lost. Waiting for /dev/ttyUSB0 to come back...\n\
             Reconnected to /dev/ttyUSB0\n"
        );
    }

    #[test]
    fn test_received_text_and_notifications_do_not_share_a_line() {
        let mut monitor = monitor();
        monitor
            .handle_event(&SessionEvent::BytesReceived(b"temp=2".to_vec()))
            .unwrap();
        monitor
            .handle_event(&SessionEvent::BytesReceived(b"1\r\n> ".to_vec()))
            .unwrap();
        monitor.sent("read").unwrap();
        assert_eq!(text(&monitor), "temp=21\r\n> \n> read\n");
    }

    #[test]
    fn test_operator_close_only_announced_when_active() {
        let mut monitor = monitor();
        monitor.closed().unwrap();
        assert_eq!(text(&monitor), "");

        monitor
            .handle_event(&SessionEvent::StateChanged(ConnectionChange::Connected {
                reconnected: false,
            }))
            .unwrap();
        monitor.closed().unwrap();
        assert!(text(&monitor).ends_with("Disconnected from /dev/ttyUSB0\n"));
        assert!(!monitor.input_enabled());
    }

    #[test]
    fn test_terminal_title_sequence() {
        let mut monitor = monitor().with_terminal_title(true);
        monitor
            .handle_event(&SessionEvent::StateChanged(ConnectionChange::Connected {
                reconnected: false,
            }))
            .unwrap();
        assert!(text(&monitor).ends_with("\x1b]0;Connected to port: /dev/ttyUSB0\x07"));
    }

    #[test]
    fn test_operator_close_while_waiting_is_announced() {
        let mut monitor = monitor();
        monitor
            .handle_event(&SessionEvent::StateChanged(ConnectionChange::Connected {
                reconnected: false,
            }))
            .unwrap();
        monitor
            .handle_event(&SessionEvent::StateChanged(ConnectionChange::Disconnected))
            .unwrap();

        monitor.closed().unwrap();
        assert!(text(&monitor).ends_with("Disconnected from /dev/ttyUSB0\n"));

        // Closing again has nothing left to announce
        let before = text(&monitor);
        monitor.closed().unwrap();
        assert_eq!(text(&monitor), before);
    }
}
