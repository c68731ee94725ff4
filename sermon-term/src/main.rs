//! Sermon Serial Monitor
//!
//! A terminal serial monitor: shows what a device sends, sends what the
//! operator types, and keeps watching the port when the device is unplugged
//! so the session resumes by itself once it is plugged back in.

mod app;
mod cli;
mod commands;
mod decode;
mod framing;
mod monitor;
mod settings;

use std::io::{self, BufRead, IsTerminal};
use std::time::Duration;

use anyhow::Context;
use app::{App, Flow};
use clap::Parser;
use cli::CliArgs;
use monitor::Monitor;
use sermon_config::PortScanner;
use sermon_session::{PortBackend, PortSession, SerialBackend, SessionOptions, VirtualBus};
use settings::Settings;
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Name of the loopback port used by `--virtual`
const VIRTUAL_PORT_NAME: &str = "virtual0";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so they never interleave with device output on stdout
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "sermon_term=info,sermon_config=info,sermon_session=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let args = CliArgs::parse();

    if args.list {
        let ports = PortScanner::new().enumerate_ports()?;
        if ports.is_empty() {
            println!("No serial ports found");
        }
        for port in ports {
            println!("{}", port.describe());
        }
        return Ok(());
    }

    let mut settings = Settings::load();
    args.apply(&mut settings)
        .context("invalid port setting on the command line")?;
    let options = SessionOptions {
        scan_interval: Duration::from_millis(settings.scan_interval_ms),
        ..Default::default()
    };

    tracing::info!("Starting sermon");

    if args.virtual_port {
        let bus = VirtualBus::new();
        let echo = bus.add_port(VIRTUAL_PORT_NAME).spawn_echo();
        let mut demo = settings;
        demo.port.set_port_name(VIRTUAL_PORT_NAME);
        // The demo port name is not worth remembering
        run(bus, demo, options).await?;
        echo.abort();
        return Ok(());
    }

    let settings = run(SerialBackend::new(), settings, options).await?;
    if let Err(e) = settings.save() {
        tracing::warn!("{}", e);
    }
    Ok(())
}

/// Drive one monitoring session until the operator quits or input ends
async fn run<B: PortBackend>(
    backend: B,
    settings: Settings,
    options: SessionOptions,
) -> anyhow::Result<Settings> {
    let session = PortSession::with_backend(backend, settings.port.clone(), options);

    let stdout = io::stdout();
    let is_terminal = stdout.is_terminal();
    let monitor = Monitor::new(stdout, settings.port.port_name().map(str::to_string))
        .with_terminal_title(is_terminal);

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let mut input = spawn_input_reader();
    let mut app = App::new(session, monitor, settings, event_tx);
    app.connect().await?;

    loop {
        tokio::select! {
            Some(event) = event_rx.recv() => app.handle_event(&event)?,
            line = input.recv() => {
                match line {
                    Some(line) => {
                        // A send held off by flow control must not outlast Ctrl-C
                        let flow = tokio::select! {
                            flow = app.handle_line(&line) => flow?,
                            _ = tokio::signal::ctrl_c() => Flow::Quit,
                        };
                        if flow == Flow::Quit {
                            break;
                        }
                    }
                    None => break,
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    Ok(app.shutdown())
}

/// Read operator input on a dedicated thread
///
/// Blocking stdin reads would otherwise hold up runtime shutdown.
fn spawn_input_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}
