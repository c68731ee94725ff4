//! Port session state machine
//!
//! A [`PortSession`] owns at most one open device handle. While connected, a
//! reader task delivers every chunk it reads as [`SessionEvent::BytesReceived`].
//! When a read fails or the stream ends, the reader releases the handle,
//! reports [`ConnectionChange::Disconnected`] and hands over to a scan task
//! that polls for the device to come back and reopens it.
//!
//! ```text
//!   Idle ──connect──▶ Connecting ──ok──▶ Connected ──read fails──▶ Disconnected
//!    ▲                    │                  ▲                           │
//!    └──────failed────────┘                  └────reopened─── Scanning ◀─┘
//!
//!   any state ──disconnect / drop──▶ Closed
//! ```
//!
//! All transitions happen under one mutex and are stamped with a generation
//! number. Reader and scan tasks carry the generation they were started
//! under, so a task that finishes after the session moved on (closed,
//! reconnected by hand) drops its result instead of emitting.

use std::fmt;
use std::io::{self, ErrorKind};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use sermon_config::PortConfiguration;
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::{oneshot, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::backend::PortBackend;
use crate::error::SessionError;
use crate::events::SessionEvent;
use crate::serial::SerialBackend;

/// Pause between attempts to find a lost device
pub const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_secs(1);

/// Time allowed for opening the device
pub const DEFAULT_OPEN_TIMEOUT: Duration = Duration::from_millis(1000);

/// Size of the buffer each read fills at most
pub const DEFAULT_READ_BUFFER_SIZE: usize = 4096;

/// Where a session is in its connection lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing open, nothing scheduled
    Idle,
    /// An explicit connect is opening the device
    Connecting,
    /// A device handle is open and being read
    Connected,
    /// The device was lost and automatic reconnect is off
    Disconnected,
    /// The device was lost; a background task is polling for it
    Scanning,
    /// The operator closed the session
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SessionState::Idle => "idle",
            SessionState::Connecting => "connecting",
            SessionState::Connected => "connected",
            SessionState::Disconnected => "disconnected",
            SessionState::Scanning => "scanning",
            SessionState::Closed => "closed",
        };
        f.write_str(label)
    }
}

/// Timing and buffering knobs for a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    pub scan_interval: Duration,
    pub open_timeout: Duration,
    pub read_buffer_size: usize,
    /// Start scanning after a connection loss
    pub auto_reconnect: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            scan_interval: DEFAULT_SCAN_INTERVAL,
            open_timeout: DEFAULT_OPEN_TIMEOUT,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            auto_reconnect: true,
        }
    }
}

struct Link<Io> {
    writer: Arc<AsyncMutex<WriteHalf<Io>>>,
    shutdown: oneshot::Sender<()>,
    reader: JoinHandle<()>,
}

struct Scan {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

struct Inner<Io> {
    config: PortConfiguration,
    state: SessionState,
    events: Option<UnboundedSender<SessionEvent>>,
    link: Option<Link<Io>>,
    scan: Option<Scan>,
    generation: u64,
    /// Stopped tasks that may still hold a piece of the device handle
    retired: Vec<JoinHandle<()>>,
}

impl<Io> Inner<Io> {
    fn emit(&self, event: SessionEvent) {
        if let Some(events) = &self.events {
            // A consumer that hung up just stops receiving
            let _ = events.send(event);
        }
    }

    /// Stop the reader and scan tasks and drop our side of the handle
    fn release(&mut self) {
        self.generation += 1;
        self.retired.retain(|task| !task.is_finished());
        if let Some(link) = self.link.take() {
            let _ = link.shutdown.send(());
            self.retired.push(link.reader);
        }
        if let Some(scan) = self.scan.take() {
            let _ = scan.shutdown.send(());
            self.retired.push(scan.task);
        }
    }
}

struct Core<B: PortBackend> {
    backend: B,
    options: SessionOptions,
    inner: Mutex<Inner<B::Io>>,
}

impl<B: PortBackend> Core<B> {
    fn lock(&self) -> MutexGuard<'_, Inner<B::Io>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn open(&self, name: &str, config: &PortConfiguration) -> Result<B::Io, SessionError> {
        if !self.backend.is_present(name) {
            return Err(SessionError::PortNotFound(name.to_string()));
        }
        self.backend.open(name, config, self.options.open_timeout)
    }

    /// Take ownership of a freshly opened handle and start reading it
    fn install_link(
        self: &Arc<Self>,
        inner: &mut Inner<B::Io>,
        name: &str,
        io: B::Io,
        reconnected: bool,
    ) {
        inner.generation += 1;
        let generation = inner.generation;
        let (reader, writer) = tokio::io::split(io);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        inner.scan = None;
        inner.state = SessionState::Connected;
        if reconnected {
            info!("Reconnected to {}", name);
        } else {
            info!("Connected to {} ({})", name, inner.config.line_summary());
        }
        inner.emit(SessionEvent::connected(reconnected));

        let task = tokio::spawn(read_loop(
            Arc::clone(self),
            generation,
            name.to_string(),
            reader,
            inner.events.clone(),
            shutdown_rx,
        ));
        inner.link = Some(Link {
            writer: Arc::new(AsyncMutex::new(writer)),
            shutdown: shutdown_tx,
            reader: task,
        });
    }

    fn connection_lost(self: &Arc<Self>, generation: u64, port: &str, cause: SessionError) {
        let mut inner = self.lock();
        if inner.generation != generation {
            debug!("Ignoring loss on {} from a superseded link", port);
            return;
        }

        warn!("Lost connection to {}: {}", port, cause);
        inner.link = None;
        inner.state = SessionState::Disconnected;
        inner.emit(SessionEvent::disconnected());

        if self.options.auto_reconnect {
            self.start_scan(&mut inner, port);
        }
    }

    fn start_scan(self: &Arc<Self>, inner: &mut Inner<B::Io>, port: &str) {
        inner.generation += 1;
        let generation = inner.generation;
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        inner.state = SessionState::Scanning;
        info!(
            "Waiting for {} to come back (checking every {:?})",
            port, self.options.scan_interval
        );
        let task = tokio::spawn(scan_loop(Arc::clone(self), generation, shutdown_rx));
        inner.scan = Some(Scan {
            shutdown: shutdown_tx,
            task,
        });
    }
}

/// Per-link read loop: runs until shutdown or until the device fails
async fn read_loop<B: PortBackend>(
    core: Arc<Core<B>>,
    generation: u64,
    port: String,
    mut reader: ReadHalf<B::Io>,
    events: Option<UnboundedSender<SessionEvent>>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let mut buffer = vec![0u8; core.options.read_buffer_size.max(1)];
    debug!("Starting read loop for {}", port);

    let cause = loop {
        tokio::select! {
            biased;

            _ = &mut shutdown => break None,

            result = reader.read(&mut buffer) => {
                match result {
                    Ok(0) => {
                        break Some(SessionError::IoReadError(io::Error::new(
                            ErrorKind::UnexpectedEof,
                            "device closed the stream",
                        )));
                    }
                    Ok(n) => {
                        trace!("Read {} bytes from {}: {:02X?}", n, port, &buffer[..n]);
                        if let Some(events) = &events {
                            let _ = events.send(SessionEvent::BytesReceived(buffer[..n].to_vec()));
                        }
                    }
                    Err(e) if is_transient(&e) => continue,
                    Err(e) => break Some(SessionError::IoReadError(e)),
                }
            }
        }
    };

    drop(reader);
    match cause {
        Some(cause) => core.connection_lost(generation, &port, cause),
        None => debug!("Read loop for {} shut down", port),
    }
}

fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        ErrorKind::Interrupted | ErrorKind::WouldBlock | ErrorKind::TimedOut
    )
}

/// Poll for the configured device until it reopens or the scan is cancelled
async fn scan_loop<B: PortBackend>(
    core: Arc<Core<B>>,
    generation: u64,
    mut shutdown: oneshot::Receiver<()>,
) {
    let interval = core.options.scan_interval;

    loop {
        let config = {
            let inner = core.lock();
            if inner.generation != generation {
                return;
            }
            inner.config.clone()
        };

        if let Some(name) = config.port_name() {
            match core.open(name, &config) {
                Ok(io) => {
                    let mut inner = core.lock();
                    if inner.generation != generation {
                        debug!("Discarding reopened {}; scan was cancelled", name);
                        return;
                    }
                    core.install_link(&mut inner, name, io, true);
                    return;
                }
                Err(SessionError::PortNotFound(_)) => trace!("{} not present yet", name),
                Err(e) => warn!("Reconnect attempt failed: {}", e),
            }
        }

        tokio::select! {
            biased;
            _ = &mut shutdown => return,
            _ = tokio::time::sleep(interval) => {}
        }
    }
}

/// A serial connection that survives the device being unplugged and replugged
///
/// Dropping the session closes it.
pub struct PortSession<B: PortBackend = SerialBackend> {
    core: Arc<Core<B>>,
}

impl PortSession<SerialBackend> {
    /// Session over the OS serial ports with default options
    pub fn new(config: PortConfiguration) -> Self {
        Self::with_backend(SerialBackend::new(), config, SessionOptions::default())
    }
}

impl<B: PortBackend> PortSession<B> {
    pub fn with_backend(backend: B, config: PortConfiguration, options: SessionOptions) -> Self {
        Self {
            core: Arc::new(Core {
                backend,
                options,
                inner: Mutex::new(Inner {
                    config,
                    state: SessionState::Idle,
                    events: None,
                    link: None,
                    scan: None,
                    generation: 0,
                    retired: Vec::new(),
                }),
            }),
        }
    }

    pub fn backend(&self) -> &B {
        &self.core.backend
    }

    pub fn options(&self) -> &SessionOptions {
        &self.core.options
    }

    pub fn state(&self) -> SessionState {
        self.core.lock().state
    }

    pub fn is_connected(&self) -> bool {
        self.state() == SessionState::Connected
    }

    /// Snapshot of the current configuration
    pub fn config(&self) -> PortConfiguration {
        self.core.lock().config.clone()
    }

    /// Replace the configuration; takes effect at the next connect or
    /// reconnect attempt, never on an open handle
    pub fn set_config(&self, config: PortConfiguration) {
        self.core.lock().config = config;
    }

    /// Open the configured port and start delivering events to `events`
    ///
    /// `events` replaces any previously registered consumer. Whatever the
    /// session was doing (connected, scanning, closed) is torn down first.
    /// With no port selected this returns `Ok(())` and the session stays
    /// idle. A failed connect leaves the session idle and never starts a
    /// scan.
    pub async fn connect(
        &self,
        events: UnboundedSender<SessionEvent>,
    ) -> Result<(), SessionError> {
        let (generation, config, retired) = {
            let mut inner = self.core.lock();
            inner.events = Some(events);
            inner.release();
            let retired = std::mem::take(&mut inner.retired);

            if inner.config.port_name().is_none() {
                info!("No port selected; staying idle");
                inner.state = SessionState::Idle;
                return Ok(());
            }
            inner.state = SessionState::Connecting;
            (inner.generation, inner.config.clone(), retired)
        };

        // The old link's reader half keeps the device open until its task exits
        for task in retired {
            let _ = task.await;
        }

        let Some(name) = config.port_name() else {
            return Ok(());
        };
        debug!("Connecting to {}", config);
        let result = self.core.open(name, &config);

        let mut inner = self.core.lock();
        if inner.generation != generation {
            debug!("Connect to {} superseded", name);
            return Err(SessionError::NotConnected);
        }
        match result {
            Ok(io) => {
                self.core.install_link(&mut inner, name, io, false);
                Ok(())
            }
            Err(e) => {
                warn!("Failed to connect to {}: {}", name, e);
                inner.state = SessionState::Idle;
                Err(e)
            }
        }
    }

    /// Write `data` to the device as one contiguous block
    pub async fn send(&self, data: &[u8]) -> Result<(), SessionError> {
        let writer = {
            let inner = self.core.lock();
            let link = inner.link.as_ref().ok_or(SessionError::NotConnected)?;
            Arc::clone(&link.writer)
        };

        let mut writer = writer.lock().await;
        writer
            .write_all(data)
            .await
            .map_err(SessionError::IoWriteError)?;
        writer.flush().await.map_err(SessionError::IoWriteError)?;
        trace!("Sent {} bytes", data.len());
        Ok(())
    }

    /// Close the session: release the device, stop scanning, emit nothing
    ///
    /// Idempotent. A later [`connect`](Self::connect) starts over.
    pub fn disconnect(&self) {
        let mut inner = self.core.lock();
        if inner.state == SessionState::Closed {
            return;
        }
        inner.release();
        inner.state = SessionState::Closed;
        if let Some(name) = inner.config.port_name() {
            info!("Closed session on {}", name);
        }
    }
}

impl<B: PortBackend> Drop for PortSession<B> {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl<B: PortBackend> fmt::Debug for PortSession<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.core.lock();
        f.debug_struct("PortSession")
            .field("config", &inner.config)
            .field("state", &inner.state)
            .finish()
    }
}
