//! In-memory serial ports
//!
//! A [`VirtualBus`] is a [`PortBackend`] whose ports live in memory. Each open
//! is backed by a fresh `tokio::io::duplex` pipe; the session holds one end
//! and the port's [`VirtualDevice`] handle talks through the other. Devices
//! can be unplugged, replugged and marked busy, which makes the whole
//! loss-and-rescan lifecycle reproducible without hardware.

use std::collections::BTreeMap;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use std::time::Duration;

use sermon_config::PortConfiguration;
use tokio::io::{
    AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, DuplexStream, ReadBuf, ReadHalf,
    WriteHalf,
};
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::backend::{DriverSettings, PortBackend};
use crate::error::SessionError;

/// Capacity of each direction of a virtual link
const LINK_CAPACITY: usize = 64 * 1024;

/// How often the echo responder looks for a new link while unplugged
const ECHO_IDLE_POLL: Duration = Duration::from_millis(20);

/// Device side of an open virtual link
struct DeviceEnd {
    id: u64,
    reader: AsyncMutex<ReadHalf<DuplexStream>>,
    writer: AsyncMutex<WriteHalf<DuplexStream>>,
}

struct Slot {
    present: bool,
    busy: bool,
    link: Option<Arc<DeviceEnd>>,
    unplugged: Arc<AtomicBool>,
    opens: usize,
}

impl Slot {
    fn new() -> Self {
        Self {
            present: true,
            busy: false,
            link: None,
            unplugged: Arc::new(AtomicBool::new(false)),
            opens: 0,
        }
    }
}

#[derive(Default)]
struct Registry {
    slots: BTreeMap<String, Slot>,
    next_link: u64,
}

type SharedRegistry = Arc<Mutex<Registry>>;

fn lock(registry: &SharedRegistry) -> MutexGuard<'_, Registry> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A set of in-memory serial ports
#[derive(Clone, Default)]
pub struct VirtualBus {
    registry: SharedRegistry,
    probes: Arc<AtomicUsize>,
}

impl VirtualBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Plug in a new port called `name`, or get the handle of an existing one
    pub fn add_port(&self, name: impl Into<String>) -> VirtualDevice {
        let name = name.into();
        lock(&self.registry)
            .slots
            .entry(name.clone())
            .or_insert_with(Slot::new);
        VirtualDevice {
            name,
            registry: Arc::clone(&self.registry),
        }
    }

    /// Handle for an existing port
    pub fn device(&self, name: &str) -> Option<VirtualDevice> {
        lock(&self.registry).slots.contains_key(name).then(|| VirtualDevice {
            name: name.to_string(),
            registry: Arc::clone(&self.registry),
        })
    }

    /// Number of presence checks made so far, across all ports
    pub fn probe_count(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }
}

impl PortBackend for VirtualBus {
    type Io = VirtualStream;

    fn port_names(&self) -> Vec<String> {
        lock(&self.registry)
            .slots
            .iter()
            .filter(|(_, slot)| slot.present)
            .map(|(name, _)| name.clone())
            .collect()
    }

    fn is_present(&self, name: &str) -> bool {
        self.probes.fetch_add(1, Ordering::SeqCst);
        lock(&self.registry)
            .slots
            .get(name)
            .is_some_and(|slot| slot.present)
    }

    fn open(
        &self,
        name: &str,
        config: &PortConfiguration,
        _open_timeout: Duration,
    ) -> Result<VirtualStream, SessionError> {
        DriverSettings::resolve(name, config)?;

        let mut registry = lock(&self.registry);
        let link_id = registry.next_link;
        let slot = match registry.slots.get_mut(name) {
            Some(slot) if slot.present => slot,
            _ => return Err(SessionError::PortNotFound(name.to_string())),
        };
        if slot.busy || slot.link.is_some() {
            return Err(SessionError::PortBusy(name.to_string()));
        }

        let (host, device) = tokio::io::duplex(LINK_CAPACITY);
        let (reader, writer) = tokio::io::split(device);
        let unplugged = Arc::new(AtomicBool::new(false));
        slot.link = Some(Arc::new(DeviceEnd {
            id: link_id,
            reader: AsyncMutex::new(reader),
            writer: AsyncMutex::new(writer),
        }));
        slot.unplugged = Arc::clone(&unplugged);
        slot.opens += 1;
        registry.next_link += 1;

        debug!("Opened virtual port {} at {}", name, config.line_summary());
        Ok(VirtualStream {
            inner: host,
            unplugged,
            name: name.to_string(),
            link_id,
            registry: Arc::clone(&self.registry),
        })
    }
}

/// Test and demo handle for one virtual port
#[derive(Clone)]
pub struct VirtualDevice {
    name: String,
    registry: SharedRegistry,
}

impl VirtualDevice {
    pub fn name(&self) -> &str {
        &self.name
    }

    fn link(&self) -> Option<Arc<DeviceEnd>> {
        lock(&self.registry)
            .slots
            .get(&self.name)
            .and_then(|slot| slot.link.clone())
    }

    /// Whether a host currently has the port open
    pub fn is_open(&self) -> bool {
        self.link().is_some()
    }

    /// How many times the port has been opened
    pub fn open_count(&self) -> usize {
        lock(&self.registry)
            .slots
            .get(&self.name)
            .map_or(0, |slot| slot.opens)
    }

    /// Make further opens fail with `PortBusy`, as if another process held the port
    pub fn set_busy(&self, busy: bool) {
        if let Some(slot) = lock(&self.registry).slots.get_mut(&self.name) {
            slot.busy = busy;
        }
    }

    /// Write bytes toward the host
    pub async fn send(&self, data: &[u8]) -> io::Result<()> {
        let link = self.link().ok_or_else(not_open)?;
        let mut writer = link.writer.lock().await;
        writer.write_all(data).await?;
        writer.flush().await
    }

    /// Read exactly `len` bytes written by the host
    pub async fn receive(&self, len: usize) -> io::Result<Vec<u8>> {
        let link = self.link().ok_or_else(not_open)?;
        let mut reader = link.reader.lock().await;
        let mut buf = vec![0u8; len];
        reader.read_exact(&mut buf).await?;
        Ok(buf)
    }

    /// Pull the plug: the host's pending and future I/O on this link fails
    /// and the port disappears from enumeration
    pub async fn unplug(&self) {
        let link = {
            let mut registry = lock(&self.registry);
            let Some(slot) = registry.slots.get_mut(&self.name) else {
                return;
            };
            slot.present = false;
            slot.unplugged.store(true, Ordering::SeqCst);
            slot.link.take()
        };
        if let Some(link) = link {
            // Closing the device side wakes a host read parked on the pipe
            let _ = link.writer.lock().await.shutdown().await;
        }
        info!("Virtual port {} unplugged", self.name);
    }

    /// Plug the port back in so it can be found and opened again
    pub fn replug(&self) {
        if let Some(slot) = lock(&self.registry).slots.get_mut(&self.name) {
            slot.present = true;
        }
        info!("Virtual port {} plugged in", self.name);
    }

    /// Spawn a responder that writes back everything the host sends, across
    /// unplugs and reopens, until the returned task is aborted
    pub fn spawn_echo(&self) -> JoinHandle<()> {
        let device = self.clone();
        tokio::spawn(async move {
            let mut buf = [0u8; 1024];
            loop {
                let Some(link) = device.link() else {
                    tokio::time::sleep(ECHO_IDLE_POLL).await;
                    continue;
                };
                let n = {
                    let mut reader = link.reader.lock().await;
                    reader.read(&mut buf).await
                };
                match n {
                    Ok(n) if n > 0 => {
                        let mut writer = link.writer.lock().await;
                        if writer.write_all(&buf[..n]).await.is_err() {
                            continue;
                        }
                        let _ = writer.flush().await;
                    }
                    // Host closed or the port was unplugged; wait for the next link
                    _ => {
                        drop(link);
                        tokio::time::sleep(ECHO_IDLE_POLL).await;
                    }
                }
            }
        })
    }
}

fn not_open() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "virtual port is not open")
}

fn unplugged_error() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "device has been unplugged")
}

/// Host side of a virtual link
pub struct VirtualStream {
    inner: DuplexStream,
    unplugged: Arc<AtomicBool>,
    name: String,
    link_id: u64,
    registry: SharedRegistry,
}

impl VirtualStream {
    fn is_unplugged(&self) -> bool {
        self.unplugged.load(Ordering::SeqCst)
    }
}

impl AsyncRead for VirtualStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if self.is_unplugged() {
            return Poll::Ready(Err(unplugged_error()));
        }
        let before = buf.filled().len();
        match Pin::new(&mut self.inner).poll_read(cx, buf) {
            Poll::Ready(Ok(())) if buf.filled().len() == before && self.is_unplugged() => {
                Poll::Ready(Err(unplugged_error()))
            }
            other => other,
        }
    }
}

impl AsyncWrite for VirtualStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        if self.is_unplugged() {
            return Poll::Ready(Err(unplugged_error()));
        }
        Pin::new(&mut self.inner).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

impl Drop for VirtualStream {
    fn drop(&mut self) {
        let mut registry = lock(&self.registry);
        if let Some(slot) = registry.slots.get_mut(&self.name) {
            if slot.link.as_ref().is_some_and(|link| link.id == self.link_id) {
                slot.link = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(name: &str) -> PortConfiguration {
        PortConfiguration::new(name)
    }

    #[tokio::test]
    async fn test_bytes_flow_both_ways() {
        let bus = VirtualBus::new();
        let device = bus.add_port("vcom0");

        let mut host = bus.open("vcom0", &config("vcom0"), Duration::ZERO).unwrap();
        device.send(b"ping").await.unwrap();

        let mut buf = [0u8; 4];
        host.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");

        host.write_all(b"pong").await.unwrap();
        assert_eq!(device.receive(4).await.unwrap(), b"pong");
    }

    #[tokio::test]
    async fn test_open_rules() {
        let bus = VirtualBus::new();
        let device = bus.add_port("vcom0");

        assert!(matches!(
            bus.open("vcom9", &config("vcom9"), Duration::ZERO),
            Err(SessionError::PortNotFound(_))
        ));

        let host = bus.open("vcom0", &config("vcom0"), Duration::ZERO).unwrap();
        assert!(matches!(
            bus.open("vcom0", &config("vcom0"), Duration::ZERO),
            Err(SessionError::PortBusy(_))
        ));

        drop(host);
        assert!(!device.is_open());

        device.set_busy(true);
        assert!(matches!(
            bus.open("vcom0", &config("vcom0"), Duration::ZERO),
            Err(SessionError::PortBusy(_))
        ));
        device.set_busy(false);
        assert!(bus.open("vcom0", &config("vcom0"), Duration::ZERO).is_ok());
        assert_eq!(device.open_count(), 2);
    }

    #[tokio::test]
    async fn test_unplug_fails_pending_read() {
        let bus = VirtualBus::new();
        let device = bus.add_port("vcom0");
        let mut host = bus.open("vcom0", &config("vcom0"), Duration::ZERO).unwrap();

        let pending = tokio::spawn(async move {
            let mut buf = [0u8; 16];
            host.read(&mut buf).await
        });
        tokio::task::yield_now().await;

        device.unplug().await;
        let result = tokio::time::timeout(Duration::from_millis(200), pending)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result.unwrap_err().kind(), io::ErrorKind::BrokenPipe);
        assert!(bus.port_names().is_empty());
        assert!(!bus.is_present("vcom0"));

        device.replug();
        assert_eq!(bus.port_names(), vec!["vcom0".to_string()]);
        assert!(bus.open("vcom0", &config("vcom0"), Duration::ZERO).is_ok());
    }

    #[tokio::test]
    async fn test_echo_survives_reopen() {
        let bus = VirtualBus::new();
        let device = bus.add_port("loop");
        let echo = device.spawn_echo();

        for _ in 0..2 {
            let mut host = bus.open("loop", &config("loop"), Duration::ZERO).unwrap();
            host.write_all(b"abc").await.unwrap();
            let mut buf = [0u8; 3];
            tokio::time::timeout(Duration::from_millis(500), host.read_exact(&mut buf))
                .await
                .unwrap()
                .unwrap();
            assert_eq!(&buf, b"abc");
        }

        echo.abort();
    }
}
