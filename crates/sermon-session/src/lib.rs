//! Serial Port Session Library
//!
//! This crate manages the lifecycle of one serial connection: opening and
//! configuring the device, delivering received bytes, detecting that the
//! device vanished, and reopening it on its own once it reappears.
//!
//! Consumers receive [`SessionEvent`]s over an unbounded channel registered
//! at connect time.
//!
//! # Example
//!
//! ```rust,no_run
//! use sermon_config::PortConfiguration;
//! use sermon_session::{ConnectionChange, PortSession, SessionEvent};
//! use tokio::sync::mpsc;
//!
//! # async fn run() -> Result<(), sermon_session::SessionError> {
//! let session = PortSession::new(PortConfiguration::new("/dev/ttyUSB0"));
//! let (tx, mut rx) = mpsc::unbounded_channel();
//! session.connect(tx).await?;
//! session.send(b"AT\r\n").await?;
//!
//! while let Some(event) = rx.recv().await {
//!     match event {
//!         SessionEvent::BytesReceived(bytes) => print!("{}", String::from_utf8_lossy(&bytes)),
//!         SessionEvent::StateChanged(ConnectionChange::Disconnected) => eprintln!("lost"),
//!         SessionEvent::StateChanged(ConnectionChange::Connected { .. }) => eprintln!("up"),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod error;
pub mod events;
pub mod serial;
pub mod session;
pub mod virtual_port;

pub use backend::{DriverSettings, PortBackend};
pub use error::SessionError;
pub use events::{ConnectionChange, SessionEvent};
pub use serial::SerialBackend;
pub use session::{
    PortSession, SessionOptions, SessionState, DEFAULT_OPEN_TIMEOUT, DEFAULT_READ_BUFFER_SIZE,
    DEFAULT_SCAN_INTERVAL,
};
pub use virtual_port::{VirtualBus, VirtualDevice, VirtualStream};
