//! Session event stream
//!
//! A session reports to exactly one consumer through an unbounded channel
//! supplied at connect time. State changes are delivered in transition order
//! and byte chunks in read order; the two kinds are not ordered relative to
//! each other beyond "connected before the first chunk of that connection".

/// Connection transitions reported to the consumer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionChange {
    /// A device handle is open; `reconnected` is true when the background
    /// scan reopened it after a loss
    Connected { reconnected: bool },
    /// The device went away; the session has released the handle
    Disconnected,
}

/// Unified event enum for session activity
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The connection state changed
    StateChanged(ConnectionChange),
    /// Bytes read from the device, exactly as one read returned them
    BytesReceived(Vec<u8>),
}

impl SessionEvent {
    pub(crate) fn connected(reconnected: bool) -> Self {
        Self::StateChanged(ConnectionChange::Connected { reconnected })
    }

    pub(crate) fn disconnected() -> Self {
        Self::StateChanged(ConnectionChange::Disconnected)
    }
}
