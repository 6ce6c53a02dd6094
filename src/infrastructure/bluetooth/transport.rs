//! Transport boundary
//!
//! A transport owns the radio link. It reports what happens on the link as
//! [`TransportEvent`]s through an [`EventSink`] and accepts raw command
//! packets through [`Transport::write`]. It never decodes or encodes packets.

use thiserror::Error;
use tokio::sync::mpsc;

/// Things the link reports, in the order they happen
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Link layer connection established
    Connected { device_name: String },
    /// Control and notify characteristics found and notifications enabled
    ServicesReady,
    /// Raw value received on the notify characteristic
    Notification(Vec<u8>),
    /// A queued command could not be written; the link may still be up
    WriteFailed(String),
    /// Link closed by the peer or the radio
    Disconnected { reason: String },
    /// Connection attempt or link failed
    Failed(String),
}

/// A transport event stamped with the session it belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEvent {
    pub session_id: u64,
    pub event: TransportEvent,
}

/// Handle a transport uses to report events for one session
#[derive(Debug, Clone)]
pub struct EventSink {
    session_id: u64,
    sender: mpsc::UnboundedSender<SessionEvent>,
}

impl EventSink {
    pub fn new(session_id: u64, sender: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self { session_id, sender }
    }

    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    /// Returns `false` once the receiving service is gone
    pub fn send(&self, event: TransportEvent) -> bool {
        self.sender
            .send(SessionEvent {
                session_id: self.session_id,
                event,
            })
            .is_ok()
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport is not open")]
    NotOpen,
    #[error("no Bluetooth adapter found")]
    NoAdapter,
    #[error("transport worker stopped")]
    WorkerStopped,
    #[error("no tokio runtime to run the transport on")]
    NoRuntime,
    #[error("{0} support is not compiled in")]
    Unsupported(&'static str),
    #[error("invalid UUID: {0}")]
    InvalidUuid(String),
}

/// Link to the massage device
pub trait Transport: Send {
    /// Start connecting; progress is reported through `sink`
    fn open(&mut self, sink: EventSink) -> Result<(), TransportError>;

    /// Queue one command packet for the control characteristic
    fn write(&mut self, packet: &[u8]) -> Result<(), TransportError>;

    /// Tear the link down. Must be safe to call when not open.
    fn close(&mut self);
}
