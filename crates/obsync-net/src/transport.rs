//! Peer transport abstraction.

use crate::error::TransportError;
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;

/// Unique identifier for a peer.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId(pub String);

impl PeerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reliability qualifier attached to every outgoing message.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum DeliveryMethod {
    #[default]
    Reliable,
    ReliableSequenced,
    Unreliable,
}

/// Connection notifications raised by the underlying socket.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportEvent {
    Opened,
    Closed,
    Error(String),
}

/// A bidirectional byte-message connection to one peer.
#[async_trait]
pub trait PeerTransport: Send + Sync + 'static {
    /// Transmit one message.
    async fn send(&self, data: Bytes, delivery: DeliveryMethod) -> Result<(), TransportError>;

    /// Request the connection to close.
    async fn close(&self) -> Result<(), TransportError>;

    fn is_connected(&self) -> bool;
}

/// A message as it reached the transport.
pub type Transmitted = (Bytes, DeliveryMethod);

/// In-memory transport for testing and simulation.
///
/// Every transmitted message is recorded and also forwarded to a receiver
/// that plays the part of the remote end.
pub struct MemoryTransport {
    connected: AtomicBool,
    sent: Mutex<Vec<Transmitted>>,
    remote_tx: mpsc::UnboundedSender<Transmitted>,
    remote_rx: Mutex<Option<mpsc::UnboundedReceiver<Transmitted>>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            connected: AtomicBool::new(true),
            sent: Mutex::new(Vec::new()),
            remote_tx: tx,
            remote_rx: Mutex::new(Some(rx)),
        }
    }

    /// Payloads transmitted so far, in order.
    pub fn sent(&self) -> Vec<Bytes> {
        self.sent.lock().iter().map(|(data, _)| data.clone()).collect()
    }

    pub fn sent_with_delivery(&self) -> Vec<Transmitted> {
        self.sent.lock().clone()
    }

    /// Take the remote end. Only the first call returns a receiver.
    pub fn take_receiver(&self) -> Option<mpsc::UnboundedReceiver<Transmitted>> {
        self.remote_rx.lock().take()
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PeerTransport for MemoryTransport {
    async fn send(&self, data: Bytes, delivery: DeliveryMethod) -> Result<(), TransportError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }

        self.sent.lock().push((data.clone(), delivery));
        // remote end may have been dropped; the record above still counts
        let _ = self.remote_tx.send((data, delivery));
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}
