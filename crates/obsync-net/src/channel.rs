//! Grace-buffered peer channel.
//!
//! A freshly accepted client usually has a live socket before it has
//! finished registering its message handlers, and anything sent in that gap
//! is lost. A [`BufferedPeerChannel`] therefore starts out queueing every
//! outgoing message. After the grace delay it flushes the queue once, in
//! order, and from then on forwards messages straight to the transport.
//!
//! ```text
//!   Buffering(queue) --flush (timer or explicit)--> Flushed
//! ```
//!
//! The transition is one way. The outbox mutex only guards the
//! check-and-append and the check-and-swap; it is never held across transport
//! I/O. A separate async send gate keeps later messages behind the backlog:
//! the flush holds it exclusively from before the swap until the backlog is
//! out, while passthrough sends share it and so never wait on each other.

use crate::config::ChannelConfig;
use crate::error::{ChannelError, Result};
use crate::transport::{DeliveryMethod, PeerId, PeerTransport, TransportEvent};
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, trace, warn};

/// A message waiting for the grace period to end.
#[derive(Clone, Debug)]
struct Pending {
    data: Bytes,
    delivery: DeliveryMethod,
}

#[derive(Debug)]
enum Outbox {
    Buffering(VecDeque<Pending>),
    Flushed,
}

/// What happened to a message handed to [`BufferedPeerChannel::send`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SendOutcome {
    /// Held until the grace period ends.
    Queued,
    /// Handed to the transport.
    Sent,
}

/// Events emitted by a peer channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PeerEvent {
    /// The backlog was transmitted and the channel now passes messages through.
    Flushed { count: usize },
    /// The backlog was dropped because the channel had been disconnected.
    Discarded { count: usize },
    /// The channel was asked to disconnect.
    Disconnected { reason: String },
}

/// Outgoing side of a peer connection with a one-time buffering window.
pub struct BufferedPeerChannel<T: PeerTransport> {
    peer_id: PeerId,
    transport: Arc<T>,
    config: ChannelConfig,
    outbox: Mutex<Outbox>,
    send_gate: RwLock<()>,
    connected: AtomicBool,
    closed: AtomicBool,
    event_tx: broadcast::Sender<PeerEvent>,
}

impl<T: PeerTransport> BufferedPeerChannel<T> {
    /// Create a buffering channel without scheduling its flush.
    ///
    /// The channel stays in the buffering state until [`flush`](Self::flush)
    /// is called. Use [`spawn`](Self::spawn) to flush after the grace delay.
    /// The peer is considered connected, since channels are created for an
    /// accepted connection.
    pub fn new(peer_id: PeerId, transport: Arc<T>, config: ChannelConfig) -> Self {
        let (event_tx, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            peer_id,
            transport,
            config,
            outbox: Mutex::new(Outbox::Buffering(VecDeque::new())),
            send_gate: RwLock::new(()),
            connected: AtomicBool::new(true),
            closed: AtomicBool::new(false),
            event_tx,
        }
    }

    /// Create a channel and schedule its flush `grace_delay` from now on the
    /// current tokio runtime.
    ///
    /// The scheduled task only holds a weak reference, so dropping every
    /// handle to the channel cancels the flush.
    pub fn spawn(peer_id: PeerId, transport: Arc<T>, config: ChannelConfig) -> Result<Arc<Self>> {
        let handle = tokio::runtime::Handle::try_current().map_err(|_| ChannelError::NoRuntime)?;

        let channel = Arc::new(Self::new(peer_id, transport, config));
        let weak: Weak<Self> = Arc::downgrade(&channel);
        let delay = channel.config.grace_delay;

        handle.spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(channel) = weak.upgrade() else {
                return;
            };
            if let Err(err) = channel.flush().await {
                warn!(peer = %channel.peer_id, error = %err, "delayed flush failed");
            }
        });

        Ok(channel)
    }

    pub fn peer_id(&self) -> &PeerId {
        &self.peer_id
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    /// Subscribe to channel events.
    pub fn subscribe(&self) -> broadcast::Receiver<PeerEvent> {
        self.event_tx.subscribe()
    }

    pub fn is_buffering(&self) -> bool {
        matches!(*self.outbox.lock(), Outbox::Buffering(_))
    }

    /// Number of messages waiting for the flush.
    pub fn pending_len(&self) -> usize {
        match &*self.outbox.lock() {
            Outbox::Buffering(queue) => queue.len(),
            Outbox::Flushed => 0,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Track connection notifications from the underlying socket.
    ///
    /// The flag is informational; whether a send on a torn-down socket fails
    /// is up to the transport.
    pub fn handle_transport_event(&self, event: TransportEvent) {
        let connected = matches!(event, TransportEvent::Opened);
        debug!(peer = %self.peer_id, ?event, "transport event");
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Queue `message` while buffering, otherwise hand it to the transport.
    pub async fn send(
        &self,
        message: impl Into<Bytes>,
        delivery: DeliveryMethod,
    ) -> Result<SendOutcome> {
        let message = message.into();

        let passthrough = {
            let mut outbox = self.outbox.lock();
            match &mut *outbox {
                Outbox::Buffering(queue) => {
                    queue.push_back(Pending {
                        data: message,
                        delivery,
                    });
                    None
                }
                Outbox::Flushed => Some(message),
            }
        };

        let Some(data) = passthrough else {
            trace!(peer = %self.peer_id, "queued message during grace period");
            return Ok(SendOutcome::Queued);
        };

        let _gate = self.send_gate.read().await;
        self.transport.send(data, delivery).await?;
        Ok(SendOutcome::Sent)
    }

    /// End the grace period now and transmit the backlog in enqueue order.
    ///
    /// Returns the number of messages transmitted. Only the first call does
    /// anything; later calls return 0. After [`disconnect`](Self::disconnect)
    /// the backlog is discarded instead of sent and a
    /// [`PeerEvent::Discarded`] is emitted. Transmission stops at the first
    /// transport error and the rest of the backlog is lost.
    pub async fn flush(&self) -> Result<usize> {
        let _gate = self.send_gate.write().await;

        let backlog = {
            let mut outbox = self.outbox.lock();
            match std::mem::replace(&mut *outbox, Outbox::Flushed) {
                Outbox::Buffering(queue) => queue,
                Outbox::Flushed => return Ok(0),
            }
        };

        if self.closed.load(Ordering::SeqCst) {
            let count = backlog.len();
            if count > 0 {
                warn!(peer = %self.peer_id, count, "peer disconnected, dropping backlog");
                let _ = self.event_tx.send(PeerEvent::Discarded { count });
            }
            return Ok(0);
        }

        let count = backlog.len();
        debug!(peer = %self.peer_id, count, "flushing buffered messages");

        for pending in backlog {
            if let Err(err) = self.transport.send(pending.data, pending.delivery).await {
                warn!(peer = %self.peer_id, error = %err, "backlog flush interrupted");
                return Err(err.into());
            }
        }

        let _ = self.event_tx.send(PeerEvent::Flushed { count });
        Ok(count)
    }

    /// Close the connection. Anything still queued is never delivered.
    pub async fn disconnect(&self, reason: &str) -> Result<()> {
        info!(peer = %self.peer_id, reason, "disconnecting peer");
        self.closed.store(true, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
        let _ = self.event_tx.send(PeerEvent::Disconnected {
            reason: reason.to_string(),
        });
        self.transport.close().await?;
        Ok(())
    }
}

impl<T: PeerTransport> std::fmt::Debug for BufferedPeerChannel<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferedPeerChannel")
            .field("peer_id", &self.peer_id)
            .field("buffering", &self.is_buffering())
            .field("pending", &self.pending_len())
            .field("connected", &self.is_connected())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChannelConfigBuilder;
    use crate::error::TransportError;
    use crate::transport::MemoryTransport;
    use std::time::Duration;

    fn channel_with(
        transport: &Arc<MemoryTransport>,
        grace_ms: u64,
    ) -> Arc<BufferedPeerChannel<MemoryTransport>> {
        let config = ChannelConfigBuilder::new().grace_delay_ms(grace_ms).build();
        BufferedPeerChannel::spawn(PeerId::new("peer-1"), transport.clone(), config).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_grace_period_scenario() {
        let transport = Arc::new(MemoryTransport::new());
        let channel = channel_with(&transport, 200);

        assert_eq!(
            channel.send("a", DeliveryMethod::Reliable).await,
            Ok(SendOutcome::Queued)
        );
        assert_eq!(
            channel.send("b", DeliveryMethod::Reliable).await,
            Ok(SendOutcome::Queued)
        );
        assert!(transport.sent().is_empty());
        assert_eq!(channel.pending_len(), 2);

        tokio::time::sleep(Duration::from_millis(199)).await;
        assert!(transport.sent().is_empty());

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(
            transport.sent(),
            vec![Bytes::from_static(b"a"), Bytes::from_static(b"b")]
        );
        assert!(!channel.is_buffering());

        assert_eq!(
            channel.send("c", DeliveryMethod::Reliable).await,
            Ok(SendOutcome::Sent)
        );
        assert_eq!(transport.sent().len(), 3);
        assert_eq!(transport.sent()[2], Bytes::from_static(b"c"));
    }

    #[tokio::test]
    async fn test_explicit_flush_is_one_shot() {
        let transport = Arc::new(MemoryTransport::new());
        let channel = BufferedPeerChannel::new(
            PeerId::new("peer-2"),
            transport.clone(),
            ChannelConfig::default(),
        );
        let mut events = channel.subscribe();

        channel.send(vec![1u8], DeliveryMethod::Unreliable).await.unwrap();
        assert_eq!(channel.flush().await, Ok(1));
        assert_eq!(channel.flush().await, Ok(0));

        assert_eq!(
            transport.sent_with_delivery(),
            vec![(Bytes::from_static(&[1]), DeliveryMethod::Unreliable)]
        );
        assert_eq!(events.recv().await.unwrap(), PeerEvent::Flushed { count: 1 });
    }

    #[tokio::test]
    async fn test_disconnect_discards_backlog() {
        let transport = Arc::new(MemoryTransport::new());
        let channel = BufferedPeerChannel::new(
            PeerId::new("peer-3"),
            transport.clone(),
            ChannelConfig::default(),
        );
        let mut events = channel.subscribe();

        channel.send("late", DeliveryMethod::Reliable).await.unwrap();
        channel.disconnect("kicked").await.unwrap();

        assert!(!transport.is_connected());
        assert!(!channel.is_connected());
        assert_eq!(channel.flush().await, Ok(0));
        assert!(transport.sent().is_empty());
        assert_eq!(
            events.recv().await.unwrap(),
            PeerEvent::Disconnected {
                reason: "kicked".to_string()
            }
        );
        assert_eq!(events.recv().await.unwrap(), PeerEvent::Discarded { count: 1 });
    }

    #[tokio::test]
    async fn test_transport_error_event_does_not_drop_backlog() {
        let transport = Arc::new(MemoryTransport::new());
        let channel = BufferedPeerChannel::new(
            PeerId::new("peer-7"),
            transport.clone(),
            ChannelConfig::default(),
        );

        channel.send("hello", DeliveryMethod::Reliable).await.unwrap();
        channel.handle_transport_event(TransportEvent::Error("hiccup".into()));

        assert_eq!(channel.flush().await, Ok(1));
        assert_eq!(transport.sent(), vec![Bytes::from_static(b"hello")]);
    }

    /// Accepts a fixed number of messages, then fails every send.
    struct FailAfter {
        remaining: Mutex<usize>,
        inner: MemoryTransport,
    }

    #[async_trait::async_trait]
    impl PeerTransport for FailAfter {
        async fn send(
            &self,
            data: Bytes,
            delivery: DeliveryMethod,
        ) -> std::result::Result<(), TransportError> {
            {
                let mut remaining = self.remaining.lock();
                if *remaining == 0 {
                    return Err(TransportError::SendFailed("socket reset".into()));
                }
                *remaining -= 1;
            }
            self.inner.send(data, delivery).await
        }

        async fn close(&self) -> std::result::Result<(), TransportError> {
            self.inner.close().await
        }

        fn is_connected(&self) -> bool {
            self.inner.is_connected()
        }
    }

    #[tokio::test]
    async fn test_flush_stops_at_first_transport_error() {
        let transport = Arc::new(FailAfter {
            remaining: Mutex::new(1),
            inner: MemoryTransport::new(),
        });
        let channel = BufferedPeerChannel::new(
            PeerId::new("peer-8"),
            transport.clone(),
            ChannelConfig::default(),
        );
        let mut events = channel.subscribe();

        for message in ["one", "two", "three"] {
            channel.send(message, DeliveryMethod::Reliable).await.unwrap();
        }

        assert_eq!(
            channel.flush().await,
            Err(ChannelError::Transport(TransportError::SendFailed(
                "socket reset".into()
            )))
        );
        // the rest of the backlog is gone and the channel no longer buffers
        assert_eq!(transport.inner.sent(), vec![Bytes::from_static(b"one")]);
        assert!(!channel.is_buffering());
        assert_eq!(channel.pending_len(), 0);
        assert_eq!(channel.flush().await, Ok(0));
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_passthrough_after_close_reports_transport_error() {
        let transport = Arc::new(MemoryTransport::new());
        let channel = BufferedPeerChannel::new(
            PeerId::new("peer-4"),
            transport.clone(),
            ChannelConfig::default(),
        );
        channel.flush().await.unwrap();
        transport.close().await.unwrap();

        assert_eq!(
            channel.send("x", DeliveryMethod::Reliable).await,
            Err(ChannelError::Transport(TransportError::Closed))
        );
    }

    #[test]
    fn test_transport_events_track_connection() {
        let channel = BufferedPeerChannel::new(
            PeerId::new("peer-5"),
            Arc::new(MemoryTransport::new()),
            ChannelConfig::default(),
        );
        assert!(channel.is_connected());

        channel.handle_transport_event(TransportEvent::Error("reset".into()));
        assert!(!channel.is_connected());

        channel.handle_transport_event(TransportEvent::Opened);
        assert!(channel.is_connected());

        channel.handle_transport_event(TransportEvent::Closed);
        assert!(!channel.is_connected());
    }

    #[test]
    fn test_spawn_requires_runtime() {
        let result = BufferedPeerChannel::spawn(
            PeerId::new("peer-6"),
            Arc::new(MemoryTransport::new()),
            ChannelConfig::default(),
        );
        assert!(matches!(result, Err(ChannelError::NoRuntime)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_channel_is_not_kept_alive() {
        let transport = Arc::new(MemoryTransport::new());
        let channel = channel_with(&transport, 50);
        channel.send("never", DeliveryMethod::Reliable).await.unwrap();
        drop(channel);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(transport.sent().is_empty());
    }
}
