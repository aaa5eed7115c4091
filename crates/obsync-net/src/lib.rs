//! obsync net - peer transports and grace-buffered channels
//!
//! - [`transport`]: the [`PeerTransport`] trait a socket implementation
//!   provides, plus [`MemoryTransport`] for tests and simulation
//! - [`channel`]: [`BufferedPeerChannel`], which holds outgoing messages
//!   for a short grace period after a connection is accepted, flushes them
//!   once, and then passes messages straight through
//! - [`config`]: channel configuration and its builder
//! - [`error`]: error types
//!
//! # Example
//!
//! ```rust
//! use obsync_net::{
//!     BufferedPeerChannel, ChannelConfig, DeliveryMethod, MemoryTransport, PeerId, SendOutcome,
//! };
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let transport = Arc::new(MemoryTransport::new());
//! let config = ChannelConfig::default();
//! let channel = BufferedPeerChannel::spawn(PeerId::new("p1"), transport.clone(), config).unwrap();
//!
//! // held back until the grace delay has passed
//! assert_eq!(channel.send("welcome", DeliveryMethod::Reliable).await, Ok(SendOutcome::Queued));
//! assert!(transport.sent().is_empty());
//!
//! channel.flush().await.unwrap();
//! assert_eq!(transport.sent().len(), 1);
//! # }
//! ```

pub mod channel;
pub mod config;
pub mod error;
pub mod transport;

pub use channel::{BufferedPeerChannel, PeerEvent, SendOutcome};
pub use config::{ChannelConfig, ChannelConfigBuilder, DEFAULT_GRACE_DELAY};
pub use error::{ChannelError, Result, TransportError};
pub use transport::{
    DeliveryMethod, MemoryTransport, PeerId, PeerTransport, Transmitted, TransportEvent,
};
