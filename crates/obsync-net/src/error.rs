//! Error types for transports and peer channels.

use thiserror::Error;

/// Errors reported by a [`PeerTransport`](crate::transport::PeerTransport).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport closed")]
    Closed,

    #[error("send failed: {0}")]
    SendFailed(String),
}

/// Errors reported by a [`BufferedPeerChannel`](crate::channel::BufferedPeerChannel).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("no tokio runtime available to schedule the grace-period flush")]
    NoRuntime,
}

pub type Result<T> = std::result::Result<T, ChannelError>;
