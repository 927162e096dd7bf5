use std::sync::Arc;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("channel closed")]
    Closed,
    #[error("outbound queue full")]
    QueueFull,
    #[error("send failed: {0}")]
    Other(String),
}

/// One message queued for a connected viewer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutboundMessage {
    /// Encoded JPEG frame.
    Binary(Arc<[u8]>),
    /// Alert or summary text.
    Text(Arc<str>),
}

/// A connected viewer the hub can push to.
///
/// Sends must not block the caller for long; transports queue internally
/// and report a full queue as an error.
pub trait OutputChannel: Send + Sync {
    fn send_binary(&self, payload: Arc<[u8]>) -> Result<(), TransportError>;
    fn send_text(&self, message: &str) -> Result<(), TransportError>;
}
