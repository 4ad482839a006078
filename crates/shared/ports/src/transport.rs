use async_trait::async_trait;

use crate::error::TransportError;

/// A connected, full-duplex frame pipe between exactly two endpoints
///
/// Implementations must deliver frames reliably and in order. The protocol
/// layer performs no retransmission.
#[async_trait]
pub trait Transport: Send + 'static {
    /// Send one frame
    async fn send(&mut self, frame: Vec<u8>) -> Result<(), TransportError>;

    /// Wait for the next frame
    ///
    /// Must be cancel-safe: the connection task races it against other
    /// events, and dropping the future must not lose a frame.
    async fn recv(&mut self) -> Result<Vec<u8>, TransportError>;

    /// Release the connection. Later calls return [`TransportError::Closed`].
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Produces a [`Transport`] for either end of a channel
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Transport: Transport;

    /// Initiator side: connect to a bound endpoint
    async fn connect(&self, endpoint: &str) -> Result<Self::Transport, TransportError>;

    /// Responder side: bind the endpoint and accept exactly one peer
    async fn bind_and_accept(&self, endpoint: &str) -> Result<Self::Transport, TransportError>;
}
