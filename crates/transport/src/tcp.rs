//! TCP transport with length-delimited framing
//!
//! ```text
//! +----------------------------+------------------+
//! | Length (4 bytes, BE)       | Frame            |
//! +----------------------------+------------------+
//! ```
//!
//! Endpoints are `host:port`, optionally prefixed with `tcp://`.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use l7_ports::{Connector, Transport, TransportError};
use log::{debug, info};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::{Framed, LengthDelimitedCodec};

use crate::config::TcpConfig;

const TCP_SCHEME: &str = "tcp://";

/// Strip the optional `tcp://` scheme from an endpoint
pub fn socket_address(endpoint: &str) -> Result<&str, TransportError> {
    let address = endpoint.strip_prefix(TCP_SCHEME).unwrap_or(endpoint);
    if address.is_empty() || address.contains("://") || !address.contains(':') {
        return Err(TransportError::InvalidEndpoint(endpoint.to_string()));
    }
    Ok(address)
}

/// A connected TCP frame pipe
#[derive(Debug)]
pub struct TcpTransport {
    framed: Framed<TcpStream, LengthDelimitedCodec>,
    max_frame_length: usize,
    closed: bool,
}

impl TcpTransport {
    fn new(stream: TcpStream, max_frame_length: usize) -> Self {
        // Small control frames must not wait for Nagle
        if let Err(e) = stream.set_nodelay(true) {
            debug!("could not disable Nagle on TCP stream: {}", e);
        }
        let codec = LengthDelimitedCodec::builder()
            .length_field_length(4)
            .big_endian()
            .max_frame_length(max_frame_length)
            .new_codec();

        Self {
            framed: Framed::new(stream, codec),
            max_frame_length,
            closed: false,
        }
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn send(&mut self, frame: Vec<u8>) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        if frame.len() > self.max_frame_length {
            return Err(TransportError::FrameTooLarge {
                len: frame.len(),
                max: self.max_frame_length,
            });
        }
        self.framed.send(Bytes::from(frame)).await?;
        Ok(())
    }

    async fn recv(&mut self) -> Result<Vec<u8>, TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        match self.framed.next().await {
            Some(Ok(frame)) => Ok(frame.to_vec()),
            Some(Err(e)) => Err(e.into()),
            None => Err(TransportError::Closed),
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        SinkExt::<Bytes>::close(&mut self.framed).await?;
        Ok(())
    }
}

/// Connector producing [`TcpTransport`]s
#[derive(Debug, Clone, Default)]
pub struct TcpConnector {
    config: TcpConfig,
}

impl TcpConnector {
    pub fn new(config: TcpConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TcpConfig {
        &self.config
    }
}

#[async_trait]
impl Connector for TcpConnector {
    type Transport = TcpTransport;

    async fn connect(&self, endpoint: &str) -> Result<TcpTransport, TransportError> {
        let address = socket_address(endpoint)?;
        let attempts = self.config.connect_attempts.max(1);
        let delay = Duration::from_millis(self.config.retry_delay_ms);

        let mut attempt = 1;
        loop {
            match TcpStream::connect(address).await {
                Ok(stream) => {
                    info!("Connected to {} (attempt {})", address, attempt);
                    return Ok(TcpTransport::new(stream, self.config.max_frame_length));
                }
                Err(e) if attempt < attempts => {
                    debug!("Connect to {} failed ({}), retrying", address, e);
                    attempt += 1;
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    return Err(TransportError::ConnectionFailed(format!("{address}: {e}")));
                }
            }
        }
    }

    async fn bind_and_accept(&self, endpoint: &str) -> Result<TcpTransport, TransportError> {
        let address = socket_address(endpoint)?;
        let listener = TcpListener::bind(address)
            .await
            .map_err(|e| TransportError::Bind(format!("{address}: {e}")))?;
        info!("Listening on {}", address);

        // Exactly one peer per channel; the listener is released after accept
        let (stream, peer) = listener.accept().await?;
        info!("Accepted peer {} on {}", peer, address);
        Ok(TcpTransport::new(stream, self.config.max_frame_length))
    }
}
