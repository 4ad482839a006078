//! In-memory transport for single-process operation and tests
//!
//! Uses unbounded tokio channels as the frame pipe. No serialization overhead
//! beyond the protocol's own framing; frames are passed directly.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use l7_ports::{Connector, Transport, TransportError};
use log::debug;
use parking_lot::Mutex;
use tokio::sync::{Notify, mpsc, oneshot};

/// One end of an in-memory frame pipe
pub struct MemoryTransport {
    tx: Option<mpsc::UnboundedSender<Vec<u8>>>,
    rx: mpsc::UnboundedReceiver<Vec<u8>>,
}

impl MemoryTransport {
    /// Create two connected ends
    pub fn pair() -> (Self, Self) {
        let (a_tx, a_rx) = mpsc::unbounded_channel();
        let (b_tx, b_rx) = mpsc::unbounded_channel();
        (
            Self {
                tx: Some(a_tx),
                rx: b_rx,
            },
            Self {
                tx: Some(b_tx),
                rx: a_rx,
            },
        )
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_none()
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn send(&mut self, frame: Vec<u8>) -> Result<(), TransportError> {
        let tx = self.tx.as_ref().ok_or(TransportError::Closed)?;
        tx.send(frame).map_err(|_| TransportError::Closed)
    }

    async fn recv(&mut self) -> Result<Vec<u8>, TransportError> {
        if self.tx.is_none() {
            return Err(TransportError::Closed);
        }
        // Frames sent before the peer closed are still delivered
        self.rx.recv().await.ok_or(TransportError::Closed)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.tx = None;
        self.rx.close();
        Ok(())
    }
}

#[derive(Default)]
struct NetworkInner {
    listeners: Mutex<HashMap<String, oneshot::Sender<MemoryTransport>>>,
    bound: Notify,
}

/// In-process "network" of named endpoints
///
/// Cloning shares the same endpoint table. `connect` waits until the endpoint
/// is bound, mirroring message-queue sockets that connect lazily; wrap it in
/// `tokio::time::timeout` if the responder may never show up.
#[derive(Clone, Default)]
pub struct MemoryNetwork {
    inner: Arc<NetworkInner>,
}

impl MemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a responder is currently waiting on the endpoint
    pub fn is_bound(&self, endpoint: &str) -> bool {
        self.inner.listeners.lock().contains_key(endpoint)
    }
}

#[async_trait]
impl Connector for MemoryNetwork {
    type Transport = MemoryTransport;

    async fn connect(&self, endpoint: &str) -> Result<MemoryTransport, TransportError> {
        loop {
            let notified = self.inner.bound.notified();
            tokio::pin!(notified);
            // Register interest before checking, so a bind in between is not missed
            notified.as_mut().enable();

            let listener = self.inner.listeners.lock().remove(endpoint);
            if let Some(listener) = listener {
                let (local, remote) = MemoryTransport::pair();
                listener.send(remote).map_err(|_| {
                    TransportError::ConnectionFailed(format!("{endpoint}: responder went away"))
                })?;
                debug!("Connected to memory endpoint {}", endpoint);
                return Ok(local);
            }

            notified.await;
        }
    }

    async fn bind_and_accept(&self, endpoint: &str) -> Result<MemoryTransport, TransportError> {
        if endpoint.is_empty() {
            return Err(TransportError::InvalidEndpoint("empty endpoint".to_string()));
        }

        let (tx, rx) = oneshot::channel();
        {
            let mut listeners = self.inner.listeners.lock();
            if listeners.contains_key(endpoint) {
                return Err(TransportError::Bind(format!("{endpoint} already bound")));
            }
            listeners.insert(endpoint.to_string(), tx);
        }
        self.inner.bound.notify_waiters();
        debug!("Memory endpoint {} bound, waiting for a peer", endpoint);

        rx.await.map_err(|_| TransportError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pair_delivers_in_order() {
        let (mut a, mut b) = MemoryTransport::pair();

        a.send(b"one".to_vec()).await.unwrap();
        a.send(b"two".to_vec()).await.unwrap();

        assert_eq!(b.recv().await.unwrap(), b"one");
        assert_eq!(b.recv().await.unwrap(), b"two");
    }

    #[tokio::test]
    async fn test_close_drains_then_reports_closed() {
        let (mut a, mut b) = MemoryTransport::pair();

        a.send(b"last".to_vec()).await.unwrap();
        a.close().await.unwrap();

        assert!(a.is_closed());
        assert_eq!(a.send(b"x".to_vec()).await, Err(TransportError::Closed));
        assert_eq!(b.recv().await.unwrap(), b"last");
        assert_eq!(b.recv().await, Err(TransportError::Closed));
    }

    #[tokio::test]
    async fn test_connect_waits_for_bind() {
        let network = MemoryNetwork::new();

        let connector = network.clone();
        let initiator = tokio::spawn(async move { connector.connect("ipc://a").await });

        tokio::task::yield_now().await;
        let mut responder = network.bind_and_accept("ipc://a").await.unwrap();
        let mut initiator = initiator.await.unwrap().unwrap();

        initiator.send(b"hello".to_vec()).await.unwrap();
        assert_eq!(responder.recv().await.unwrap(), b"hello");
        assert!(!network.is_bound("ipc://a"));
    }

    #[tokio::test]
    async fn test_double_bind_rejected() {
        let network = MemoryNetwork::new();

        let first = network.clone();
        let pending = tokio::spawn(async move { first.bind_and_accept("ipc://b").await });
        while !network.is_bound("ipc://b") {
            tokio::task::yield_now().await;
        }

        let second = network.bind_and_accept("ipc://b").await;
        assert!(matches!(second, Err(TransportError::Bind(_))));

        pending.abort();
    }
}
