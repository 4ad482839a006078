//! Message-level wrapper around a transport

use std::sync::Arc;

use l7_core::{Content, MessageId, MessageKind, ProtocolMessage};
use l7_ports::{ChannelObserver, Transport};
use log::debug;

use crate::error::ChannelResult;

pub(crate) struct Wire<T: Transport> {
    transport: T,
    observer: Arc<dyn ChannelObserver>,
}

impl<T: Transport> Wire<T> {
    pub(crate) fn new(transport: T, observer: Arc<dyn ChannelObserver>) -> Self {
        Self {
            transport,
            observer,
        }
    }

    pub(crate) async fn send(&mut self, message: &ProtocolMessage) -> ChannelResult<()> {
        self.transport.send(message.to_bytes()).await?;
        self.observer.frame_sent(message);
        Ok(())
    }

    /// Next decoded frame; a malformed frame is a bad peer
    ///
    /// Cancel-safe: decoding happens after the only await point.
    pub(crate) async fn recv(&mut self) -> ChannelResult<ProtocolMessage> {
        let frame = self.transport.recv().await?;
        Ok(ProtocolMessage::from_bytes(&frame)?)
    }

    /// Best-effort ERROR frame. Failures go to the observer only.
    pub(crate) async fn notify_peer(&mut self, id: MessageId, report: Content) {
        let message = ProtocolMessage::new(id, MessageKind::Error, Some(report));
        match self.transport.send(message.to_bytes()).await {
            Ok(()) => self.observer.frame_sent(&message),
            Err(e) => self.observer.notify_failed(&e),
        }
    }

    #[cfg(test)]
    pub(crate) fn transport(&self) -> &T {
        &self.transport
    }

    pub(crate) async fn close(&mut self) {
        if let Err(e) = self.transport.close().await {
            debug!("transport close failed: {}", e);
        }
    }
}
