//! Session identity and ordering enforcement
//!
//! The counters run per direction. Both start at the object id of the
//! handshake ACK, so the first frame after the handshake carries object id
//! `ack + 1` in either direction.

use l7_core::{MessageId, ProtocolMessage};

use crate::error::BadPeerError;

/// Identity and ordering state of an established session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    id: u64,
    peer_id: u64,
    last_sent: u64,
    last_received: u64,
}

impl Session {
    pub(crate) fn established(id: u64, peer_id: u64, ack_object: u64) -> Self {
        Self {
            id,
            peer_id,
            last_sent: ack_object,
            last_received: ack_object,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn peer_id(&self) -> u64 {
        self.peer_id
    }

    /// Object id of the last frame sent
    pub fn last_sent(&self) -> u64 {
        self.last_sent
    }

    /// Object id of the last frame accepted from the peer
    pub fn last_received(&self) -> u64 {
        self.last_received
    }

    /// Id for the next outgoing frame
    pub(crate) fn next_id(&mut self) -> MessageId {
        self.last_sent = self.last_sent.wrapping_add(1);
        MessageId::new(self.id, self.last_sent)
    }

    /// Check session and sequence of an incoming frame without consuming it
    pub(crate) fn check(&self, message: &ProtocolMessage) -> Result<(), BadPeerError> {
        if message.id.session != self.id {
            return Err(BadPeerError::UnknownSession {
                expected: self.id,
                message: message.clone(),
            });
        }

        let expected = self.last_received.wrapping_add(1);
        if message.id.object != expected {
            return Err(BadPeerError::OutOfOrder {
                expected,
                message: message.clone(),
            });
        }
        Ok(())
    }

    /// Accept an incoming frame, advancing the receive counter
    pub(crate) fn accept(&mut self, message: &ProtocolMessage) -> Result<(), BadPeerError> {
        self.check(message)?;
        self.last_received = message.id.object;
        Ok(())
    }
}
