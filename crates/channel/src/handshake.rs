//! Session establishment
//!
//! ```text
//! INITIATOR                                  RESPONDER
//!    | SESSION_JOIN (0,0) {id: (0, self_id)}     |
//!    |------------------------------------------>|  mint session S
//!    |   ACKNOWLEDGE (S,1) {id: (S, self_id)}    |
//!    |<------------------------------------------|
//! ```
//!
//! The initiator adopts the session and object id of the ACK, whatever
//! they are; both counters continue from that object id. Anything else in
//! place of either frame is answered with an ERROR and fails the setup.
//! An ERROR in place of the ACK is the responder's refusal.

use l7_core::{IdError, MessageId, MessageKind, ProtocolMessage, content};
use l7_ports::Transport;
use log::info;

use crate::error::{BadPeerError, ChannelError, ChannelResult};
use crate::session::Session;
use crate::wire::Wire;

/// Object id of the handshake ACK; both direction counters start here
pub(crate) const ACK_OBJECT: u64 = 1;

/// Send JOIN, wait for the ACK, adopt the responder's session
pub(crate) async fn initiate<T: Transport>(
    wire: &mut Wire<T>,
    self_id: u64,
) -> ChannelResult<Session> {
    let join = ProtocolMessage::new(
        MessageId::HANDSHAKE,
        MessageKind::SessionJoin,
        Some(content([("id", MessageId::new(0, self_id).to_hex())])),
    );
    wire.send(&join).await?;

    let reply = receive(wire, MessageId::HANDSHAKE.next()).await?;
    let error_id = reply.id.next();
    match reply.kind {
        MessageKind::Acknowledge => {}
        MessageKind::Error => return Err(BadPeerError::Reported { message: reply }.into()),
        _ => {
            let err = BadPeerError::unexpected_kind(MessageKind::Acknowledge, reply);
            return Err(reject(wire, error_id, err).await);
        }
    }

    // the responder's session and object ids are adopted as they come
    let peer = match peer_identity(&reply) {
        Some(peer) if peer.session == reply.id.session => peer,
        _ => {
            let err = BadPeerError::misbehaved("ACKNOWLEDGE without a valid peer id", reply);
            return Err(reject(wire, error_id, err).await);
        }
    };

    info!(
        "Joined session {:016x} with peer {:016x}",
        reply.id.session, peer.object
    );
    Ok(Session::established(
        reply.id.session,
        peer.object,
        reply.id.object,
    ))
}

/// Wait for JOIN, mint a session, ACK it
pub(crate) async fn respond<T, F>(
    wire: &mut Wire<T>,
    self_id: u64,
    mint_session: F,
) -> ChannelResult<Session>
where
    T: Transport,
    F: FnOnce() -> Result<u64, IdError>,
{
    let join = receive(wire, MessageId::new(0, 1)).await?;
    let error_id = join.id.next();

    if join.kind != MessageKind::SessionJoin {
        let err = BadPeerError::unexpected_kind(MessageKind::SessionJoin, join);
        return Err(reject(wire, error_id, err).await);
    }
    if join.id != MessageId::HANDSHAKE {
        let err = BadPeerError::misbehaved("SESSION_JOIN must carry id (0, 0)", join);
        return Err(reject(wire, error_id, err).await);
    }
    let peer = match peer_identity(&join) {
        Some(peer) if peer.session == 0 => peer,
        _ => {
            let err = BadPeerError::misbehaved("SESSION_JOIN without a valid peer id", join);
            return Err(reject(wire, error_id, err).await);
        }
    };

    let session_id = mint_session()?;
    let ack = ProtocolMessage::new(
        MessageId::new(session_id, ACK_OBJECT),
        MessageKind::Acknowledge,
        Some(content([(
            "id",
            MessageId::new(session_id, self_id).to_hex(),
        )])),
    );
    wire.send(&ack).await?;

    info!(
        "Accepted peer {:016x} into session {:016x}",
        peer.object, session_id
    );
    Ok(Session::established(session_id, peer.object, ACK_OBJECT))
}

/// Receive one handshake frame, answering malformed bytes with an ERROR
async fn receive<T: Transport>(
    wire: &mut Wire<T>,
    error_id: MessageId,
) -> ChannelResult<ProtocolMessage> {
    match wire.recv().await {
        Err(ChannelError::BadPeer(err)) => Err(reject(wire, error_id, err).await),
        other => other,
    }
}

/// The `id` content field as a message id
fn peer_identity(message: &ProtocolMessage) -> Option<MessageId> {
    message
        .field("id")
        .and_then(|hex| MessageId::from_hex(hex).ok())
}

/// Notify the peer, then hand back the error
async fn reject<T: Transport>(
    wire: &mut Wire<T>,
    error_id: MessageId,
    err: BadPeerError,
) -> ChannelError {
    if let Some(report) = err.report() {
        wire.notify_peer(error_id, report).await;
    }
    err.into()
}
