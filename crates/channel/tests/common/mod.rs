//! Shared fixtures for channel integration tests
//!
//! - [`RawPeer`]: a bare transport end that scripts the other side of the
//!   protocol frame by frame, including misbehaviour
//! - [`RecordingObserver`]: collects observer events for assertions
//! - [`online_pair`]: two channels connected over a memory network

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use l7_channel::{Channel, ChannelConfig};
use l7_core::{ChannelState, Content, MessageId, MessageKind, ProtocolMessage, content};
use l7_ports::{ChannelObserver, Connector, Transport, TransportError};
use l7_transport::{MemoryNetwork, MemoryTransport};
use parking_lot::Mutex;

pub const WAIT: Duration = Duration::from_secs(2);

pub fn init() {
    let _ = env_logger::try_init();
}

/// Scripted protocol peer on a raw transport
pub struct RawPeer {
    transport: MemoryTransport,
    pub session: u64,
    pub last_sent: u64,
}

impl RawPeer {
    pub async fn connect(network: &MemoryNetwork, endpoint: &str) -> Self {
        let transport = network.connect(endpoint).await.expect("connect");
        Self::new(transport)
    }

    pub async fn accept(network: &MemoryNetwork, endpoint: &str) -> Self {
        let transport = network.bind_and_accept(endpoint).await.expect("accept");
        Self::new(transport)
    }

    fn new(transport: MemoryTransport) -> Self {
        Self {
            transport,
            session: 0,
            last_sent: 0,
        }
    }

    pub async fn send(&mut self, message: &ProtocolMessage) {
        self.send_raw(message.to_bytes()).await;
    }

    pub async fn send_raw(&mut self, frame: Vec<u8>) {
        self.transport.send(frame).await.expect("raw send");
    }

    /// Send the next in-sequence frame of the session
    pub async fn send_next(&mut self, kind: MessageKind, body: Option<Content>) -> MessageId {
        self.last_sent += 1;
        let id = MessageId::new(self.session, self.last_sent);
        self.send(&ProtocolMessage::new(id, kind, body)).await;
        id
    }

    pub async fn recv(&mut self) -> ProtocolMessage {
        let frame = tokio::time::timeout(WAIT, self.transport.recv())
            .await
            .expect("timed out waiting for a frame")
            .expect("transport closed");
        ProtocolMessage::from_bytes(&frame).expect("channel sent a malformed frame")
    }

    pub async fn recv_result(&mut self) -> Result<Vec<u8>, TransportError> {
        tokio::time::timeout(WAIT, self.transport.recv())
            .await
            .expect("timed out waiting for the transport")
    }

    /// Nothing arrives for a short while
    pub async fn expect_silence(&mut self) {
        let next = tokio::time::timeout(Duration::from_millis(50), self.transport.recv()).await;
        assert!(next.is_err(), "unexpected frame: {next:?}");
    }

    /// The channel side closed the connection
    pub async fn expect_closed(&mut self) {
        assert_eq!(self.recv_result().await, Err(TransportError::Closed));
    }

    /// Act as initiator: send JOIN, read the ACK, adopt its session
    pub async fn join(&mut self, self_id: u64) -> ProtocolMessage {
        self.send(&ProtocolMessage::new(
            MessageId::HANDSHAKE,
            MessageKind::SessionJoin,
            Some(content([("id", MessageId::new(0, self_id).to_hex())])),
        ))
        .await;

        let ack = self.recv().await;
        assert_eq!(ack.kind, MessageKind::Acknowledge);
        self.session = ack.id.session;
        self.last_sent = ack.id.object;
        ack
    }

    /// Act as responder: read the JOIN, ACK it into `session`
    pub async fn welcome(&mut self, session: u64, self_id: u64) -> ProtocolMessage {
        self.welcome_at(MessageId::new(session, 1), self_id).await
    }

    /// Like [`RawPeer::welcome`], with an arbitrary ACK id
    pub async fn welcome_at(&mut self, ack: MessageId, self_id: u64) -> ProtocolMessage {
        let join = self.recv().await;
        assert_eq!(join.kind, MessageKind::SessionJoin);

        let session = ack.session;
        self.session = session;
        self.last_sent = ack.object;
        self.send(&ProtocolMessage::new(
            ack,
            MessageKind::Acknowledge,
            Some(content([("id", MessageId::new(session, self_id).to_hex())])),
        ))
        .await;
        join
    }

    /// Answer the next frame with an in-sequence ACK echoing its topic
    pub async fn ack_next(&mut self) -> ProtocolMessage {
        let request = self.recv().await;
        let echo = request.field("topic").map(|topic| content([("topic", topic)]));
        self.send_next(MessageKind::Acknowledge, echo).await;
        request
    }
}

/// Observer event log
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    State(ChannelState, ChannelState),
    Sent(MessageKind),
    Received(MessageKind),
    Violation(String),
    NotifyFailed,
    Dropped(String, String),
}

#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<Event>>,
}

impl RecordingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    pub fn sent(&self) -> usize {
        self.events()
            .iter()
            .filter(|event| matches!(event, Event::Sent(_)))
            .count()
    }

    pub fn dropped(&self) -> Vec<(String, String)> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Dropped(topic, reason) => Some((topic, reason)),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: Event) {
        self.events.lock().push(event);
    }
}

impl ChannelObserver for RecordingObserver {
    fn state_changed(&self, from: ChannelState, to: ChannelState) {
        self.push(Event::State(from, to));
    }

    fn frame_sent(&self, message: &ProtocolMessage) {
        self.push(Event::Sent(message.kind));
    }

    fn frame_received(&self, message: &ProtocolMessage) {
        self.push(Event::Received(message.kind));
    }

    fn peer_violation(&self, description: &str) {
        self.push(Event::Violation(description.to_string()));
    }

    fn notify_failed(&self, _error: &TransportError) {
        self.push(Event::NotifyFailed);
    }

    fn payload_dropped(&self, topic: &str, reason: &str) {
        self.push(Event::Dropped(topic.to_string(), reason.to_string()));
    }

    fn name(&self) -> &str {
        "RecordingObserver"
    }
}

pub fn responder(network: &MemoryNetwork, endpoint: &str) -> Channel<MemoryNetwork> {
    Channel::new(ChannelConfig::responder(endpoint), network.clone()).expect("responder")
}

pub fn initiator(network: &MemoryNetwork, endpoint: &str) -> Channel<MemoryNetwork> {
    Channel::new(ChannelConfig::initiator(endpoint), network.clone()).expect("initiator")
}

/// Initiator and responder channels, both ONLINE
pub async fn online_pair(endpoint: &str) -> (Channel<MemoryNetwork>, Channel<MemoryNetwork>) {
    let network = MemoryNetwork::new();
    let initiator = initiator(&network, endpoint);
    let responder = responder(&network, endpoint);

    let (a, b) = tokio::join!(initiator.setup(), responder.setup());
    a.expect("initiator setup");
    b.expect("responder setup");
    (initiator, responder)
}

/// Poll `condition` until it holds or [`WAIT`] passes
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(WAIT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition never held");
}
