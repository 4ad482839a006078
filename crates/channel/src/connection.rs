//! Connection task
//!
//! One task per online channel owns the transport and multiplexes:
//! - frames from the peer (ordering check, then dispatch by kind)
//! - control commands from the channel handle (one outstanding at a time)
//! - the teardown request (always polled, cancels an outstanding command)
//! - outbound queue wakeups (drains every topic's outbox onto the wire)
//!
//! The task ends when the session is left (either side), the handle is
//! dropped, or on the first error. Errors are recorded as the channel fault.

use std::sync::Arc;

use l7_core::{ChannelState, Content, MessageId, MessageKind, ProtocolMessage, content};
use l7_ports::{ChannelObserver, Transport, TransportError};
use log::{debug, info, warn};
use tokio::sync::{Notify, mpsc, oneshot};

use crate::error::{BadPeerError, ChannelError, ChannelResult};
use crate::queue::{Pushed, Rejected};
use crate::registry::TopicQueues;
use crate::session::Session;
use crate::shared::{SharedState, set_state, transition};
use crate::wire::Wire;

/// Control request from the channel handle
pub(crate) enum Command {
    Register {
        topic: String,
        reply: oneshot::Sender<ChannelResult<TopicQueues>>,
    },
    Unregister {
        topic: String,
        reply: oneshot::Sender<ChannelResult<()>>,
    },
}

impl Command {
    fn fail(self, err: ChannelError) {
        match self {
            Command::Register { reply, .. } => {
                let _ = reply.send(Err(err));
            }
            Command::Unregister { reply, .. } => {
                let _ = reply.send(Err(err));
            }
        }
    }
}

pub(crate) struct LeaveRequest {
    pub(crate) reply: oneshot::Sender<ChannelResult<()>>,
}

/// Request sent to the peer, waiting for its ACK
enum Pending {
    Register {
        topic: String,
        reply: oneshot::Sender<ChannelResult<TopicQueues>>,
    },
    Unregister {
        topic: String,
        reply: oneshot::Sender<ChannelResult<()>>,
    },
    Leave {
        reply: oneshot::Sender<ChannelResult<()>>,
    },
}

impl Pending {
    fn fail(self, err: ChannelError) {
        match self {
            Pending::Register { reply, .. } => {
                let _ = reply.send(Err(err));
            }
            Pending::Unregister { reply, .. } | Pending::Leave { reply } => {
                let _ = reply.send(Err(err));
            }
        }
    }
}

enum Exit {
    /// Our SESSION_LEAVE completed
    Left,
    /// The peer sent SESSION_LEAVE
    PeerLeft,
    /// The channel handle is gone
    Abandoned,
    Failed(ChannelError),
}

enum Step {
    Continue,
    Exit(Exit),
}

pub(crate) struct Connection<T: Transport> {
    wire: Wire<T>,
    self_id: u64,
    shared: SharedState,
    commands: mpsc::UnboundedReceiver<Command>,
    leave: mpsc::UnboundedReceiver<LeaveRequest>,
    outbound: Arc<Notify>,
    observer: Arc<dyn ChannelObserver>,
    pending: Option<Pending>,
    /// ACKs still owed for requests cancelled by teardown
    stale_acks: usize,
    leaving: bool,
}

impl<T: Transport> Connection<T> {
    pub(crate) fn new(
        wire: Wire<T>,
        self_id: u64,
        shared: SharedState,
        commands: mpsc::UnboundedReceiver<Command>,
        leave: mpsc::UnboundedReceiver<LeaveRequest>,
        outbound: Arc<Notify>,
        observer: Arc<dyn ChannelObserver>,
    ) -> Self {
        Self {
            wire,
            self_id,
            shared,
            commands,
            leave,
            outbound,
            observer,
            pending: None,
            stale_acks: 0,
            leaving: false,
        }
    }

    pub(crate) async fn run(mut self) {
        let exit = loop {
            let step = tokio::select! {
                frame = self.wire.recv() => self.on_frame(frame).await,
                request = self.leave.recv(), if !self.leaving => match request {
                    Some(request) => self.on_leave(request).await,
                    None => Ok(Step::Exit(Exit::Abandoned)),
                },
                Some(command) = self.commands.recv(), if self.pending.is_none() && !self.leaving => {
                    self.on_command(command).await
                }
                _ = self.outbound.notified(), if !self.leaving => self.flush_outbound().await,
            };

            match step {
                Ok(Step::Continue) => {}
                Ok(Step::Exit(exit)) => break exit,
                Err(err) => break self.fail(err).await,
            }
        };
        self.finish(exit).await;
    }

    async fn on_frame(&mut self, frame: ChannelResult<ProtocolMessage>) -> ChannelResult<Step> {
        let message = match frame {
            Ok(message) => message,
            // closing instead of acknowledging still ends the session
            Err(ChannelError::Transport(TransportError::Closed))
                if matches!(self.pending, Some(Pending::Leave { .. })) =>
            {
                return Ok(self.complete_leave());
            }
            Err(err) => return Err(err),
        };

        self.shared
            .lock()
            .session
            .as_mut()
            .ok_or(ChannelError::Disconnected)?
            .accept(&message)?;
        self.observer.frame_received(&message);

        let kind = message.kind;
        let (step, echo) = match kind {
            MessageKind::Application => (self.on_application(message)?, None),
            MessageKind::TopicRegister => self.on_peer_register(message)?,
            MessageKind::TopicDeregister => self.on_peer_deregister(message)?,
            MessageKind::SessionLeave => (self.on_peer_leave(), None),
            MessageKind::Acknowledge => (self.on_ack(message)?, None),
            MessageKind::Error => return Err(BadPeerError::Reported { message }.into()),
            MessageKind::SessionJoin => {
                let reason = "SESSION_JOIN on an established session";
                return Err(BadPeerError::misbehaved(reason, message).into());
            }
        };

        if kind.expects_ack() {
            match self.send(MessageKind::Acknowledge, echo).await {
                Ok(()) => {}
                // the session is over either way
                Err(e) if matches!(step, Step::Exit(_)) => {
                    debug!("Could not acknowledge {}: {}", kind, e);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(step)
    }

    /// Deliver a payload; at most once, never waits on the subscriber
    fn on_application(&mut self, message: ProtocolMessage) -> ChannelResult<Step> {
        let topic = message.field("topic").map(str::to_string);
        let payload = message.field("payload").map(str::to_string);
        let (Some(topic), Some(payload)) = (topic, payload) else {
            return Err(BadPeerError::misbehaved("APPLICATION without topic and payload", message).into());
        };

        let inbox = self
            .shared
            .lock()
            .registry
            .get(&topic)
            .map(|queues| queues.inbox().clone());
        let Some(inbox) = inbox else {
            self.observer.payload_dropped(&topic, "topic not registered");
            return Ok(Step::Continue);
        };

        match inbox.mailbox().try_push(payload) {
            Ok(Pushed::Queued) => {}
            Ok(Pushed::DroppedOldest) => {
                self.observer
                    .payload_dropped(&topic, "inbound queue full, oldest payload dropped")
            }
            Err(Rejected::Full(_)) => self.observer.payload_dropped(&topic, "inbound queue full"),
            Err(Rejected::Closed(_)) => self.observer.payload_dropped(&topic, "topic closed"),
        }
        Ok(Step::Continue)
    }

    /// Allocate the peer's topic; the ACK echoes its name
    fn on_peer_register(
        &mut self,
        message: ProtocolMessage,
    ) -> ChannelResult<(Step, Option<Content>)> {
        let Some(topic) = message.field("topic").map(str::to_string) else {
            return Err(BadPeerError::misbehaved("TOPIC_REGISTER without a topic", message).into());
        };

        self.shared.lock().ensure_topic(&topic)?;
        info!("Peer registered topic {:?}", topic);
        Ok((Step::Continue, Some(content([("topic", topic)]))))
    }

    fn on_peer_deregister(
        &mut self,
        message: ProtocolMessage,
    ) -> ChannelResult<(Step, Option<Content>)> {
        let Some(topic) = message.field("topic").map(str::to_string) else {
            return Err(BadPeerError::misbehaved("TOPIC_DEREGISTER without a topic", message).into());
        };

        self.shared.lock().registry.remove(&topic);
        info!("Peer deregistered topic {:?}", topic);
        Ok((Step::Continue, Some(content([("topic", topic)]))))
    }

    fn on_peer_leave(&mut self) -> Step {
        info!("Peer is leaving the session");

        // both sides left at once: the peer's LEAVE stands in for our ACK
        if matches!(self.pending, Some(Pending::Leave { .. })) {
            return self.complete_leave();
        }
        if let Some(pending) = self.pending.take() {
            pending.fail(ChannelError::Disconnected);
        }
        Step::Exit(Exit::PeerLeft)
    }

    fn on_ack(&mut self, message: ProtocolMessage) -> ChannelResult<Step> {
        if self.stale_acks > 0 {
            self.stale_acks -= 1;
            debug!("Discarding ACK {} of a cancelled request", message.id);
            return Ok(Step::Continue);
        }

        // a topic request's ACK must name the requested topic
        if let Some(Pending::Register { topic, .. } | Pending::Unregister { topic, .. }) =
            &self.pending
        {
            if message.field("topic") != Some(topic.as_str()) {
                let reason = format!("ACKNOWLEDGE does not echo topic {topic:?}");
                return Err(BadPeerError::misbehaved(reason, message).into());
            }
        }

        match self.pending.take() {
            None => Err(BadPeerError::misbehaved("unsolicited ACKNOWLEDGE", message).into()),
            Some(Pending::Register { topic, reply }) => {
                let queues = self.shared.lock().ensure_topic(&topic);
                if let Ok(queues) = &queues {
                    info!("Registered topic {:?} (id {})", topic, queues.topic_id());
                }
                let _ = reply.send(queues);
                Ok(Step::Continue)
            }
            Some(Pending::Unregister { topic, reply }) => {
                self.shared.lock().registry.remove(&topic);
                info!("Deregistered topic {:?}", topic);
                let _ = reply.send(Ok(()));
                Ok(Step::Continue)
            }
            Some(Pending::Leave { reply }) => {
                let _ = reply.send(Ok(()));
                Ok(Step::Exit(Exit::Left))
            }
        }
    }

    async fn on_command(&mut self, command: Command) -> ChannelResult<Step> {
        match command {
            Command::Register { topic, reply } => {
                let existing = self.shared.lock().registry.get(&topic).cloned();
                if let Some(queues) = existing {
                    let _ = reply.send(Ok(queues));
                    return Ok(Step::Continue);
                }

                let request = content([("topic", topic.clone())]);
                if let Err(err) = self.send(MessageKind::TopicRegister, Some(request)).await {
                    let _ = reply.send(Err(err.clone()));
                    return Err(err);
                }
                self.pending = Some(Pending::Register { topic, reply });
            }
            Command::Unregister { topic, reply } => {
                if !self.shared.lock().registry.contains(&topic) {
                    let _ = reply.send(Ok(()));
                    return Ok(Step::Continue);
                }

                let request = content([("topic", topic.clone())]);
                if let Err(err) = self.send(MessageKind::TopicDeregister, Some(request)).await {
                    let _ = reply.send(Err(err.clone()));
                    return Err(err);
                }
                self.pending = Some(Pending::Unregister { topic, reply });
            }
        }
        Ok(Step::Continue)
    }

    async fn on_leave(&mut self, request: LeaveRequest) -> ChannelResult<Step> {
        self.leaving = true;
        if let Some(pending) = self.pending.take() {
            debug!("Teardown cancels the outstanding request");
            pending.fail(ChannelError::Cancelled);
            self.stale_acks += 1;
        }

        let session_id = self.shared.lock().session.as_ref().map(Session::id);
        let identity =
            session_id.map(|session| content([("id", MessageId::new(session, self.self_id).to_hex())]));

        match self.send(MessageKind::SessionLeave, identity).await {
            Ok(()) => {
                self.pending = Some(Pending::Leave {
                    reply: request.reply,
                });
                Ok(Step::Continue)
            }
            // nobody left to say goodbye to
            Err(ChannelError::Transport(TransportError::Closed)) => {
                let _ = request.reply.send(Ok(()));
                Ok(Step::Exit(Exit::Left))
            }
            Err(err) => {
                let _ = request.reply.send(Err(err.clone()));
                Err(err)
            }
        }
    }

    async fn flush_outbound(&mut self) -> ChannelResult<Step> {
        let batch = self.shared.lock().registry.drain_outbound();
        for (topic, payload) in batch {
            let body = content([("topic", topic), ("payload", payload)]);
            self.send(MessageKind::Application, Some(body)).await?;
        }
        Ok(Step::Continue)
    }

    fn complete_leave(&mut self) -> Step {
        if let Some(Pending::Leave { reply }) = self.pending.take() {
            let _ = reply.send(Ok(()));
        }
        Step::Exit(Exit::Left)
    }

    /// Stamp the next id of this session on a frame and send it
    async fn send(&mut self, kind: MessageKind, content: Option<Content>) -> ChannelResult<()> {
        let id = self
            .shared
            .lock()
            .session
            .as_mut()
            .map(Session::next_id)
            .ok_or(ChannelError::Disconnected)?;
        self.wire
            .send(&ProtocolMessage::new(id, kind, content))
            .await
    }

    /// Tell a misbehaving peer what went wrong before giving up
    async fn fail(&mut self, err: ChannelError) -> Exit {
        warn!("Connection failed: {}", err);
        if let Some(bad) = err.bad_peer() {
            self.observer.peer_violation(&bad.to_string());
            if let Some(report) = bad.report() {
                let id = self.shared.lock().session.as_mut().map(Session::next_id);
                if let Some(id) = id {
                    self.wire.notify_peer(id, report).await;
                }
            }
        }
        Exit::Failed(err)
    }

    async fn finish(mut self, exit: Exit) {
        self.wire.close().await;

        let cause = match &exit {
            Exit::Failed(err) => err.clone(),
            _ => ChannelError::Disconnected,
        };

        match exit {
            Exit::Failed(err) => {
                let mut shared = self.shared.lock();
                shared.registry.close_all();
                shared.fault = Some(err);
            }
            Exit::PeerLeft => {
                let moved = transition(
                    &self.shared,
                    &*self.observer,
                    "peer teardown",
                    ChannelState::Online,
                    ChannelState::Teardown,
                );
                match moved {
                    Ok(()) => {
                        self.shared.lock().reset();
                        set_state(&self.shared, &*self.observer, ChannelState::Offline);
                        info!("Session closed by peer");
                    }
                    // the handle is tearing down and goes OFFLINE itself
                    Err(_) => debug!("Peer left during teardown"),
                }
            }
            // the handle resets and goes OFFLINE once this task is joined
            Exit::Left => info!("Session closed"),
            Exit::Abandoned => {
                self.shared.lock().reset();
                debug!("Channel handle dropped, connection released");
            }
        }

        if let Some(pending) = self.pending.take() {
            pending.fail(cause.clone());
        }
        self.commands.close();
        while let Ok(command) = self.commands.try_recv() {
            command.fail(cause.clone());
        }
    }
}
