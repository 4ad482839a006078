//! The channel handle
//!
//! ```text
//!  OFFLINE --setup()--> SETUP --handshake--> ONLINE --teardown()--> TEARDOWN --> OFFLINE
//!                         |                                                        ^
//!                         +-- failure: stays in SETUP, instance is spent           |
//!                                     peer SESSION_LEAVE --------------------------+
//! ```
//!
//! All methods take `&self`; the handle can be shared behind an `Arc`.

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;

use l7_core::{ChannelState, IdGenerator, Role, random_channel_id};
use l7_ports::{ChannelObserver, Connector};
use log::{debug, info, warn};
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::config::ChannelConfig;
use crate::connection::{Command, Connection, LeaveRequest};
use crate::error::{ChannelError, ChannelResult};
use crate::handshake;
use crate::observer::LogObserver;
use crate::queue::{Inbox, Outbox};
use crate::registry::TopicQueues;
use crate::session::Session;
use crate::shared::{Shared, SharedState, set_state, transition};
use crate::wire::Wire;

/// Handles to the running connection task
struct Link {
    commands: mpsc::UnboundedSender<Command>,
    leave: mpsc::UnboundedSender<LeaveRequest>,
    task: Option<JoinHandle<()>>,
}

/// One end of a peer-to-peer channel
pub struct Channel<C: Connector> {
    config: ChannelConfig,
    role: Role,
    self_id: u64,
    connector: C,
    observer: Arc<dyn ChannelObserver>,
    shared: SharedState,
    link: Mutex<Option<Link>>,
}

impl<C: Connector> Channel<C> {
    /// Build an OFFLINE channel; fails if the configured role is unknown
    pub fn new(config: ChannelConfig, connector: C) -> ChannelResult<Self> {
        let role = config.role()?;

        let mut ids = IdGenerator::with_max_attempts(
            random_channel_id(),
            config.identifiers.max_random_attempts,
        );
        // session 0 marks the handshake
        ids.reserve_session_id(0);
        let self_id = ids.generate_peer_id() as u64;

        let observer: Arc<dyn ChannelObserver> =
            Arc::new(LogObserver::new(format!("{role}:{self_id:016x}")));
        let shared = Arc::new(Mutex::new(Shared::new(ids, config.queues)));

        Ok(Self {
            config,
            role,
            self_id,
            connector,
            observer,
            shared,
            link: Mutex::new(None),
        })
    }

    /// Replace the default [`LogObserver`]
    pub fn with_observer(mut self, observer: Arc<dyn ChannelObserver>) -> Self {
        debug!("Channel {:016x} reports to {}", self.self_id, observer.name());
        self.observer = observer;
        self
    }

    /// Connect (or accept) and run the handshake
    ///
    /// Requires OFFLINE. On failure the channel stays in SETUP and every
    /// later `setup` fails with `WrongState`.
    pub async fn setup(&self) -> ChannelResult<()> {
        transition(
            &self.shared,
            &*self.observer,
            "setup",
            ChannelState::Offline,
            ChannelState::Setup,
        )?;
        info!(
            "Setting up {} channel on {}",
            self.role, self.config.endpoint
        );

        self.establish().await.inspect_err(|err| {
            warn!("Setup failed: {}", err);
            self.shared.lock().fault = Some(err.clone());
        })
    }

    async fn establish(&self) -> ChannelResult<()> {
        let endpoint = self.config.endpoint.as_str();
        let transport = match self.role {
            Role::Initiator => self.connector.connect(endpoint).await?,
            Role::Responder => self.connector.bind_and_accept(endpoint).await?,
        };

        let mut wire = Wire::new(transport, self.observer.clone());
        let handshake = match self.role {
            Role::Initiator => handshake::initiate(&mut wire, self.self_id).await,
            Role::Responder => {
                handshake::respond(&mut wire, self.self_id, || {
                    self.shared.lock().ids.generate_session_id()
                })
                .await
            }
        };
        let session = match handshake {
            Ok(session) => session,
            Err(err) => {
                wire.close().await;
                return Err(err);
            }
        };

        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (leave_tx, leave_rx) = mpsc::unbounded_channel();
        *self.link.lock() = Some(Link {
            commands: commands_tx,
            leave: leave_tx,
            task: None,
        });

        let outbound = {
            let mut shared = self.shared.lock();
            shared.session = Some(session);
            shared.fault = None;
            shared.registry.outbound_signal()
        };
        set_state(&self.shared, &*self.observer, ChannelState::Online);

        let connection = Connection::new(
            wire,
            self.self_id,
            self.shared.clone(),
            commands_rx,
            leave_rx,
            outbound,
            self.observer.clone(),
        );
        let task = tokio::spawn(connection.run());
        if let Some(link) = self.link.lock().as_mut() {
            link.task = Some(task);
        }
        Ok(())
    }

    /// Leave the session and release the transport
    ///
    /// Requires ONLINE; fails with `WrongState` without touching the network
    /// otherwise. An outstanding `register`/`unregister` is cancelled. After a
    /// connection fault only local state is cleaned up.
    pub async fn teardown(&self) -> ChannelResult<()> {
        transition(
            &self.shared,
            &*self.observer,
            "teardown",
            ChannelState::Online,
            ChannelState::Teardown,
        )?;

        let link = self.link.lock().take();
        let mut result = Ok(());
        if let Some(link) = link {
            let (reply, response) = oneshot::channel();
            if link.leave.send(LeaveRequest { reply }).is_ok() {
                // a dropped reply means the task stopped on its own
                result = response.await.unwrap_or(Ok(()));
            }
            drop(link.commands);
            drop(link.leave);
            if let Some(task) = link.task {
                if let Err(e) = task.await {
                    warn!("Connection task ended abnormally: {}", e);
                }
            }
        }

        self.shared.lock().reset();
        set_state(&self.shared, &*self.observer, ChannelState::Offline);
        info!("Channel {:016x} is offline", self.self_id);
        result
    }

    /// Run `body` on an established session, tearing it down afterwards
    ///
    /// The body does not run if setup fails. A session the peer already
    /// left is not torn down again.
    pub async fn scoped<'a, F, Fut, R>(&'a self, body: F) -> ChannelResult<R>
    where
        F: FnOnce(&'a Self) -> Fut,
        Fut: Future<Output = R>,
    {
        self.setup().await?;
        let output = body(self).await;
        if self.state() == ChannelState::Online {
            self.teardown().await?;
        }
        Ok(output)
    }

    /// Register a topic with the peer and get its queues
    ///
    /// A registered topic is returned as is, without a round trip.
    pub async fn register(&self, topic: &str) -> ChannelResult<TopicQueues> {
        let commands = self.control("register")?;
        if let Some(queues) = self.topic(topic) {
            return Ok(queues);
        }

        let (reply, response) = oneshot::channel();
        commands
            .send(Command::Register {
                topic: topic.to_string(),
                reply,
            })
            .map_err(|_| self.lost())?;
        response.await.map_err(|_| self.lost())?
    }

    /// Deregister a topic with the peer; unknown topics are ignored
    pub async fn unregister(&self, topic: &str) -> ChannelResult<()> {
        let commands = self.control("unregister")?;
        let (reply, response) = oneshot::channel();
        commands
            .send(Command::Unregister {
                topic: topic.to_string(),
                reply,
            })
            .map_err(|_| self.lost())?;
        response.await.map_err(|_| self.lost())?
    }

    /// Outbound handle of a registered topic
    pub fn publish(&self, topic: &str) -> ChannelResult<Outbox> {
        let shared = self.shared.lock();
        shared.require_online("publish")?;
        shared
            .registry
            .get(topic)
            .map(|queues| queues.outbox().clone())
            .ok_or_else(|| ChannelError::UnknownTopic(topic.to_string()))
    }

    /// Inbound handle of a registered topic
    pub fn subscribe(&self, topic: &str) -> ChannelResult<Inbox> {
        let shared = self.shared.lock();
        shared.require_online("subscribe")?;
        shared
            .registry
            .get(topic)
            .map(|queues| queues.inbox().clone())
            .ok_or_else(|| ChannelError::UnknownTopic(topic.to_string()))
    }

    pub fn state(&self) -> ChannelState {
        self.shared.lock().state
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    pub fn self_id(&self) -> u64 {
        self.self_id
    }

    /// Names of the registered topics, ours and the peer's
    pub fn topics(&self) -> BTreeSet<String> {
        self.shared.lock().registry.names()
    }

    pub fn topic(&self, topic: &str) -> Option<TopicQueues> {
        self.shared.lock().registry.get(topic).cloned()
    }

    /// Snapshot of the current session
    pub fn session(&self) -> Option<Session> {
        self.shared.lock().session.clone()
    }

    pub fn peer_id(&self) -> Option<u64> {
        self.shared.lock().session.as_ref().map(Session::peer_id)
    }

    /// The error that stopped the channel, if any
    pub fn fault(&self) -> Option<ChannelError> {
        self.shared.lock().fault.clone()
    }

    fn control(&self, operation: &'static str) -> ChannelResult<mpsc::UnboundedSender<Command>> {
        self.shared.lock().require_online(operation)?;
        self.link
            .lock()
            .as_ref()
            .map(|link| link.commands.clone())
            .ok_or(ChannelError::Disconnected)
    }

    /// Why the connection task stopped answering
    fn lost(&self) -> ChannelError {
        self.fault().unwrap_or(ChannelError::Disconnected)
    }
}

impl<C: Connector> std::fmt::Debug for Channel<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("role", &self.role)
            .field("endpoint", &self.config.endpoint)
            .field("self_id", &format_args!("{:016x}", self.self_id))
            .field("state", &self.state())
            .finish()
    }
}
