//! State shared between the channel handle and its connection task

use std::sync::Arc;

use l7_core::{ChannelState, IdGenerator};
use l7_ports::ChannelObserver;
use parking_lot::Mutex;

use crate::config::QueueConfig;
use crate::error::{ChannelError, ChannelResult};
use crate::registry::{TopicQueues, TopicRegistry};
use crate::session::Session;

pub(crate) type SharedState = Arc<Mutex<Shared>>;

pub(crate) struct Shared {
    pub(crate) state: ChannelState,
    pub(crate) session: Option<Session>,
    pub(crate) registry: TopicRegistry,
    pub(crate) ids: IdGenerator,
    /// Error that killed the connection task, if any
    pub(crate) fault: Option<ChannelError>,
}

impl Shared {
    pub(crate) fn new(ids: IdGenerator, queues: QueueConfig) -> Self {
        Self {
            state: ChannelState::Offline,
            session: None,
            registry: TopicRegistry::new(queues),
            ids,
            fault: None,
        }
    }

    /// Queues of a topic, allocating them and a topic id on first use
    pub(crate) fn ensure_topic(&mut self, topic: &str) -> ChannelResult<TopicQueues> {
        if let Some(queues) = self.registry.get(topic) {
            return Ok(queues.clone());
        }
        let topic_id = self.ids.generate_topic_id()?;
        Ok(self.registry.insert(topic, topic_id))
    }

    /// Forget the session and every topic
    pub(crate) fn reset(&mut self) {
        self.session = None;
        self.registry.clear();
    }

    fn require(&self, operation: &'static str, expected: ChannelState) -> ChannelResult<()> {
        if self.state != expected {
            return Err(ChannelError::WrongState {
                operation,
                expected,
                actual: self.state,
            });
        }
        Ok(())
    }

    /// Fail with `WrongState` unless online, or with the fault if one is recorded
    pub(crate) fn require_online(&self, operation: &'static str) -> ChannelResult<()> {
        self.require(operation, ChannelState::Online)?;
        match &self.fault {
            Some(fault) => Err(fault.clone()),
            None => Ok(()),
        }
    }
}

/// Move to `to`, notifying the observer outside the lock
pub(crate) fn set_state(shared: &Mutex<Shared>, observer: &dyn ChannelObserver, to: ChannelState) {
    let from = std::mem::replace(&mut shared.lock().state, to);
    if from != to {
        observer.state_changed(from, to);
    }
}

/// Move from `from` to `to` atomically, or fail with `WrongState`
pub(crate) fn transition(
    shared: &Mutex<Shared>,
    observer: &dyn ChannelObserver,
    operation: &'static str,
    from: ChannelState,
    to: ChannelState,
) -> ChannelResult<()> {
    {
        let mut guard = shared.lock();
        guard.require(operation, from)?;
        guard.state = to;
    }
    observer.state_changed(from, to);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use l7_ports::NoopObserver;

    fn shared() -> Mutex<Shared> {
        Mutex::new(Shared::new(IdGenerator::new(1), QueueConfig::default()))
    }

    #[test]
    fn test_transition_checks_state() {
        let shared = shared();
        transition(
            &shared,
            &NoopObserver,
            "setup",
            ChannelState::Offline,
            ChannelState::Setup,
        )
        .unwrap();

        let err = transition(
            &shared,
            &NoopObserver,
            "setup",
            ChannelState::Offline,
            ChannelState::Setup,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ChannelError::WrongState {
                operation: "setup",
                expected: ChannelState::Offline,
                actual: ChannelState::Setup,
            }
        ));
    }

    #[test]
    fn test_ensure_topic_assigns_id_once() {
        let shared = shared();
        let mut guard = shared.lock();
        let first = guard.ensure_topic("chat").unwrap();
        let second = guard.ensure_topic("chat").unwrap();

        assert!(first.same_queues(&second));
        assert_eq!(first.topic_id(), second.topic_id());
    }

    #[test]
    fn test_fault_reported_while_online() {
        let shared = shared();
        let mut guard = shared.lock();
        guard.state = ChannelState::Online;
        assert!(guard.require_online("register").is_ok());

        guard.fault = Some(ChannelError::Disconnected);
        assert!(matches!(
            guard.require_online("register"),
            Err(ChannelError::Disconnected)
        ));
    }
}
