//! Topic registry: topic name to its queue pair

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tokio::sync::Notify;

use crate::config::QueueConfig;
use crate::queue::{Inbox, Mailbox, Outbox};

/// Queue handles of one registered topic
#[derive(Debug, Clone)]
pub struct TopicQueues {
    topic_id: u64,
    inbox: Inbox,
    outbox: Outbox,
}

impl TopicQueues {
    pub fn topic(&self) -> &str {
        self.inbox.topic()
    }

    /// Identifier assigned locally at registration
    pub fn topic_id(&self) -> u64 {
        self.topic_id
    }

    /// Payloads received from the peer
    pub fn inbox(&self) -> &Inbox {
        &self.inbox
    }

    /// Payloads bound for the peer
    pub fn outbox(&self) -> &Outbox {
        &self.outbox
    }

    /// Both pairs are handles to the same queues
    pub fn same_queues(&self, other: &TopicQueues) -> bool {
        self.inbox.same_queue(&other.inbox) && self.outbox.same_queue(&other.outbox)
    }

    fn close(&self) {
        self.inbox.mailbox().close();
        self.outbox.mailbox().close();
    }
}

pub(crate) struct TopicRegistry {
    topics: BTreeMap<String, TopicQueues>,
    config: QueueConfig,
    /// Shared by every outbound queue; wakes the connection task
    outbound: Arc<Notify>,
}

impl TopicRegistry {
    pub(crate) fn new(config: QueueConfig) -> Self {
        Self {
            topics: BTreeMap::new(),
            config,
            outbound: Arc::new(Notify::new()),
        }
    }

    pub(crate) fn outbound_signal(&self) -> Arc<Notify> {
        Arc::clone(&self.outbound)
    }

    pub(crate) fn get(&self, topic: &str) -> Option<&TopicQueues> {
        self.topics.get(topic)
    }

    pub(crate) fn contains(&self, topic: &str) -> bool {
        self.topics.contains_key(topic)
    }

    /// Allocate queues for a topic; an existing entry is returned untouched
    pub(crate) fn insert(&mut self, topic: &str, topic_id: u64) -> TopicQueues {
        if let Some(existing) = self.topics.get(topic) {
            return existing.clone();
        }

        let name: Arc<str> = Arc::from(topic);
        let queues = TopicQueues {
            topic_id,
            inbox: Inbox::new(name.clone(), Mailbox::new(self.config, None)),
            outbox: Outbox::new(
                name,
                Mailbox::new(self.config, Some(self.outbound.clone())),
            ),
        };
        self.topics.insert(topic.to_string(), queues.clone());
        queues
    }

    /// Discard a topic, closing its queues
    pub(crate) fn remove(&mut self, topic: &str) -> Option<TopicQueues> {
        let queues = self.topics.remove(topic)?;
        queues.close();
        Some(queues)
    }

    pub(crate) fn names(&self) -> BTreeSet<String> {
        self.topics.keys().cloned().collect()
    }

    /// Take every queued outbound payload, topic by topic
    pub(crate) fn drain_outbound(&self) -> Vec<(String, String)> {
        let mut batch = Vec::new();
        for (topic, queues) in &self.topics {
            while let Some(payload) = queues.outbox.mailbox().try_pop() {
                batch.push((topic.clone(), payload));
            }
        }
        batch
    }

    /// Close every queue, keeping the entries
    pub(crate) fn close_all(&self) {
        self.topics.values().for_each(TopicQueues::close);
    }

    /// Close every queue and forget every topic
    pub(crate) fn clear(&mut self) {
        self.close_all();
        self.topics.clear();
    }
}
