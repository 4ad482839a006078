//! Topic queues
//!
//! Every registered topic owns two FIFO mailboxes of string payloads:
//! the inbound one is filled by the connection task and drained through an
//! [`Inbox`], the outbound one is filled through an [`Outbox`] and drained by
//! the connection task. Handles are cheap clones of a shared queue.
//!
//! A closed mailbox rejects new payloads but still hands out the queued
//! ones; `recv` returns `None` once it is closed and empty.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::config::{OverflowPolicy, QueueConfig};
use crate::error::{ChannelError, ChannelResult};

/// Result of a successful push
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Pushed {
    Queued,
    /// Queue was full; the oldest payload made room
    DroppedOldest,
}

/// Push failures, handing the payload back
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Rejected<T> {
    Closed(T),
    Full(T),
}

struct State<T> {
    items: VecDeque<T>,
    closed: bool,
    dropped: u64,
}

struct Inner<T> {
    state: Mutex<State<T>>,
    readable: Notify,
    writable: Notify,
    bound: Option<usize>,
    overflow: OverflowPolicy,
    /// Poked on every push (outbound queues wake the connection task)
    wake: Option<Arc<Notify>>,
}

/// Shared FIFO with async push/pop
pub(crate) struct Mailbox<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Mailbox<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Mailbox<T> {
    pub(crate) fn new(config: QueueConfig, wake: Option<Arc<Notify>>) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    items: VecDeque::new(),
                    closed: false,
                    dropped: 0,
                }),
                readable: Notify::new(),
                writable: Notify::new(),
                bound: config.bound(),
                overflow: config.overflow,
                wake,
            }),
        }
    }

    /// Push, waiting for room under [`OverflowPolicy::Block`]
    pub(crate) async fn push(&self, mut item: T) -> Result<Pushed, Rejected<T>> {
        loop {
            let writable = self.inner.writable.notified();
            tokio::pin!(writable);
            writable.as_mut().enable();

            match self.try_push(item) {
                Err(Rejected::Full(returned)) => item = returned,
                other => return other,
            }
            writable.await;
        }
    }

    pub(crate) fn try_push(&self, item: T) -> Result<Pushed, Rejected<T>> {
        let pushed = {
            let mut state = self.inner.state.lock();
            if state.closed {
                return Err(Rejected::Closed(item));
            }

            let full = matches!(self.inner.bound, Some(bound) if state.items.len() >= bound);
            let pushed = match (full, self.inner.overflow) {
                (false, _) => Pushed::Queued,
                (true, OverflowPolicy::Block) => return Err(Rejected::Full(item)),
                (true, OverflowPolicy::DropOldest) => {
                    state.items.pop_front();
                    state.dropped += 1;
                    Pushed::DroppedOldest
                }
            };
            state.items.push_back(item);
            pushed
        };

        self.inner.readable.notify_one();
        if let Some(wake) = &self.inner.wake {
            wake.notify_one();
        }
        Ok(pushed)
    }

    /// Wait for the next item; `None` once closed and drained
    pub(crate) async fn pop(&self) -> Option<T> {
        loop {
            let readable = self.inner.readable.notified();
            tokio::pin!(readable);
            readable.as_mut().enable();

            {
                let mut state = self.inner.state.lock();
                if let Some(item) = state.items.pop_front() {
                    drop(state);
                    self.inner.writable.notify_one();
                    return Some(item);
                }
                if state.closed {
                    return None;
                }
            }
            readable.await;
        }
    }

    pub(crate) fn try_pop(&self) -> Option<T> {
        let item = self.inner.state.lock().items.pop_front();
        if item.is_some() {
            self.inner.writable.notify_one();
        }
        item
    }

    /// Reject further pushes and wake every waiter
    pub(crate) fn close(&self) {
        self.inner.state.lock().closed = true;
        self.inner.readable.notify_waiters();
        self.inner.writable.notify_waiters();
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.inner.state.lock().closed
    }

    pub(crate) fn len(&self) -> usize {
        self.inner.state.lock().items.len()
    }

    pub(crate) fn dropped(&self) -> u64 {
        self.inner.state.lock().dropped
    }

    pub(crate) fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

/// Receiving end of a topic
#[derive(Clone)]
pub struct Inbox {
    topic: Arc<str>,
    mailbox: Mailbox<String>,
}

impl Inbox {
    pub(crate) fn new(topic: Arc<str>, mailbox: Mailbox<String>) -> Self {
        Self { topic, mailbox }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Next payload from the peer; `None` once the topic is gone and drained
    pub async fn recv(&self) -> Option<String> {
        self.mailbox.pop().await
    }

    pub fn try_recv(&self) -> Option<String> {
        self.mailbox.try_pop()
    }

    pub fn len(&self) -> usize {
        self.mailbox.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.mailbox.is_closed()
    }

    /// Payloads discarded because the queue was full
    pub fn dropped(&self) -> u64 {
        self.mailbox.dropped()
    }

    /// Both handles read the same queue
    pub fn same_queue(&self, other: &Inbox) -> bool {
        self.mailbox.ptr_eq(&other.mailbox)
    }

    pub(crate) fn mailbox(&self) -> &Mailbox<String> {
        &self.mailbox
    }
}

impl std::fmt::Debug for Inbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Inbox")
            .field("topic", &self.topic)
            .field("len", &self.len())
            .finish()
    }
}

/// Sending end of a topic
#[derive(Clone)]
pub struct Outbox {
    topic: Arc<str>,
    mailbox: Mailbox<String>,
}

impl Outbox {
    pub(crate) fn new(topic: Arc<str>, mailbox: Mailbox<String>) -> Self {
        Self { topic, mailbox }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Queue a payload for the peer
    ///
    /// Waits for room when the queue is bounded with [`OverflowPolicy::Block`].
    pub async fn send(&self, payload: impl Into<String>) -> ChannelResult<()> {
        self.mailbox
            .push(payload.into())
            .await
            .map(|_| ())
            .map_err(|_| ChannelError::QueueClosed(self.topic.to_string()))
    }

    /// Queue a payload without waiting
    ///
    /// Returns `false` when a blocking queue is full.
    pub fn try_send(&self, payload: impl Into<String>) -> ChannelResult<bool> {
        match self.mailbox.try_push(payload.into()) {
            Ok(_) => Ok(true),
            Err(Rejected::Full(_)) => Ok(false),
            Err(Rejected::Closed(_)) => Err(ChannelError::QueueClosed(self.topic.to_string())),
        }
    }

    /// Payloads waiting for the connection task
    pub fn len(&self) -> usize {
        self.mailbox.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.mailbox.is_closed()
    }

    pub fn dropped(&self) -> u64 {
        self.mailbox.dropped()
    }

    pub fn same_queue(&self, other: &Outbox) -> bool {
        self.mailbox.ptr_eq(&other.mailbox)
    }

    pub(crate) fn mailbox(&self) -> &Mailbox<String> {
        &self.mailbox
    }
}

impl std::fmt::Debug for Outbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Outbox")
            .field("topic", &self.topic)
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn bounded(capacity: usize, overflow: OverflowPolicy) -> Mailbox<u32> {
        Mailbox::new(QueueConfig::bounded(capacity, overflow), None)
    }

    #[tokio::test]
    async fn test_fifo_order() {
        let mailbox = Mailbox::new(QueueConfig::default(), None);
        for i in 0..5u32 {
            assert_eq!(mailbox.push(i).await, Ok(Pushed::Queued));
        }
        for i in 0..5u32 {
            assert_eq!(mailbox.pop().await, Some(i));
        }
        assert_eq!(mailbox.try_pop(), None);
    }

    #[tokio::test]
    async fn test_drop_oldest() {
        let mailbox = bounded(2, OverflowPolicy::DropOldest);
        mailbox.try_push(1).unwrap();
        mailbox.try_push(2).unwrap();
        assert_eq!(mailbox.try_push(3), Ok(Pushed::DroppedOldest));

        assert_eq!(mailbox.dropped(), 1);
        assert_eq!(mailbox.try_pop(), Some(2));
        assert_eq!(mailbox.try_pop(), Some(3));
    }

    #[tokio::test]
    async fn test_block_waits_for_room() {
        let mailbox = bounded(1, OverflowPolicy::Block);
        mailbox.try_push(1).unwrap();
        assert_eq!(mailbox.try_push(2), Err(Rejected::Full(2)));

        let producer = {
            let mailbox = mailbox.clone();
            tokio::spawn(async move { mailbox.push(2).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!producer.is_finished());

        assert_eq!(mailbox.pop().await, Some(1));
        assert_eq!(producer.await.unwrap(), Ok(Pushed::Queued));
        assert_eq!(mailbox.pop().await, Some(2));
    }

    #[tokio::test]
    async fn test_close_drains_then_ends() {
        let mailbox = Mailbox::new(QueueConfig::default(), None);
        mailbox.try_push(7u32).unwrap();
        mailbox.close();

        assert_eq!(mailbox.try_push(8), Err(Rejected::Closed(8)));
        assert_eq!(mailbox.pop().await, Some(7));
        assert_eq!(mailbox.pop().await, None);
    }

    #[tokio::test]
    async fn test_close_wakes_blocked_receiver() {
        let mailbox: Mailbox<u32> = Mailbox::new(QueueConfig::default(), None);
        let consumer = {
            let mailbox = mailbox.clone();
            tokio::spawn(async move { mailbox.pop().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        mailbox.close();
        assert_eq!(consumer.await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_push_pokes_wake_signal() {
        let wake = Arc::new(Notify::new());
        let mailbox = Mailbox::new(QueueConfig::default(), Some(wake.clone()));
        mailbox.try_push(1u32).unwrap();

        // the stored permit completes immediately
        tokio::time::timeout(Duration::from_millis(100), wake.notified())
            .await
            .expect("push must wake the drainer");
    }

    #[tokio::test]
    async fn test_handles_share_queue() {
        let topic: Arc<str> = Arc::from("chat");
        let mailbox = Mailbox::new(QueueConfig::default(), None);
        let outbox = Outbox::new(topic.clone(), mailbox.clone());
        let inbox = Inbox::new(topic, mailbox);

        outbox.send("hello").await.unwrap();
        assert!(outbox.try_send("again").unwrap());
        assert_eq!(inbox.recv().await.as_deref(), Some("hello"));
        assert_eq!(inbox.try_recv().as_deref(), Some("again"));
        assert!(inbox.clone().same_queue(&inbox));

        inbox.mailbox().close();
        assert!(matches!(
            outbox.send("late").await,
            Err(ChannelError::QueueClosed(topic)) if topic == "chat"
        ));
    }
}
