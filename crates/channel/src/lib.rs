//! L7 Channel
//!
//! Session-oriented, ordered, topic-multiplexed messaging between exactly two
//! peers over a [`Transport`](l7_ports::Transport).
//!
//! ## Lifecycle
//!
//! ```text
//! let channel = Channel::new(ChannelConfig::responder("tcp://0.0.0.0:5555"), TcpConnector::default())?;
//! channel.setup().await?;                 // OFFLINE -> SETUP -> ONLINE
//! let chat = channel.register("chat").await?;
//! chat.outbox().send("hello").await?;
//! let reply = chat.inbox().recv().await;
//! channel.teardown().await?;              // ONLINE -> TEARDOWN -> OFFLINE
//! ```
//!
//! ## Guarantees
//!
//! - Every frame after the handshake carries the session id and the next
//!   object id of its direction; anything else is a bad peer
//! - A bad peer is told why with an ERROR frame before the channel gives up
//! - Application payloads are delivered at most once, in order per topic

pub mod channel;
pub mod config;
pub mod error;
pub mod observer;
pub mod queue;
pub mod registry;
pub mod session;

mod connection;
mod handshake;
mod shared;
mod wire;

// Re-export commonly used types
pub use channel::Channel;
pub use config::{ChannelConfig, ConfigError, IdentifierConfig, OverflowPolicy, QueueConfig};
pub use error::{BadPeerError, ChannelError, ChannelResult};
pub use observer::LogObserver;
pub use queue::{Inbox, Outbox};
pub use registry::TopicQueues;
pub use session::Session;
