//! L7 Core
//!
//! Pure protocol types for the L7 channel protocol.
//! This crate contains no async, no I/O, and is 100% unit testable.

pub mod entities;
pub mod error;
pub mod id_generator;

// Re-export commonly used types at crate root
pub use entities::{
    ChannelState, Content, MESSAGE_ID_HEX_LEN, MessageId, MessageKind, ProtocolMessage, Role,
    content,
};
pub use error::{CategorizedError, ErrorCategory, FormatError, IdError, UnsupportedRole};
pub use id_generator::{
    DEFAULT_MAX_RANDOM_ATTEMPTS, IdGenerator, SESSION_ID_SPACE, TOPIC_ID_SPACE, random_channel_id,
};
