mod message;
mod message_id;
mod message_kind;
mod role;
mod state;

pub use message::{Content, ProtocolMessage, content};
pub use message_id::{MESSAGE_ID_HEX_LEN, MessageId};
pub use message_kind::MessageKind;
pub use role::Role;
pub use state::ChannelState;
