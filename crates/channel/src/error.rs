//! Error types for the channel crate

use l7_core::{
    CategorizedError, ChannelState, Content, ErrorCategory, FormatError, IdError, MessageKind,
    ProtocolMessage, UnsupportedRole, content,
};
use l7_ports::TransportError;
use thiserror::Error;

pub type ChannelResult<T> = Result<T, ChannelError>;

/// The peer broke the protocol
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BadPeerError {
    #[error("peer misbehaved: {reason}")]
    Misbehaved {
        reason: String,
        expected: Option<String>,
        message: Option<ProtocolMessage>,
    },

    #[error("peer reported an error: {}", .message.field("error").unwrap_or("unspecified"))]
    Reported { message: ProtocolMessage },

    #[error("out of order message: expected object id {expected}, got {}", .message.id.object)]
    OutOfOrder {
        expected: u64,
        message: ProtocolMessage,
    },

    #[error("message for unknown session {:016x}, expected {expected:016x}", .message.id.session)]
    UnknownSession {
        expected: u64,
        message: ProtocolMessage,
    },

    #[error("malformed frame: {0}")]
    MalformedFrame(#[from] FormatError),
}

impl BadPeerError {
    pub fn misbehaved(reason: impl Into<String>, message: ProtocolMessage) -> Self {
        BadPeerError::Misbehaved {
            reason: reason.into(),
            expected: None,
            message: Some(message),
        }
    }

    /// A message of the wrong kind arrived
    pub fn unexpected_kind(expected: MessageKind, message: ProtocolMessage) -> Self {
        BadPeerError::Misbehaved {
            reason: format!("unexpected {} message", message.kind),
            expected: Some(expected.as_str().to_string()),
            message: Some(message),
        }
    }

    /// The offending message, when one was decoded
    pub fn message(&self) -> Option<&ProtocolMessage> {
        match self {
            BadPeerError::Misbehaved { message, .. } => message.as_ref(),
            BadPeerError::Reported { message }
            | BadPeerError::OutOfOrder { message, .. }
            | BadPeerError::UnknownSession { message, .. } => Some(message),
            BadPeerError::MalformedFrame(_) => None,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            BadPeerError::MalformedFrame(_) => ErrorCategory::MessageFormat,
            _ => ErrorCategory::ProtocolState,
        }
    }

    /// Content of the ERROR frame sent to the peer
    ///
    /// `None` for errors the peer reported itself; those are not echoed.
    pub(crate) fn report(&self) -> Option<Content> {
        let mut report = match self {
            BadPeerError::Reported { .. } => return None,
            BadPeerError::Misbehaved {
                reason, expected, ..
            } => {
                let mut report = content([("error", reason.clone())]);
                if let Some(expected) = expected {
                    report.insert("expected".into(), expected.clone());
                }
                report
            }
            BadPeerError::OutOfOrder { expected, message } => content([
                ("error", "out of order message".to_string()),
                ("expected", expected.to_string()),
                ("got", message.id.object.to_string()),
            ]),
            BadPeerError::UnknownSession { expected, message } => content([
                ("error", "unknown session".to_string()),
                ("expected", format!("{expected:016x}")),
                ("got", format!("{:016x}", message.id.session)),
            ]),
            BadPeerError::MalformedFrame(e) => content([
                ("error", "malformed frame".to_string()),
                ("detail", e.to_string()),
            ]),
        };

        if let Some(message) = self.message() {
            report
                .entry("got".into())
                .or_insert_with(|| message.kind.as_str().to_string());
            report.insert("id".into(), message.id.to_hex());
        }
        Some(report)
    }
}

/// Channel-level errors
#[derive(Error, Debug, Clone)]
pub enum ChannelError {
    #[error("{operation} requires state {expected}, channel is {actual}")]
    WrongState {
        operation: &'static str,
        expected: ChannelState,
        actual: ChannelState,
    },

    #[error(transparent)]
    UnsupportedRole(#[from] UnsupportedRole),

    #[error("bad peer: {0}")]
    BadPeer(#[from] BadPeerError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Identifier(#[from] IdError),

    #[error("topic {0:?} is not registered")]
    UnknownTopic(String),

    #[error("queue for topic {0:?} is closed")]
    QueueClosed(String),

    #[error("request cancelled by teardown")]
    Cancelled,

    #[error("connection task is gone")]
    Disconnected,
}

impl ChannelError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ChannelError::BadPeer(e) => e.category(),
            ChannelError::Transport(_) | ChannelError::Disconnected => {
                ErrorCategory::NetworkConnectivity
            }
            _ => ErrorCategory::ProtocolState,
        }
    }

    /// Collapse into one of the three error kinds of the protocol
    pub fn categorized(&self) -> CategorizedError {
        CategorizedError::categorize(self.category(), self.to_string())
    }

    pub fn bad_peer(&self) -> Option<&BadPeerError> {
        match self {
            ChannelError::BadPeer(e) => Some(e),
            _ => None,
        }
    }

    pub fn is_wrong_state(&self) -> bool {
        matches!(self, ChannelError::WrongState { .. })
    }
}

impl From<FormatError> for ChannelError {
    fn from(err: FormatError) -> Self {
        ChannelError::BadPeer(err.into())
    }
}
