use std::fmt;
use std::str::FromStr;

use crate::error::FormatError;

/// The kind of channel message being sent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Sender is joining the channel session
    SessionJoin,
    /// Sender is leaving the channel session
    SessionLeave,
    /// Sender is registering a topic
    TopicRegister,
    /// Sender is deregistering a topic
    TopicDeregister,
    /// Application payload on a topic
    Application,
    /// Sender received a control message
    Acknowledge,
    /// Sender encountered an error
    Error,
}

impl MessageKind {
    pub const ALL: [MessageKind; 7] = [
        MessageKind::SessionJoin,
        MessageKind::SessionLeave,
        MessageKind::TopicRegister,
        MessageKind::TopicDeregister,
        MessageKind::Application,
        MessageKind::Acknowledge,
        MessageKind::Error,
    ];

    /// Wire name of the kind
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::SessionJoin => "SESSION_JOIN",
            MessageKind::SessionLeave => "SESSION_LEAVE",
            MessageKind::TopicRegister => "TOPIC_REGISTER",
            MessageKind::TopicDeregister => "TOPIC_DEREGISTER",
            MessageKind::Application => "APPLICATION",
            MessageKind::Acknowledge => "ACKNOWLEDGE",
            MessageKind::Error => "ERROR",
        }
    }

    /// Control requests are answered with a single ACKNOWLEDGE
    pub fn expects_ack(&self) -> bool {
        matches!(
            self,
            MessageKind::SessionJoin
                | MessageKind::SessionLeave
                | MessageKind::TopicRegister
                | MessageKind::TopicDeregister
        )
    }
}

impl FromStr for MessageKind {
    type Err = FormatError;

    /// Only canonical names are accepted; `JOIN`, `LEAVE` or
    /// `TOPIC_UNREGISTER` are rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MessageKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| FormatError::UnknownKind(s.to_string()))
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_parse_back() {
        for kind in MessageKind::ALL {
            assert_eq!(kind.as_str().parse::<MessageKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_legacy_aliases_rejected() {
        for alias in ["JOIN", "LEAVE", "TOPIC_UNREGISTER", "TOPIC_MESSAGE", "session_join"] {
            assert!(matches!(
                alias.parse::<MessageKind>(),
                Err(FormatError::UnknownKind(_))
            ));
        }
    }

    #[test]
    fn test_control_kinds_expect_ack() {
        assert!(MessageKind::SessionJoin.expects_ack());
        assert!(MessageKind::TopicDeregister.expects_ack());
        assert!(!MessageKind::Application.expects_ack());
        assert!(!MessageKind::Acknowledge.expects_ack());
        assert!(!MessageKind::Error.expects_ack());
    }
}
