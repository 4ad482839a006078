use std::fmt;

use serde::{Deserialize, Serialize};

/// Channel lifecycle state
///
/// `Offline -> Setup -> Online -> Teardown -> Offline`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChannelState {
    #[default]
    Offline,
    Setup,
    Online,
    Teardown,
}

impl ChannelState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelState::Offline => "OFFLINE",
            ChannelState::Setup => "SETUP",
            ChannelState::Online => "ONLINE",
            ChannelState::Teardown => "TEARDOWN",
        }
    }
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
