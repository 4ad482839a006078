//! Transport configuration

use serde::{Deserialize, Serialize};

/// TCP transport configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TcpConfig {
    /// Largest frame accepted in either direction
    #[serde(default = "default_max_frame_length")]
    pub max_frame_length: usize,

    /// Connection attempts made by the initiator before giving up
    #[serde(default = "default_connect_attempts")]
    pub connect_attempts: u32,

    /// Pause between connection attempts
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

fn default_max_frame_length() -> usize {
    16 * 1024 * 1024
}

fn default_connect_attempts() -> u32 {
    20
}

fn default_retry_delay_ms() -> u64 {
    50
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            max_frame_length: default_max_frame_length(),
            connect_attempts: default_connect_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

impl TcpConfig {
    /// Parse configuration from a JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
