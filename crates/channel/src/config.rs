//! Channel configuration
//!
//! JSON-loadable, every section optional except the endpoint and role:
//!
//! ```json
//! {
//!   "endpoint": "tcp://127.0.0.1:5555",
//!   "role": "responder",
//!   "queues": { "capacity": 1024, "overflow": "drop_oldest" },
//!   "identifiers": { "max_random_attempts": 32 }
//! }
//! ```

use std::path::Path;

use l7_core::{DEFAULT_MAX_RANDOM_ATTEMPTS, Role, UnsupportedRole};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Root configuration of one channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Transport address, passed to the connector unchanged
    pub endpoint: String,

    /// `initiator` / `responder` (or `client` / `server`)
    pub role: String,

    #[serde(default)]
    pub queues: QueueConfig,

    #[serde(default)]
    pub identifiers: IdentifierConfig,
}

impl ChannelConfig {
    pub fn new(role: Role, endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            role: role.as_str().to_string(),
            queues: QueueConfig::default(),
            identifiers: IdentifierConfig::default(),
        }
    }

    pub fn initiator(endpoint: impl Into<String>) -> Self {
        Self::new(Role::Initiator, endpoint)
    }

    pub fn responder(endpoint: impl Into<String>) -> Self {
        Self::new(Role::Responder, endpoint)
    }

    pub fn with_queues(mut self, queues: QueueConfig) -> Self {
        self.queues = queues;
        self
    }

    /// Load configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            error: e.to_string(),
        })?;

        Self::from_json(&content)
    }

    /// Parse configuration from a JSON string
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn role(&self) -> Result<Role, UnsupportedRole> {
        self.role.parse()
    }
}

/// Bound and overflow behaviour of every topic queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Maximum queued payloads per direction; unbounded when absent
    #[serde(default)]
    pub capacity: Option<usize>,

    #[serde(default)]
    pub overflow: OverflowPolicy,
}

impl QueueConfig {
    pub fn bounded(capacity: usize, overflow: OverflowPolicy) -> Self {
        Self {
            capacity: Some(capacity),
            overflow,
        }
    }

    /// Effective bound (a zero capacity holds one payload)
    pub fn bound(&self) -> Option<usize> {
        self.capacity.map(|capacity| capacity.max(1))
    }
}

/// What a full queue does with a new payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Producer waits for room
    #[default]
    Block,
    /// Oldest queued payload is discarded
    DropOldest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifierConfig {
    /// Random draws before the generator falls back to a linear probe
    #[serde(default = "default_max_random_attempts")]
    pub max_random_attempts: u32,
}

fn default_max_random_attempts() -> u32 {
    DEFAULT_MAX_RANDOM_ATTEMPTS
}

impl Default for IdentifierConfig {
    fn default() -> Self {
        Self {
            max_random_attempts: default_max_random_attempts(),
        }
    }
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {error}")]
    Io { path: String, error: String },

    #[error("Failed to parse config: {0}")]
    Parse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config() {
        let config =
            ChannelConfig::from_json(r#"{"endpoint": "mem://a", "role": "server"}"#).unwrap();

        assert_eq!(config.role().unwrap(), Role::Responder);
        assert_eq!(config.queues, QueueConfig::default());
        assert_eq!(config.queues.bound(), None);
        assert_eq!(
            config.identifiers.max_random_attempts,
            DEFAULT_MAX_RANDOM_ATTEMPTS
        );
    }

    #[test]
    fn test_full_config() {
        let config = ChannelConfig::from_json(
            r#"{
                "endpoint": "tcp://127.0.0.1:5555",
                "role": "initiator",
                "queues": {"capacity": 0, "overflow": "drop_oldest"},
                "identifiers": {"max_random_attempts": 4}
            }"#,
        )
        .unwrap();

        assert_eq!(config.role().unwrap(), Role::Initiator);
        assert_eq!(config.queues.overflow, OverflowPolicy::DropOldest);
        assert_eq!(config.queues.bound(), Some(1));
        assert_eq!(config.identifiers.max_random_attempts, 4);
    }

    #[test]
    fn test_unsupported_role_surfaces_late() {
        let config = ChannelConfig::from_json(r#"{"endpoint": "x", "role": "observer"}"#).unwrap();
        assert_eq!(
            config.role().unwrap_err(),
            UnsupportedRole("observer".into())
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            ChannelConfig::from_json(r#"{"role": "initiator"}"#),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            ChannelConfig::from_file("/nonexistent/channel.json"),
            Err(ConfigError::Io { .. })
        ));
    }
}
