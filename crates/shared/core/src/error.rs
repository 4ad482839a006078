//! Error types shared by every layer of the channel protocol

use std::fmt;

use thiserror::Error;

/// Malformed wire bytes (the protocol's message format error)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("frame is not valid UTF-8: {0}")]
    Utf8(String),

    #[error("frame is not a valid message object: {0}")]
    Json(String),

    #[error("message id must be 32 hex characters, got {0}")]
    IdLength(usize),

    #[error("message id is not hexadecimal: {0:?}")]
    IdDigits(String),

    #[error("unknown message kind: {0:?}")]
    UnknownKind(String),
}

/// A role name that maps to neither end of a channel
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unsupported channel role: {0:?}")]
pub struct UnsupportedRole(pub String);

/// Identifier generation failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdError {
    #[error("{kind} identifier space of {space} values is exhausted")]
    Exhausted { kind: &'static str, space: u64 },
}

/// Coarse failure categories of the protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    NetworkConnectivity,
    MessageFormat,
    ProtocolState,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::NetworkConnectivity => "network_connectivity_error",
            ErrorCategory::MessageFormat => "message_format_error",
            ErrorCategory::ProtocolState => "protocol_state_error",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A caught failure mapped onto one of the three categories
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CategorizedError {
    #[error("network connectivity error: {0}")]
    NetworkConnectivity(String),

    #[error("message format error: {0}")]
    MessageFormat(String),

    #[error("protocol state error: {0}")]
    ProtocolState(String),
}

impl CategorizedError {
    /// Map a failure description to the error kind of its category
    pub fn categorize(category: ErrorCategory, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        match category {
            ErrorCategory::NetworkConnectivity => CategorizedError::NetworkConnectivity(detail),
            ErrorCategory::MessageFormat => CategorizedError::MessageFormat(detail),
            ErrorCategory::ProtocolState => CategorizedError::ProtocolState(detail),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            CategorizedError::NetworkConnectivity(_) => ErrorCategory::NetworkConnectivity,
            CategorizedError::MessageFormat(_) => ErrorCategory::MessageFormat,
            CategorizedError::ProtocolState(_) => ErrorCategory::ProtocolState,
        }
    }

    pub fn detail(&self) -> &str {
        match self {
            CategorizedError::NetworkConnectivity(d)
            | CategorizedError::MessageFormat(d)
            | CategorizedError::ProtocolState(d) => d,
        }
    }
}

impl From<FormatError> for CategorizedError {
    fn from(err: FormatError) -> Self {
        CategorizedError::MessageFormat(err.to_string())
    }
}
