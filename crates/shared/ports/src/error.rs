use l7_core::ErrorCategory;
use thiserror::Error;

/// Transport-level errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The connection is closed (locally or by the peer)
    #[error("transport closed")]
    Closed,

    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("bind failed: {0}")]
    Bind(String),

    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("frame of {len} bytes exceeds the {max} byte limit")]
    FrameTooLarge { len: usize, max: usize },

    #[error("IO error: {0}")]
    Io(String),
}

impl TransportError {
    /// Every transport failure is a connectivity failure to the protocol
    pub fn category(&self) -> ErrorCategory {
        ErrorCategory::NetworkConnectivity
    }
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        TransportError::Io(err.to_string())
    }
}
