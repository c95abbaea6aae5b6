//! Error types for otpgate
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using GateError
pub type Result<T> = std::result::Result<T, GateError>;

/// Unified error type for otpgate operations
#[derive(Debug, Error)]
pub enum GateError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Connection Errors
    // -------------------------------------------------------------------------
    #[error("Failed to connect to store at {addr}: {source}")]
    Connection {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Store client not connected")]
    NotConnected,

    #[error("Store command timed out after {0} ms")]
    Timeout(u64),

    // -------------------------------------------------------------------------
    // Protocol Errors
    // -------------------------------------------------------------------------
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Store error reply: {0}")]
    Store(String),

    #[error("Unexpected reply to {command}: {reply}")]
    UnexpectedReply { command: &'static str, reply: String },

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Decode error: {0}")]
    Decode(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for GateError {
    fn from(err: serde_json::Error) -> Self {
        GateError::Decode(err.to_string())
    }
}

impl GateError {
    /// Whether the error leaves the connection in an unknown state.
    ///
    /// A reply may still be in flight after a timeout or a broken read, so the
    /// socket cannot be reused for the next command.
    pub fn poisons_connection(&self) -> bool {
        matches!(
            self,
            GateError::Io(_) | GateError::Timeout(_) | GateError::Protocol(_)
        )
    }
}
