//! Reply definitions
//!
//! Typed replies from the store.

use std::fmt;

/// A decoded store reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Simple status line, e.g. `+OK`
    Status(String),

    /// Error line reported by the store, e.g. `-ERR wrong number of arguments`
    Error(String),

    /// Integer reply, used for existence and deletion counts
    Integer(i64),

    /// Bulk string; `None` is the nil marker (absent value)
    Bulk(Option<Vec<u8>>),

    /// Multi-bulk reply; `None` is the nil array
    Array(Option<Vec<Reply>>),
}

impl Reply {
    /// Create an `+OK` status reply
    pub fn ok() -> Self {
        Reply::Status("OK".to_string())
    }

    /// Create a nil bulk reply
    pub fn nil() -> Self {
        Reply::Bulk(None)
    }

    /// Create a present bulk reply
    pub fn bulk(value: impl Into<Vec<u8>>) -> Self {
        Reply::Bulk(Some(value.into()))
    }

    /// Create an error reply
    pub fn error(message: impl Into<String>) -> Self {
        Reply::Error(message.into())
    }

    /// True for the `+OK` status
    pub fn is_ok(&self) -> bool {
        matches!(self, Reply::Status(s) if s == "OK")
    }

    /// True for nil bulk strings and nil arrays
    pub fn is_nil(&self) -> bool {
        matches!(self, Reply::Bulk(None) | Reply::Array(None))
    }

    /// Frame type without the payload, for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Reply::Status(_) => "status",
            Reply::Error(_) => "error",
            Reply::Integer(_) => "integer",
            Reply::Bulk(None) | Reply::Array(None) => "nil",
            Reply::Bulk(Some(_)) => "bulk",
            Reply::Array(Some(_)) => "array",
        }
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Status(s) => write!(f, "+{}", s),
            Reply::Error(e) => write!(f, "-{}", e),
            Reply::Integer(n) => write!(f, ":{}", n),
            Reply::Bulk(None) | Reply::Array(None) => write!(f, "(nil)"),
            Reply::Bulk(Some(bytes)) => write!(f, "{:?}", String::from_utf8_lossy(bytes)),
            Reply::Array(Some(items)) => write!(f, "({} items)", items.len()),
        }
    }
}
