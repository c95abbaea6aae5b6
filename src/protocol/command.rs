//! Command definitions
//!
//! The subset of store commands the client issues.

/// Command types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandType {
    SetEx,
    Get,
    Del,
    Exists,
    Ping,
}

impl CommandType {
    /// Command name as sent on the wire
    pub fn name(&self) -> &'static str {
        match self {
            CommandType::SetEx => "SETEX",
            CommandType::Get => "GET",
            CommandType::Del => "DEL",
            CommandType::Exists => "EXISTS",
            CommandType::Ping => "PING",
        }
    }

    /// Look up a command by name, ignoring ASCII case
    pub fn from_name(name: &[u8]) -> Option<Self> {
        [
            CommandType::SetEx,
            CommandType::Get,
            CommandType::Del,
            CommandType::Exists,
            CommandType::Ping,
        ]
        .into_iter()
        .find(|ty| ty.name().as_bytes().eq_ignore_ascii_case(name))
    }
}

/// A store command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Set a value that expires after `ttl_secs`
    SetEx {
        key: Vec<u8>,
        ttl_secs: u64,
        value: Vec<u8>,
    },

    /// Get a value by key
    Get { key: Vec<u8> },

    /// Delete a key
    Del { key: Vec<u8> },

    /// Check whether a key exists
    Exists { key: Vec<u8> },

    /// Ping (health check)
    Ping,
}

impl Command {
    /// Get the command type
    pub fn command_type(&self) -> CommandType {
        match self {
            Command::SetEx { .. } => CommandType::SetEx,
            Command::Get { .. } => CommandType::Get,
            Command::Del { .. } => CommandType::Del,
            Command::Exists { .. } => CommandType::Exists,
            Command::Ping => CommandType::Ping,
        }
    }

    /// Command name as sent on the wire
    pub fn name(&self) -> &'static str {
        self.command_type().name()
    }

    /// Command line: the name followed by its arguments
    pub fn args(&self) -> Vec<Vec<u8>> {
        let name = self.name().as_bytes().to_vec();
        match self {
            Command::SetEx {
                key,
                ttl_secs,
                value,
            } => vec![
                name,
                key.clone(),
                ttl_secs.to_string().into_bytes(),
                value.clone(),
            ],
            Command::Get { key } | Command::Del { key } | Command::Exists { key } => {
                vec![name, key.clone()]
            }
            Command::Ping => vec![name],
        }
    }

    /// Key the command addresses, if any
    pub fn key(&self) -> Option<&[u8]> {
        match self {
            Command::SetEx { key, .. }
            | Command::Get { key }
            | Command::Del { key }
            | Command::Exists { key } => Some(key),
            Command::Ping => None,
        }
    }
}
