//! Store Client
//!
//! Owns the single persistent connection and serializes every command on it.

use std::time::Duration;

use parking_lot::Mutex;

use super::Connection;
use crate::config::Config;
use crate::error::{GateError, Result};
use crate::protocol::{Command, Reply};

/// Default bound on a single reply (milliseconds)
pub const DEFAULT_COMMAND_TIMEOUT_MS: u64 = 5000;

/// Connection lifecycle
enum State {
    /// Never opened, or closed by `close()`
    Closed,

    /// Open and in a known state
    Ready(Connection),

    /// A previous exchange failed mid-flight; a stale reply may still arrive,
    /// so the next command dials a fresh connection first
    Poisoned,
}

/// Client for the Redis-compatible store
///
/// ## Concurrency Model
///
/// At most one command is in flight at any time. `execute` holds the state
/// lock from the moment the command is written until its reply has been read,
/// so concurrent callers queue up behind each other and can never receive a
/// reply meant for someone else.
pub struct StoreClient {
    /// `host:port` of the store
    addr: String,

    connect_timeout: Duration,

    command_timeout_ms: u64,

    state: Mutex<State>,
}

impl StoreClient {
    /// Connect to the store at `host:port` with default timeouts
    pub fn open(host: &str, port: u16) -> Result<Self> {
        Self::with_timeouts(
            format!("{}:{}", host, port),
            DEFAULT_COMMAND_TIMEOUT_MS,
            DEFAULT_COMMAND_TIMEOUT_MS,
        )
    }

    /// Connect using the store settings in `config`
    pub fn connect(config: &Config) -> Result<Self> {
        Self::with_timeouts(
            config.store_addr(),
            config.connect_timeout_ms,
            config.command_timeout_ms,
        )
    }

    fn with_timeouts(addr: String, connect_timeout_ms: u64, command_timeout_ms: u64) -> Result<Self> {
        let connect_timeout = Duration::from_millis(connect_timeout_ms);
        let connection = Connection::open(&addr, connect_timeout)?;

        tracing::debug!("Connected to store at {}", connection.peer_addr());

        Ok(Self {
            addr,
            connect_timeout,
            command_timeout_ms,
            state: Mutex::new(State::Ready(connection)),
        })
    }

    /// Close the connection
    ///
    /// Idempotent. Every later command fails with `NotConnected`.
    pub fn close(&self) {
        let mut state = self.state.lock();
        match std::mem::replace(&mut *state, State::Closed) {
            State::Ready(mut connection) => {
                connection.shutdown();
                tracing::debug!("Disconnected from store at {}", self.addr);
            }
            State::Poisoned => tracing::debug!("Closed poisoned store client for {}", self.addr),
            State::Closed => {}
        }
    }

    /// Whether the client is between `open` and `close`
    pub fn is_connected(&self) -> bool {
        !matches!(*self.state.lock(), State::Closed)
    }

    /// Address of the store
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Upper bound on waiting for one reply
    pub fn command_timeout_ms(&self) -> u64 {
        self.command_timeout_ms
    }

    /// Send a command and return the store's raw reply
    ///
    /// Error replies are returned as `Reply::Error`, not as `Err`. A timeout or
    /// I/O failure poisons the connection and the next call reconnects.
    pub fn execute(&self, command: &Command) -> Result<Reply> {
        let mut state = self.state.lock();

        if matches!(*state, State::Poisoned) {
            tracing::debug!("Reconnecting to store at {}", self.addr);
            *state = State::Ready(Connection::open(&self.addr, self.connect_timeout)?);
        }

        let connection = match &mut *state {
            State::Ready(connection) => connection,
            _ => return Err(GateError::NotConnected),
        };

        tracing::trace!(command = command.name(), "Sending command to {}", self.addr);

        match connection.round_trip(command, self.command_timeout_ms) {
            Ok(reply) => {
                tracing::trace!(command = command.name(), kind = reply.kind(), "Received reply");
                Ok(reply)
            }
            Err(e) => {
                if e.poisons_connection() {
                    tracing::warn!(
                        command = command.name(),
                        "Dropping store connection after failed exchange: {}",
                        e
                    );
                    *state = State::Poisoned;
                }
                Err(e)
            }
        }
    }

    // =========================================================================
    // Typed Commands
    // =========================================================================

    /// `SETEX key ttl value`
    pub fn set_ex(&self, key: &str, ttl_secs: u64, value: &[u8]) -> Result<()> {
        let command = Command::SetEx {
            key: key.as_bytes().to_vec(),
            ttl_secs,
            value: value.to_vec(),
        };
        match self.checked(&command)? {
            reply if reply.is_ok() => Ok(()),
            other => Err(unexpected(&command, &other)),
        }
    }

    /// `GET key`; `None` when the key is absent
    pub fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let command = Command::Get {
            key: key.as_bytes().to_vec(),
        };
        match self.checked(&command)? {
            Reply::Bulk(value) => Ok(value),
            other => Err(unexpected(&command, &other)),
        }
    }

    /// `DEL key`; number of keys removed
    pub fn del(&self, key: &str) -> Result<i64> {
        let command = Command::Del {
            key: key.as_bytes().to_vec(),
        };
        match self.checked(&command)? {
            Reply::Integer(n) => Ok(n),
            other => Err(unexpected(&command, &other)),
        }
    }

    /// `EXISTS key`
    pub fn exists(&self, key: &str) -> Result<bool> {
        let command = Command::Exists {
            key: key.as_bytes().to_vec(),
        };
        match self.checked(&command)? {
            Reply::Integer(n) => Ok(n == 1),
            other => Err(unexpected(&command, &other)),
        }
    }

    /// `PING`
    pub fn ping(&self) -> Result<()> {
        let command = Command::Ping;
        match self.checked(&command)? {
            Reply::Status(ref s) if s == "PONG" => Ok(()),
            other => Err(unexpected(&command, &other)),
        }
    }

    /// Execute, turning error replies into `GateError::Store`
    fn checked(&self, command: &Command) -> Result<Reply> {
        match self.execute(command)? {
            Reply::Error(message) => Err(GateError::Store(message)),
            reply => Ok(reply),
        }
    }
}

impl Drop for StoreClient {
    fn drop(&mut self) {
        self.close();
    }
}

fn unexpected(command: &Command, reply: &Reply) -> GateError {
    GateError::UnexpectedReply {
        command: command.name(),
        reply: reply.to_string(),
    }
}
