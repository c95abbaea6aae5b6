//! Network Module
//!
//! Client side of the store connection.
//!
//! ## Architecture
//! - `Connection`: one TCP socket, one request/reply exchange at a time
//! - `StoreClient`: owns the connection, serializes callers behind a mutex,
//!   reconnects after a timed-out or broken exchange

mod connection;
mod client;

pub use connection::Connection;
pub use client::{StoreClient, DEFAULT_COMMAND_TIMEOUT_MS};
