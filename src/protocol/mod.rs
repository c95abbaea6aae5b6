//! Protocol Module
//!
//! Wire protocol spoken with the Redis-compatible store (RESP).
//!
//! ## Commands
//! - `SETEX key ttl value` - store a value with an expiry
//! - `GET key`             - bulk string or nil
//! - `DEL key`             - integer count of removed keys
//! - `EXISTS key`          - integer count of existing keys
//! - `PING`                - `+PONG`
//!
//! ## Reply Types
//! - `+` status, `-` error, `:` integer, `$` bulk string, `*` array
//! - `$-1` is the nil marker and decodes to an absent value, never to an
//!   empty string

mod command;
mod reply;
mod codec;

pub use command::{Command, CommandType};
pub use reply::Reply;
pub use codec::{
    decode_command, decode_reply, encode_command, encode_reply, read_command, read_reply,
    write_command, write_reply, MAX_BULK_LEN,
};
