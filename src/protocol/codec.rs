//! Protocol codec
//!
//! Encoding and decoding functions for the store's wire protocol (RESP).
//!
//! ## Wire Format
//!
//! ### Request (Command) Format
//! Every command is sent as a multi-bulk frame, one bulk string per word of
//! the command line. `GET otp:482913` becomes:
//! ```text
//! *2\r\n
//! $3\r\nGET\r\n
//! $10\r\notp:482913\r\n
//! ```
//!
//! ### Reply Format
//! ```text
//! +OK\r\n                  status
//! -ERR message\r\n         error
//! :1\r\n                   integer
//! $5\r\nhello\r\n          bulk string
//! $-1\r\n                  nil bulk string (absent value)
//! *2\r\n...                array of replies
//! ```

use std::io::{self, Read, Write};

use bytes::{Buf, BufMut, BytesMut};

use super::{Command, CommandType, Reply};
use crate::error::{GateError, Result};

/// Line terminator
pub const CRLF: &[u8] = b"\r\n";

/// Maximum bulk string size (16 MB)
pub const MAX_BULK_LEN: usize = 16 * 1024 * 1024;

/// Maximum number of elements in one array reply
pub const MAX_ARRAY_LEN: usize = 1024 * 1024;

/// Maximum nesting of array replies
const MAX_DEPTH: usize = 8;

/// Bytes pulled from the socket per read call
const READ_CHUNK: usize = 4096;

// =============================================================================
// Command Encoding/Decoding
// =============================================================================

/// Encode a command as a multi-bulk frame
pub fn encode_command(command: &Command) -> Vec<u8> {
    let args = command.args();
    let payload_len: usize = args.iter().map(|arg| arg.len() + 16).sum();

    let mut buf = BytesMut::with_capacity(16 + payload_len);
    put_header(&mut buf, b'*', args.len() as i64);
    for arg in &args {
        put_bulk(&mut buf, arg);
    }

    buf.to_vec()
}

/// Decode a command from the front of `bytes`
///
/// Returns `Ok(None)` while the frame is incomplete, otherwise the command and
/// the number of bytes consumed.
pub fn decode_command(bytes: &[u8]) -> Result<Option<(Command, usize)>> {
    let (frame, consumed) = match decode_reply(bytes)? {
        Some(decoded) => decoded,
        None => return Ok(None),
    };

    let items = match frame {
        Reply::Array(Some(items)) if !items.is_empty() => items,
        other => {
            return Err(GateError::Protocol(format!(
                "Expected a non-empty command array, got {}",
                other
            )))
        }
    };

    let mut args = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Reply::Bulk(Some(arg)) => args.push(arg),
            other => {
                return Err(GateError::Protocol(format!(
                    "Command arguments must be bulk strings, got {}",
                    other
                )))
            }
        }
    }

    Ok(Some((command_from_args(&args)?, consumed)))
}

fn command_from_args(args: &[Vec<u8>]) -> Result<Command> {
    let (name, rest) = match args.split_first() {
        Some(split) => split,
        None => return Err(GateError::Protocol("Empty command".to_string())),
    };

    let command_type = CommandType::from_name(name).ok_or_else(|| {
        GateError::Protocol(format!(
            "Unknown command: {}",
            String::from_utf8_lossy(name)
        ))
    })?;

    let command = match (command_type, rest) {
        (CommandType::SetEx, [key, ttl, value]) => Command::SetEx {
            key: key.clone(),
            ttl_secs: parse_int(ttl)?,
            value: value.clone(),
        },
        (CommandType::Get, [key]) => Command::Get { key: key.clone() },
        (CommandType::Del, [key]) => Command::Del { key: key.clone() },
        (CommandType::Exists, [key]) => Command::Exists { key: key.clone() },
        (CommandType::Ping, []) => Command::Ping,
        (command_type, rest) => {
            return Err(GateError::Protocol(format!(
                "Wrong number of arguments for {}: {}",
                command_type.name(),
                rest.len()
            )))
        }
    };

    Ok(command)
}

// =============================================================================
// Reply Encoding/Decoding
// =============================================================================

/// Encode a reply to bytes
pub fn encode_reply(reply: &Reply) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(64);
    put_reply(&mut buf, reply);
    buf.to_vec()
}

fn put_reply(buf: &mut BytesMut, reply: &Reply) {
    match reply {
        Reply::Status(status) => put_line(buf, b'+', status.as_bytes()),
        Reply::Error(message) => put_line(buf, b'-', message.as_bytes()),
        Reply::Integer(n) => put_header(buf, b':', *n),
        Reply::Bulk(None) => put_header(buf, b'$', -1),
        Reply::Bulk(Some(bytes)) => put_bulk(buf, bytes),
        Reply::Array(None) => put_header(buf, b'*', -1),
        Reply::Array(Some(items)) => {
            put_header(buf, b'*', items.len() as i64);
            for item in items {
                put_reply(buf, item);
            }
        }
    }
}

/// Decode one reply from the front of `bytes`
///
/// Partial input is not an error: `Ok(None)` means more bytes are needed.
/// On success returns the reply and the number of bytes it occupied.
pub fn decode_reply(bytes: &[u8]) -> Result<Option<(Reply, usize)>> {
    decode_at(bytes, 0, 0)
}

fn decode_at(bytes: &[u8], pos: usize, depth: usize) -> Result<Option<(Reply, usize)>> {
    let prefix = match bytes.get(pos) {
        Some(&b) => b,
        None => return Ok(None),
    };

    if !matches!(prefix, b'+' | b'-' | b':' | b'$' | b'*') {
        return Err(GateError::Protocol(format!(
            "Unknown reply type prefix: 0x{:02x}",
            prefix
        )));
    }

    let line_end = match find_crlf(bytes, pos + 1) {
        Some(end) => end,
        None => return Ok(None),
    };
    let line = &bytes[pos + 1..line_end];
    let next = line_end + CRLF.len();

    match prefix {
        b'+' => Ok(Some((Reply::Status(utf8(line)?), next))),
        b'-' => Ok(Some((Reply::Error(utf8(line)?), next))),
        b':' => Ok(Some((Reply::Integer(parse_int(line)?), next))),
        b'$' => {
            let len: i64 = parse_int(line)?;
            if len == -1 {
                return Ok(Some((Reply::Bulk(None), next)));
            }
            if len < 0 || len as usize > MAX_BULK_LEN {
                return Err(GateError::Protocol(format!(
                    "Invalid bulk string length: {}",
                    len
                )));
            }

            let end = next + len as usize;
            if bytes.len() < end + CRLF.len() {
                return Ok(None);
            }
            if &bytes[end..end + CRLF.len()] != CRLF {
                return Err(GateError::Protocol(
                    "Bulk string is missing its CRLF terminator".to_string(),
                ));
            }

            Ok(Some((
                Reply::Bulk(Some(bytes[next..end].to_vec())),
                end + CRLF.len(),
            )))
        }
        _ => {
            let count: i64 = parse_int(line)?;
            if count == -1 {
                return Ok(Some((Reply::Array(None), next)));
            }
            if count < 0 || count as usize > MAX_ARRAY_LEN {
                return Err(GateError::Protocol(format!(
                    "Invalid array length: {}",
                    count
                )));
            }
            if depth >= MAX_DEPTH {
                return Err(GateError::Protocol(format!(
                    "Array nesting deeper than {}",
                    MAX_DEPTH
                )));
            }

            let count = count as usize;
            let mut items = Vec::with_capacity(count.min(64));
            let mut cursor = next;
            for _ in 0..count {
                match decode_at(bytes, cursor, depth + 1)? {
                    Some((item, end)) => {
                        items.push(item);
                        cursor = end;
                    }
                    None => return Ok(None),
                }
            }

            Ok(Some((Reply::Array(Some(items)), cursor)))
        }
    }
}

// =============================================================================
// Stream-based I/O helpers
// =============================================================================

/// Read one complete reply from a stream
///
/// Bytes are accumulated in `buf` until the first complete frame is
/// available. Bytes past that frame stay in `buf`.
pub fn read_reply<R: Read>(reader: &mut R, buf: &mut BytesMut) -> Result<Reply> {
    loop {
        if let Some((reply, consumed)) = decode_reply(&buf[..])? {
            buf.advance(consumed);
            return Ok(reply);
        }
        fill(reader, buf)?;
    }
}

/// Write a command to a stream
pub fn write_command<W: Write>(writer: &mut W, command: &Command) -> Result<()> {
    let bytes = encode_command(command);
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}

/// Read one complete command from a stream
///
/// Returns `Ok(None)` when the peer closes the stream between commands.
pub fn read_command<R: Read>(reader: &mut R, buf: &mut BytesMut) -> Result<Option<Command>> {
    loop {
        if let Some((command, consumed)) = decode_command(&buf[..])? {
            buf.advance(consumed);
            return Ok(Some(command));
        }
        match fill(reader, buf) {
            Ok(()) => {}
            Err(GateError::Io(ref e))
                if e.kind() == io::ErrorKind::UnexpectedEof && buf.is_empty() =>
            {
                return Ok(None)
            }
            Err(e) => return Err(e),
        }
    }
}

/// Write a reply to a stream
pub fn write_reply<W: Write>(writer: &mut W, reply: &Reply) -> Result<()> {
    let bytes = encode_reply(reply);
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}

fn fill<R: Read>(reader: &mut R, buf: &mut BytesMut) -> Result<()> {
    let mut chunk = [0u8; READ_CHUNK];
    loop {
        match reader.read(&mut chunk) {
            Ok(0) => {
                return Err(GateError::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed by peer",
                )))
            }
            Ok(n) => {
                buf.extend_from_slice(&chunk[..n]);
                return Ok(());
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn put_header(buf: &mut BytesMut, prefix: u8, n: i64) {
    put_line(buf, prefix, n.to_string().as_bytes());
}

fn put_line(buf: &mut BytesMut, prefix: u8, line: &[u8]) {
    buf.put_u8(prefix);
    buf.put_slice(line);
    buf.put_slice(CRLF);
}

fn put_bulk(buf: &mut BytesMut, bytes: &[u8]) {
    put_header(buf, b'$', bytes.len() as i64);
    buf.put_slice(bytes);
    buf.put_slice(CRLF);
}

fn find_crlf(bytes: &[u8], from: usize) -> Option<usize> {
    if from >= bytes.len() {
        return None;
    }
    bytes[from..]
        .windows(CRLF.len())
        .position(|window| window == CRLF)
        .map(|offset| from + offset)
}

fn utf8(line: &[u8]) -> Result<String> {
    String::from_utf8(line.to_vec())
        .map_err(|_| GateError::Protocol("Reply line is not valid UTF-8".to_string()))
}

fn parse_int<T: std::str::FromStr>(line: &[u8]) -> Result<T> {
    std::str::from_utf8(line)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| {
            GateError::Protocol(format!(
                "Invalid integer: {:?}",
                String::from_utf8_lossy(line)
            ))
        })
}
