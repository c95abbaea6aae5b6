//! Store Connection
//!
//! One TCP connection to the store, carrying one request/reply exchange at a
//! time.

use std::io::{self, BufWriter, Read};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use bytes::BytesMut;

use crate::error::{GateError, Result};
use crate::protocol::{read_reply, write_command, Command, Reply};

/// A single connection to the store
pub struct Connection {
    /// Read half; replies are accumulated in `buffer`
    stream: TcpStream,

    /// Write half (buffered so each command goes out in one write)
    writer: BufWriter<TcpStream>,

    /// Bytes received but not yet decoded
    buffer: BytesMut,

    /// Peer address for logging
    peer_addr: String,
}

impl Connection {
    /// Connect to `addr`, trying every resolved address in turn
    pub fn open(addr: &str, connect_timeout: Duration) -> Result<Self> {
        let connection_error = |source: io::Error| GateError::Connection {
            addr: addr.to_string(),
            source,
        };

        let mut last_err = None;
        for sock_addr in addr.to_socket_addrs().map_err(connection_error)? {
            match TcpStream::connect_timeout(&sock_addr, connect_timeout) {
                Ok(stream) => {
                    return Self::new(stream).map_err(|e| match e {
                        GateError::Io(source) => connection_error(source),
                        other => other,
                    })
                }
                Err(e) => {
                    tracing::debug!("Connect to {} failed: {}", sock_addr, e);
                    last_err = Some(e);
                }
            }
        }

        Err(connection_error(last_err.unwrap_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "address resolved to nothing")
        })))
    }

    /// Wrap an established stream
    pub fn new(stream: TcpStream) -> Result<Self> {
        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        // Disable Nagle's algorithm for low latency
        stream.set_nodelay(true)?;

        let write_stream = stream.try_clone()?;

        Ok(Self {
            stream,
            writer: BufWriter::new(write_stream),
            buffer: BytesMut::with_capacity(4096),
            peer_addr,
        })
    }

    /// Send one command and wait for its reply
    ///
    /// The whole exchange (write and read) must finish within `timeout_ms`.
    pub fn round_trip(&mut self, command: &Command, timeout_ms: u64) -> Result<Reply> {
        let timeout = Duration::from_millis(timeout_ms);
        let deadline = Instant::now() + timeout;

        self.writer.get_ref().set_write_timeout(Some(timeout))?;
        write_command(&mut self.writer, command).map_err(|e| into_timeout(e, timeout_ms))?;

        let mut reader = DeadlineReader {
            stream: &self.stream,
            deadline,
        };
        let reply =
            read_reply(&mut reader, &mut self.buffer).map_err(|e| into_timeout(e, timeout_ms))?;

        if !self.buffer.is_empty() {
            tracing::warn!(
                "Discarding {} unsolicited bytes from {}",
                self.buffer.len(),
                self.peer_addr
            );
            self.buffer.clear();
        }

        Ok(reply)
    }

    /// Close both halves of the socket
    pub fn shutdown(&mut self) {
        let _ = self.stream.shutdown(std::net::Shutdown::Both);
    }

    /// Get the peer address string
    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }
}

/// Reader that fails with `TimedOut` once `deadline` has passed
struct DeadlineReader<'a> {
    stream: &'a TcpStream,
    deadline: Instant,
}

impl Read for DeadlineReader<'_> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        let remaining = self.deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "reply deadline elapsed"));
        }
        self.stream.set_read_timeout(Some(remaining))?;
        let mut stream = self.stream;
        stream.read(out)
    }
}

fn into_timeout(err: GateError, timeout_ms: u64) -> GateError {
    match err {
        // Unix reports an elapsed socket timeout as WouldBlock, Windows as TimedOut
        GateError::Io(ref e)
            if matches!(
                e.kind(),
                io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
            ) =>
        {
            GateError::Timeout(timeout_ms)
        }
        other => other,
    }
}
