//! Codec Tests
//!
//! Tests for command encoding and reply decoding.

use std::io::{self, Cursor, Read};

use bytes::BytesMut;
use otpgate::protocol::{
    decode_command, decode_reply, encode_command, encode_reply, read_command, read_reply,
    write_command, Command, Reply,
};
use otpgate::GateError;

/// Reader that hands out at most one byte per call
struct Trickle<'a> {
    bytes: &'a [u8],
}

impl Read for Trickle<'_> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if self.bytes.is_empty() || out.is_empty() {
            return Ok(0);
        }
        out[0] = self.bytes[0];
        self.bytes = &self.bytes[1..];
        Ok(1)
    }
}

// =============================================================================
// Command Encoding
// =============================================================================

#[test]
fn test_encode_get() {
    let cmd = Command::Get {
        key: b"otp:482913".to_vec(),
    };
    assert_eq!(
        encode_command(&cmd),
        b"*2\r\n$3\r\nGET\r\n$10\r\notp:482913\r\n".to_vec()
    );
}

#[test]
fn test_encode_setex() {
    let cmd = Command::SetEx {
        key: b"k".to_vec(),
        ttl_secs: 300,
        value: br#"{"a":"b c"}"#.to_vec(),
    };
    assert_eq!(
        encode_command(&cmd),
        b"*4\r\n$5\r\nSETEX\r\n$1\r\nk\r\n$3\r\n300\r\n$11\r\n{\"a\":\"b c\"}\r\n".to_vec()
    );
}

#[test]
fn test_encode_ping() {
    assert_eq!(encode_command(&Command::Ping), b"*1\r\n$4\r\nPING\r\n".to_vec());
}

#[test]
fn test_value_with_crlf_survives_framing() {
    let cmd = Command::SetEx {
        key: b"key".to_vec(),
        ttl_secs: 1,
        value: b"line one\r\nline two".to_vec(),
    };
    let encoded = encode_command(&cmd);
    let (decoded, consumed) = decode_command(&encoded).unwrap().unwrap();

    assert_eq!(decoded, cmd);
    assert_eq!(consumed, encoded.len());
}

#[test]
fn test_write_command_to_stream() {
    let mut out = Vec::new();
    write_command(&mut out, &Command::Del { key: b"x".to_vec() }).unwrap();
    assert_eq!(out, b"*2\r\n$3\r\nDEL\r\n$1\r\nx\r\n".to_vec());
}

// =============================================================================
// Command Decoding
// =============================================================================

#[test]
fn test_decode_command_ignores_case() {
    let (cmd, _) = decode_command(b"*2\r\n$6\r\nexists\r\n$1\r\nk\r\n")
        .unwrap()
        .unwrap();
    assert_eq!(cmd, Command::Exists { key: b"k".to_vec() });
}

#[test]
fn test_decode_command_wrong_arity() {
    let result = decode_command(b"*3\r\n$3\r\nGET\r\n$1\r\na\r\n$1\r\nb\r\n");
    assert!(matches!(result, Err(GateError::Protocol(_))));
}

#[test]
fn test_decode_command_unknown_name() {
    let result = decode_command(b"*1\r\n$5\r\nFLUSH\r\n");
    assert!(matches!(result, Err(GateError::Protocol(_))));
}

#[test]
fn test_decode_command_bad_ttl() {
    let result = decode_command(b"*4\r\n$5\r\nSETEX\r\n$1\r\nk\r\n$2\r\n-1\r\n$1\r\nv\r\n");
    assert!(matches!(result, Err(GateError::Protocol(_))));
}

#[test]
fn test_decode_command_incomplete() {
    let full = encode_command(&Command::Get { key: b"abc".to_vec() });
    for cut in 0..full.len() {
        assert!(
            decode_command(&full[..cut]).unwrap().is_none(),
            "prefix of {} bytes should be incomplete",
            cut
        );
    }
}

#[test]
fn test_read_command_clean_eof() {
    let mut reader = Cursor::new(Vec::new());
    let mut buf = BytesMut::new();
    assert!(read_command(&mut reader, &mut buf).unwrap().is_none());
}

#[test]
fn test_read_command_eof_mid_frame() {
    let mut reader = Cursor::new(b"*2\r\n$3\r\nGET".to_vec());
    let mut buf = BytesMut::new();
    let result = read_command(&mut reader, &mut buf);
    assert!(matches!(result, Err(GateError::Io(ref e)) if e.kind() == io::ErrorKind::UnexpectedEof));
}

// =============================================================================
// Reply Decoding
// =============================================================================

#[test]
fn test_decode_status() {
    let (reply, consumed) = decode_reply(b"+OK\r\n").unwrap().unwrap();
    assert!(reply.is_ok());
    assert_eq!(consumed, 5);
}

#[test]
fn test_decode_error() {
    let (reply, _) = decode_reply(b"-ERR wrong number of arguments\r\n")
        .unwrap()
        .unwrap();
    assert_eq!(reply, Reply::Error("ERR wrong number of arguments".to_string()));
}

#[test]
fn test_decode_integer() {
    assert_eq!(decode_reply(b":1\r\n").unwrap().unwrap().0, Reply::Integer(1));
    assert_eq!(decode_reply(b":0\r\n").unwrap().unwrap().0, Reply::Integer(0));
    assert_eq!(decode_reply(b":-7\r\n").unwrap().unwrap().0, Reply::Integer(-7));
}

#[test]
fn test_decode_nil_is_not_empty_string() {
    let (nil, _) = decode_reply(b"$-1\r\n").unwrap().unwrap();
    let (empty, _) = decode_reply(b"$0\r\n\r\n").unwrap().unwrap();

    assert_eq!(nil, Reply::Bulk(None));
    assert!(nil.is_nil());
    assert_eq!(empty, Reply::Bulk(Some(Vec::new())));
    assert!(!empty.is_nil());
}

#[test]
fn test_decode_bulk_with_json_payload() {
    let payload = br#"{"code":"482913","user":{"id":42}}"#;
    let mut frame = format!("${}\r\n", payload.len()).into_bytes();
    frame.extend_from_slice(payload);
    frame.extend_from_slice(b"\r\n");

    let (reply, consumed) = decode_reply(&frame).unwrap().unwrap();
    assert_eq!(reply, Reply::bulk(payload.to_vec()));
    assert_eq!(consumed, frame.len());
}

#[test]
fn test_decode_leaves_trailing_bytes() {
    let (reply, consumed) = decode_reply(b":1\r\n+OK\r\n").unwrap().unwrap();
    assert_eq!(reply, Reply::Integer(1));
    assert_eq!(consumed, 4);
}

#[test]
fn test_decode_nested_array() {
    let bytes = b"*3\r\n:1\r\n$-1\r\n*1\r\n+PONG\r\n";
    let (reply, consumed) = decode_reply(bytes).unwrap().unwrap();

    assert_eq!(
        reply,
        Reply::Array(Some(vec![
            Reply::Integer(1),
            Reply::Bulk(None),
            Reply::Array(Some(vec![Reply::Status("PONG".to_string())])),
        ]))
    );
    assert_eq!(consumed, bytes.len());
}

#[test]
fn test_decode_partial_replies_are_incomplete() {
    let partials: [&[u8]; 8] = [
        b"",
        b"+O",
        b"+OK\r",
        b":12",
        b"$5\r\nhel",
        b"$5\r\nhello",
        b"$5\r\nhello\r",
        b"*2\r\n:1\r\n",
    ];
    for partial in partials {
        assert!(
            decode_reply(partial).unwrap().is_none(),
            "{:?} should be incomplete",
            String::from_utf8_lossy(partial)
        );
    }
}

#[test]
fn test_decode_malformed_replies() {
    let malformed: [&[u8]; 6] = [
        b"?what\r\n",
        b":twelve\r\n",
        b"$abc\r\n",
        b"$-2\r\n",
        b"$3\r\nabcXY",
        b"*-5\r\n",
    ];
    for bytes in malformed {
        assert!(
            matches!(decode_reply(bytes), Err(GateError::Protocol(_))),
            "{:?} should be rejected",
            String::from_utf8_lossy(bytes)
        );
    }
}

#[test]
fn test_encode_reply_matches_wire_format() {
    assert_eq!(encode_reply(&Reply::ok()), b"+OK\r\n".to_vec());
    assert_eq!(encode_reply(&Reply::nil()), b"$-1\r\n".to_vec());
    assert_eq!(encode_reply(&Reply::Integer(1)), b":1\r\n".to_vec());
    assert_eq!(encode_reply(&Reply::bulk("hi")), b"$2\r\nhi\r\n".to_vec());
    assert_eq!(encode_reply(&Reply::error("ERR no")), b"-ERR no\r\n".to_vec());
}

// =============================================================================
// Stream-based Reading
// =============================================================================

#[test]
fn test_read_reply_across_many_reads() {
    let bytes = b"$11\r\nhello world\r\n";
    let mut reader = Trickle { bytes };
    let mut buf = BytesMut::new();

    let reply = read_reply(&mut reader, &mut buf).unwrap();
    assert_eq!(reply, Reply::bulk("hello world"));
    assert!(buf.is_empty());
}

#[test]
fn test_read_reply_keeps_following_frame_buffered() {
    let mut reader = Cursor::new(b"+OK\r\n:3\r\n".to_vec());
    let mut buf = BytesMut::new();

    assert!(read_reply(&mut reader, &mut buf).unwrap().is_ok());
    assert_eq!(&buf[..], b":3\r\n");
    assert_eq!(read_reply(&mut reader, &mut buf).unwrap(), Reply::Integer(3));
}

#[test]
fn test_read_reply_eof() {
    let mut reader = Cursor::new(b"$5\r\nhe".to_vec());
    let mut buf = BytesMut::new();
    let result = read_reply(&mut reader, &mut buf);
    assert!(matches!(result, Err(GateError::Io(ref e)) if e.kind() == io::ErrorKind::UnexpectedEof));
}
