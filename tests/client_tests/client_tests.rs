//! Tests for StoreClient
//!
//! These tests verify:
//! - Typed commands against a live (fake) store
//! - Connection lifecycle (open/close)
//! - Timeouts and reconnect after a poisoned exchange
//! - Single-outstanding-request discipline under concurrent callers

#[path = "../common/mod.rs"]
mod common;

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use common::{closed_port, FakeStore};
use otpgate::protocol::{Command, Reply};
use otpgate::{GateError, StoreClient};

// =============================================================================
// Basic Operations
// =============================================================================

#[test]
fn test_ping() {
    let store = FakeStore::start();
    let client = store.client();

    client.ping().unwrap();
}

#[test]
fn test_set_get_del_exists() {
    let store = FakeStore::start();
    let client = store.client();

    client.set_ex("greeting", 60, b"hello world").unwrap();

    assert_eq!(client.get("greeting").unwrap(), Some(b"hello world".to_vec()));
    assert!(client.exists("greeting").unwrap());
    assert_eq!(client.del("greeting").unwrap(), 1);
    assert_eq!(client.del("greeting").unwrap(), 0);
    assert!(!client.exists("greeting").unwrap());
}

#[test]
fn test_get_missing_key_is_none() {
    let store = FakeStore::start();
    let client = store.client();

    assert_eq!(client.get("nothing-here").unwrap(), None);
}

#[test]
fn test_get_empty_value_is_not_none() {
    let store = FakeStore::start();
    let client = store.client();

    client.set_ex("empty", 60, b"").unwrap();
    assert_eq!(client.get("empty").unwrap(), Some(Vec::new()));
}

#[test]
fn test_set_ex_applies_ttl() {
    let store = FakeStore::start();
    let client = store.client();

    client.set_ex("short", 30, b"v").unwrap();

    let ttl = store.ttl("short").unwrap();
    assert!(ttl <= Duration::from_secs(30));
    assert!(ttl > Duration::from_secs(25));
}

#[test]
fn test_execute_returns_raw_reply() {
    let store = FakeStore::start();
    let client = store.client();

    let reply = client
        .execute(&Command::Get {
            key: b"missing".to_vec(),
        })
        .unwrap();
    assert_eq!(reply, Reply::Bulk(None));
}

#[test]
fn test_error_reply_becomes_store_error() {
    let store = FakeStore::start();
    let client = store.client();

    // The store rejects a zero TTL
    let result = client.set_ex("k", 0, b"v");
    assert!(matches!(result, Err(GateError::Store(ref msg)) if msg.contains("invalid expire time")));

    // The connection stays usable after an error reply
    client.ping().unwrap();
    assert_eq!(store.connection_count(), 1);
}

// =============================================================================
// Lifecycle Tests
// =============================================================================

#[test]
fn test_open_with_host_and_port() {
    let store = FakeStore::start();
    let client = StoreClient::open("127.0.0.1", store.port()).unwrap();

    assert!(client.is_connected());
    assert_eq!(client.command_timeout_ms(), 5000);
    client.ping().unwrap();
}

#[test]
fn test_connect_refused() {
    let result = StoreClient::open("127.0.0.1", closed_port());
    assert!(matches!(result, Err(GateError::Connection { .. })));
}

#[test]
fn test_commands_fail_after_close() {
    let store = FakeStore::start();
    let client = store.client();

    client.close();

    assert!(!client.is_connected());
    assert!(matches!(client.ping(), Err(GateError::NotConnected)));
    assert!(matches!(client.get("k"), Err(GateError::NotConnected)));
}

#[test]
fn test_close_is_idempotent() {
    let store = FakeStore::start();
    let client = store.client();

    client.close();
    client.close();

    assert!(matches!(client.ping(), Err(GateError::NotConnected)));
}

// =============================================================================
// Timeout Tests
// =============================================================================

#[test]
fn test_timeout_when_store_does_not_answer() {
    let store = FakeStore::start();
    let client = store.client_with_timeout(200);

    store.set_silent(true);

    let started = Instant::now();
    let result = client.get("k");

    assert!(matches!(result, Err(GateError::Timeout(200))));
    assert!(started.elapsed() >= Duration::from_millis(150));
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[test]
fn test_reconnects_after_timeout() {
    let store = FakeStore::start();
    let client = store.client_with_timeout(200);

    store.set_silent(true);
    assert!(matches!(client.ping(), Err(GateError::Timeout(_))));

    store.set_silent(false);
    client.ping().unwrap();

    assert_eq!(store.connection_count(), 2);
    assert!(client.is_connected());
}

#[test]
fn test_late_reply_is_not_misattributed() {
    let store = FakeStore::start();
    let client = store.client_with_timeout(200);

    client.set_ex("first", 60, b"one").unwrap();
    client.set_ex("second", 60, b"two").unwrap();

    // The reply to this GET arrives after the client gave up on it
    store.set_delay_ms(600);
    assert!(matches!(client.get("first"), Err(GateError::Timeout(_))));
    store.set_delay_ms(0);

    assert_eq!(client.get("second").unwrap(), Some(b"two".to_vec()));

    // Give the stale reply time to arrive, then check again
    thread::sleep(Duration::from_millis(600));
    assert_eq!(client.get("second").unwrap(), Some(b"two".to_vec()));
}

#[test]
fn test_close_after_timeout() {
    let store = FakeStore::start();
    let client = store.client_with_timeout(100);

    store.set_silent(true);
    assert!(client.ping().is_err());

    client.close();
    store.set_silent(false);
    assert!(matches!(client.ping(), Err(GateError::NotConnected)));
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_concurrent_callers_get_their_own_replies() {
    let store = FakeStore::start();
    let client = store.client();

    for i in 0..16 {
        client
            .set_ex(&format!("key:{}", i), 60, format!("value:{}", i).as_bytes())
            .unwrap();
    }

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let client = Arc::clone(&client);
            thread::spawn(move || {
                for _ in 0..25 {
                    let value = client.get(&format!("key:{}", i)).unwrap();
                    assert_eq!(value, Some(format!("value:{}", i).into_bytes()));
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    // All of it went over the single connection
    assert_eq!(store.connection_count(), 1);
}
