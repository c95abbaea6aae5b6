//! Rate Limiter
//!
//! Fixed-window limiter keyed by identity. The effective policy is one
//! acquisition per window: a record still inside its window with `count >= 1`
//! denies.
//!
//! The GET / decide / SETEX sequence is not atomic on the store, so the
//! limiter holds its own lock across the whole of `try_acquire`. Clones share
//! that lock.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::clock::Clock;
use crate::network::StoreClient;
use crate::otp::RateLimitRecord;

/// Per-identity windows keyed by `rate_limit:{identity}`
#[derive(Clone)]
pub struct RateLimiter {
    client: Arc<StoreClient>,
    clock: Arc<dyn Clock>,
    gate: Arc<Mutex<()>>,
}

impl RateLimiter {
    const KEY_PREFIX: &'static str = "rate_limit:";

    pub fn new(client: Arc<StoreClient>, clock: Arc<dyn Clock>) -> Self {
        Self {
            client,
            clock,
            gate: Arc::new(Mutex::new(())),
        }
    }

    pub fn key(identity: i64) -> String {
        format!("{}{}", Self::KEY_PREFIX, identity)
    }

    /// Try to take the single slot of the current window for `identity`
    ///
    /// Fails open: a corrupt record or an unreachable store allows the
    /// request.
    pub fn try_acquire(&self, identity: i64, window_ms: i64) -> bool {
        let _guard = self.gate.lock();
        let key = Self::key(identity);
        let now = self.clock.now_ms();

        let payload = match self.client.get(&key) {
            Ok(Some(payload)) => payload,
            Ok(None) => {
                self.start_window(&key, now, window_ms);
                return true;
            }
            Err(e) => {
                tracing::warn!(identity, "Rate limit lookup failed, allowing: {}", e);
                return true;
            }
        };

        let mut record = match RateLimitRecord::from_json(&payload) {
            Ok(record) => record,
            Err(e) => {
                tracing::error!(identity, "Failed to parse rate limit record, allowing: {}", e);
                return true;
            }
        };

        if record.window_elapsed(now) {
            self.start_window(&key, now, window_ms);
            return true;
        }

        if record.count >= 1 {
            tracing::debug!(identity, reset_time = record.reset_time, "Rate limited");
            return false;
        }

        record.count += 1;
        self.write(&key, &record, ceil_secs(record.reset_time.saturating_sub(now)));
        true
    }

    fn start_window(&self, key: &str, now: i64, window_ms: i64) {
        let record = RateLimitRecord::fresh(now, window_ms);
        self.write(key, &record, ceil_secs(window_ms));
    }

    fn write(&self, key: &str, record: &RateLimitRecord, ttl_secs: u64) {
        let result = record
            .to_json()
            .and_then(|payload| self.client.set_ex(key, ttl_secs, &payload));
        if let Err(e) = result {
            tracing::warn!("Failed to write rate limit record {}: {}", key, e);
        }
    }
}

/// Milliseconds to whole seconds, rounded up, at least one
fn ceil_secs(ms: i64) -> u64 {
    let secs = (ms.max(0) as u64).div_ceil(1000);
    secs.max(1)
}
