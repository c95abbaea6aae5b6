//! One-Time Code Module
//!
//! Code generation, format and expiry checks, and the records kept in the
//! store.
//!
//! ## Key Layout
//! ```text
//! otp:{code}                 → CodeRecord JSON       (TTL = code lifetime)
//! rate_limit:{identity_id}   → RateLimitRecord JSON  (TTL = window)
//! ```

mod record;

pub use record::{CodeRecord, Identity, RateLimitRecord};

use rand::rngs::OsRng;
use rand::RngCore;

/// Number of digits in a code
pub const CODE_LEN: usize = 6;

/// Generate a 6-digit code from 3 random bytes
pub fn generate_code() -> String {
    let mut bytes = [0u8; 3];
    OsRng.fill_bytes(&mut bytes);
    let n = u32::from_be_bytes([0, bytes[0], bytes[1], bytes[2]]);
    format!("{:06}", n % 1_000_000)
}

/// Exactly six ASCII digits
pub fn is_valid_code_format(code: &str) -> bool {
    code.len() == CODE_LEN && code.bytes().all(|b| b.is_ascii_digit())
}

/// A code issued at `created_at_ms` is expired once `ttl_ms` has elapsed
pub fn is_code_expired(created_at_ms: i64, ttl_ms: i64, now_ms: i64) -> bool {
    now_ms.saturating_sub(created_at_ms) >= ttl_ms
}
