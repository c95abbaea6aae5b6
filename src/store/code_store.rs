//! Code Store
//!
//! Create, fetch and delete one-time code records. `put`, `get` and `delete`
//! never fail: errors are logged and reported as `false` / absent. `lookup`
//! and `remove` return store errors for callers that must tell an outage
//! apart from a missing code.

use std::sync::Arc;

use crate::error::Result;
use crate::network::StoreClient;
use crate::otp::CodeRecord;

/// Code records keyed by `otp:{code}`
#[derive(Clone)]
pub struct CodeStore {
    client: Arc<StoreClient>,
}

impl CodeStore {
    const KEY_PREFIX: &'static str = "otp:";

    pub fn new(client: Arc<StoreClient>) -> Self {
        Self { client }
    }

    pub fn key(code: &str) -> String {
        format!("{}{}", Self::KEY_PREFIX, code)
    }

    /// Store `record` under `code` for `ttl_secs`
    pub fn put(&self, code: &str, record: &CodeRecord, ttl_secs: u64) -> bool {
        let payload = match record.to_json() {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!("Failed to serialize code record: {}", e);
                return false;
            }
        };

        match self.client.set_ex(&Self::key(code), ttl_secs, &payload) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("SETEX for code record failed: {}", e);
                false
            }
        }
    }

    /// Fetch the record for `code`
    ///
    /// Absent when the key does not exist, when the payload is corrupt, or
    /// when the store cannot be reached.
    pub fn get(&self, code: &str) -> Option<CodeRecord> {
        match self.lookup(code) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!("GET for code record failed: {}", e);
                None
            }
        }
    }

    /// Like `get`, but store failures are returned instead of logged
    ///
    /// A corrupt payload is still treated as absent.
    pub fn lookup(&self, code: &str) -> Result<Option<CodeRecord>> {
        let payload = match self.client.get(&Self::key(code))? {
            Some(payload) => payload,
            None => return Ok(None),
        };

        match CodeRecord::from_json(&payload) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                tracing::error!("Failed to parse code record: {}", e);
                Ok(None)
            }
        }
    }

    /// Delete the record for `code`; true iff exactly one key was removed
    pub fn delete(&self, code: &str) -> bool {
        match self.remove(code) {
            Ok(removed) => removed,
            Err(e) => {
                tracing::warn!("DEL for code record failed: {}", e);
                false
            }
        }
    }

    /// Like `delete`, but store failures are returned instead of logged
    pub fn remove(&self, code: &str) -> Result<bool> {
        Ok(self.client.del(&Self::key(code))? == 1)
    }

    /// Whether a record for `code` is currently stored
    pub fn contains(&self, code: &str) -> Result<bool> {
        self.client.exists(&Self::key(code))
    }
}
