//! Records persisted in the store
//!
//! All records are stored as JSON; field names match what the bot and the web
//! front end already exchange.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// The messaging-app user a code is issued to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Opaque numeric user id
    pub id: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
}

impl Identity {
    pub fn new(id: i64) -> Self {
        Self {
            id,
            username: None,
            first_name: None,
            last_name: None,
            full_name: None,
        }
    }

    /// Fill `full_name` from the first and last names
    ///
    /// Missing parts are skipped; an identity with neither keeps `None`.
    pub fn with_full_name(mut self) -> Self {
        let parts: Vec<&str> = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|part| !part.is_empty())
            .collect();

        self.full_name = if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        };
        self
    }

    /// Best human-readable name for log lines
    pub fn display_name(&self) -> String {
        self.full_name
            .clone()
            .or_else(|| self.username.as_ref().map(|u| format!("@{}", u)))
            .unwrap_or_else(|| self.id.to_string())
    }
}

/// An issued one-time code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeRecord {
    pub code: String,

    pub user: Identity,

    /// Issue time (ms since epoch)
    pub created_at: i64,

    /// Store-side expiry (ms since epoch), informational
    pub expires_at: i64,
}

impl CodeRecord {
    pub fn new(code: impl Into<String>, user: Identity, now_ms: i64, ttl_secs: u64) -> Self {
        Self {
            code: code.into(),
            user,
            created_at: now_ms,
            expires_at: now_ms.saturating_add(
                i64::try_from(ttl_secs)
                    .unwrap_or(i64::MAX)
                    .saturating_mul(1000),
            ),
        }
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Fixed-window counter for one identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitRecord {
    pub count: u32,

    /// End of the window (ms since epoch)
    pub reset_time: i64,
}

impl RateLimitRecord {
    /// First request of a new window
    pub fn fresh(now_ms: i64, window_ms: i64) -> Self {
        Self {
            count: 1,
            reset_time: now_ms.saturating_add(window_ms),
        }
    }

    pub fn window_elapsed(&self, now_ms: i64) -> bool {
        now_ms > self.reset_time
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
