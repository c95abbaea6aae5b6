//! Service Module
//!
//! The two flows exposed to the collaborators:
//! - **issue**: the bot asks for a code for an identity
//! - **verify**: the web front end redeems a code
//!
//! ## Redemption Order
//! 1. Reject malformed codes without contacting the store
//! 2. `GET otp:{code}`; absent → `not_found`
//! 3. Logically expired → `DEL`, `expired`
//! 4. `DEL` (consume); only the caller whose `DEL` removed the key succeeds
//!
//! Every path that finds the record also deletes it, so a code is redeemed
//! at most once and a second attempt always reports `not_found`.

use std::fmt;
use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::network::StoreClient;
use crate::otp::{generate_code, is_code_expired, is_valid_code_format, CodeRecord, Identity};
use crate::store::{CodeStore, RateLimiter};

/// Message shown to end users for every failed redemption
pub const GENERIC_REJECTION: &str = "Invalid or expired code";

/// Attempts at drawing a code that is not currently live
const MAX_CODE_ATTEMPTS: usize = 3;

/// Result of the issue flow
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueOutcome {
    /// Code stored; deliver it to the user
    Issued { code: String, ttl_secs: u64 },

    /// The identity already received a code in the current window
    RateLimited,

    /// The code could not be stored
    Failed,
}

/// Why a redemption was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    InvalidFormat,
    NotFound,
    Expired,
    InternalError,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::InvalidFormat => "invalid_format",
            RejectReason::NotFound => "not_found",
            RejectReason::Expired => "expired",
            RejectReason::InternalError => "internal_error",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of the verify flow
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyOutcome {
    Verified(Identity),
    Rejected(RejectReason),
}

impl VerifyOutcome {
    pub fn is_verified(&self) -> bool {
        matches!(self, VerifyOutcome::Verified(_))
    }

    /// Text safe to show the end user; never reveals the rejection reason
    pub fn public_message(&self) -> &'static str {
        match self {
            VerifyOutcome::Verified(_) => "Code verified",
            VerifyOutcome::Rejected(_) => GENERIC_REJECTION,
        }
    }
}

/// Source of candidate codes
pub type CodeSource = Arc<dyn Fn() -> String + Send + Sync>;

/// Issues and redeems one-time codes
#[derive(Clone)]
pub struct OtpService {
    client: Arc<StoreClient>,
    codes: CodeStore,
    limiter: RateLimiter,
    clock: Arc<dyn Clock>,
    code_source: CodeSource,
    code_ttl_secs: u64,
    code_validity_ms: i64,
    rate_limit_window_ms: i64,
}

impl OtpService {
    /// Create a service on the wall clock
    pub fn new(client: Arc<StoreClient>, config: &Config) -> Self {
        Self::with_clock(client, config, Arc::new(SystemClock))
    }

    /// Create a service with an explicit time source
    pub fn with_clock(client: Arc<StoreClient>, config: &Config, clock: Arc<dyn Clock>) -> Self {
        Self {
            codes: CodeStore::new(Arc::clone(&client)),
            limiter: RateLimiter::new(Arc::clone(&client), Arc::clone(&clock)),
            client,
            clock,
            code_source: Arc::new(generate_code),
            code_ttl_secs: config.code_ttl_secs,
            code_validity_ms: config.code_validity_ms,
            rate_limit_window_ms: config.rate_limit_window_ms,
        }
    }

    /// Replace the random code generator
    pub fn with_code_source(mut self, source: CodeSource) -> Self {
        self.code_source = source;
        self
    }

    pub fn codes(&self) -> &CodeStore {
        &self.codes
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Rate-limit `identity`, then store a fresh code for it
    pub fn issue(&self, identity: &Identity) -> IssueOutcome {
        if !self.limiter.try_acquire(identity.id, self.rate_limit_window_ms) {
            tracing::info!(user_id = identity.id, "Code request rate limited");
            return IssueOutcome::RateLimited;
        }

        match self.draw_code() {
            Some(code) => self.issue_with_code(identity, &code),
            None => {
                tracing::warn!(user_id = identity.id, "Every drawn code was already live");
                IssueOutcome::Failed
            }
        }
    }

    /// Store `code` for `identity`, bypassing the rate limiter
    pub fn issue_with_code(&self, identity: &Identity, code: &str) -> IssueOutcome {
        let record = CodeRecord::new(code, identity.clone(), self.clock.now_ms(), self.code_ttl_secs);

        if !self.codes.put(code, &record, self.code_ttl_secs) {
            return IssueOutcome::Failed;
        }

        tracing::info!(
            user_id = identity.id,
            "Code issued for {}",
            identity.display_name()
        );
        IssueOutcome::Issued {
            code: code.to_string(),
            ttl_secs: self.code_ttl_secs,
        }
    }

    /// Redeem `code`
    pub fn verify(&self, code: &str) -> VerifyOutcome {
        if !is_valid_code_format(code) {
            tracing::debug!("Rejected malformed code");
            return VerifyOutcome::Rejected(RejectReason::InvalidFormat);
        }

        let record = match self.codes.lookup(code) {
            Ok(Some(record)) => record,
            Ok(None) => {
                tracing::debug!("Verification failed: code not found");
                return VerifyOutcome::Rejected(RejectReason::NotFound);
            }
            Err(e) => {
                tracing::error!("Verification failed: store error: {}", e);
                return VerifyOutcome::Rejected(RejectReason::InternalError);
            }
        };

        if is_code_expired(record.created_at, self.code_validity_ms, self.clock.now_ms()) {
            self.codes.delete(code);
            tracing::debug!("Verification failed: code expired");
            return VerifyOutcome::Rejected(RejectReason::Expired);
        }

        match self.codes.remove(code) {
            Ok(true) => {
                tracing::info!(
                    user_id = record.user.id,
                    "Verification succeeded for {}",
                    record.user.display_name()
                );
                VerifyOutcome::Verified(record.user)
            }
            // Someone else consumed it between our GET and DEL
            Ok(false) => VerifyOutcome::Rejected(RejectReason::NotFound),
            Err(e) => {
                tracing::error!("Verification failed: could not consume code: {}", e);
                VerifyOutcome::Rejected(RejectReason::InternalError)
            }
        }
    }

    /// Whether the store answers `PING`
    pub fn health(&self) -> bool {
        match self.client.ping() {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Store health check failed: {}", e);
                false
            }
        }
    }

    /// Draw a code that does not collide with a live one
    ///
    /// Every draw is checked with `EXISTS`; `None` when all of them collide.
    /// Takes the current draw when the store cannot be asked.
    fn draw_code(&self) -> Option<String> {
        for _ in 0..MAX_CODE_ATTEMPTS {
            let code = (self.code_source)();
            match self.codes.contains(&code) {
                Ok(true) => tracing::debug!("Generated code collides with a live one, redrawing"),
                Ok(false) => return Some(code),
                Err(e) => {
                    tracing::warn!("EXISTS check for new code failed: {}", e);
                    return Some(code);
                }
            }
        }
        None
    }
}
