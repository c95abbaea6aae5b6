//! # otpgate
//!
//! One-time code issuing and redemption on top of a Redis-compatible store:
//! - Minimal RESP client over a single persistent connection
//! - Single-use, time-bounded code records
//! - Fixed-window rate limiting per identity
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────┐        ┌──────────────────────┐
//! │   Messaging bot      │        │   Web front end      │
//! │   (issue code)       │        │   (verify code)      │
//! └──────────┬───────────┘        └───────────┬──────────┘
//!            │                                │
//! ┌──────────▼────────────────────────────────▼──────────┐
//! │                     OtpService                        │
//! └──────────┬────────────────────────────────┬──────────┘
//!            │                                │
//!     ┌──────▼──────┐                  ┌──────▼──────┐
//!     │ RateLimiter │                  │  CodeStore  │
//!     └──────┬──────┘                  └──────┬──────┘
//!            └───────────────┬────────────────┘
//!                     ┌──────▼──────┐
//!                     │ StoreClient │  one command in flight
//!                     └──────┬──────┘
//!                            │ RESP over TCP
//!                     ┌──────▼──────┐
//!                     │    Store    │
//!                     └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;
pub mod clock;

pub mod protocol;
pub mod network;
pub mod otp;
pub mod store;
pub mod service;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{GateError, Result};
pub use config::Config;
pub use clock::{Clock, ManualClock, SystemClock};
pub use network::StoreClient;
pub use otp::{CodeRecord, Identity, RateLimitRecord};
pub use store::{CodeStore, RateLimiter};
pub use service::{CodeSource, IssueOutcome, OtpService, RejectReason, VerifyOutcome};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of otpgate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
