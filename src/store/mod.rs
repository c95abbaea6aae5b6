//! Store Module
//!
//! Stateful protocols built on the store client. Neither component caches
//! anything: every call reads and writes the store directly, and both share
//! the one connection owned by `StoreClient`.
//!
//! ## Components
//! - `CodeStore`: single-use code records with a TTL
//! - `RateLimiter`: fixed-window, one acquisition per window and identity

mod code_store;
mod rate_limiter;

pub use code_store::CodeStore;
pub use rate_limiter::RateLimiter;
