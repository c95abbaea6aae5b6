//! Configuration for otpgate
//!
//! Centralized configuration with sensible defaults, optionally loaded from
//! the process environment.

use crate::error::{GateError, Result};

/// Longest accepted code lifetime or rate limit window (one day)
pub const MAX_LIFETIME_MS: i64 = 24 * 60 * 60 * 1000;

/// Main configuration for an otpgate instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Store Connection
    // -------------------------------------------------------------------------
    /// Host of the Redis-compatible store
    pub store_host: String,

    /// Port of the Redis-compatible store
    pub store_port: u16,

    /// Connect timeout (milliseconds)
    pub connect_timeout_ms: u64,

    /// Upper bound on waiting for a single reply (milliseconds)
    pub command_timeout_ms: u64,

    // -------------------------------------------------------------------------
    // One-Time Codes
    // -------------------------------------------------------------------------
    /// Store-side TTL of an issued code (seconds)
    pub code_ttl_secs: u64,

    /// Logical validity window checked at redemption (milliseconds)
    pub code_validity_ms: i64,

    // -------------------------------------------------------------------------
    // Rate Limiting
    // -------------------------------------------------------------------------
    /// Fixed window length per identity (milliseconds)
    pub rate_limit_window_ms: i64,

    // -------------------------------------------------------------------------
    // Collaborators
    // -------------------------------------------------------------------------
    /// Messaging bot token, required only by the bot front end
    pub bot_token: Option<String>,

    /// Port of the HTTP verification front end
    pub server_port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_host: "127.0.0.1".to_string(),
            store_port: 6379,
            connect_timeout_ms: 5000,
            command_timeout_ms: 5000,
            code_ttl_secs: 300,
            code_validity_ms: 300_000, // 5 minutes
            rate_limit_window_ms: 60_000,
            bot_token: None,
            server_port: 3000,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Load overrides from the process environment
    ///
    /// Recognized variables: `REDIS_HOST`, `REDIS_PORT`, `SERVER_PORT`,
    /// `RATE_LIMIT_WINDOW` and `TELEGRAM_BOT_TOKEN`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load overrides through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(host) = lookup("REDIS_HOST").filter(|h| !h.is_empty()) {
            config.store_host = host;
        }
        if let Some(port) = lookup("REDIS_PORT") {
            config.store_port = parse_var("REDIS_PORT", &port)?;
        }
        if let Some(port) = lookup("SERVER_PORT") {
            config.server_port = parse_var("SERVER_PORT", &port)?;
        }
        if let Some(window) = lookup("RATE_LIMIT_WINDOW") {
            config.rate_limit_window_ms = parse_var("RATE_LIMIT_WINDOW", &window)?;
        }
        config.bot_token = lookup("TELEGRAM_BOT_TOKEN").filter(|t| !t.is_empty());

        Ok(config)
    }

    /// Check the configuration for values the components cannot work with
    pub fn validate(&self, require_bot_token: bool) -> Result<()> {
        if require_bot_token && self.bot_token.is_none() {
            return Err(GateError::Config("TELEGRAM_BOT_TOKEN is required".to_string()));
        }
        if self.store_host.is_empty() {
            return Err(GateError::Config("store host must not be empty".to_string()));
        }
        if self.command_timeout_ms == 0 || self.connect_timeout_ms == 0 {
            return Err(GateError::Config("timeouts must be non-zero".to_string()));
        }
        if self.code_ttl_secs == 0 || self.code_validity_ms <= 0 {
            return Err(GateError::Config("code lifetime must be positive".to_string()));
        }
        if self.code_ttl_secs > (MAX_LIFETIME_MS / 1000) as u64
            || self.code_validity_ms > MAX_LIFETIME_MS
        {
            return Err(GateError::Config(format!(
                "code lifetime must not exceed {} ms",
                MAX_LIFETIME_MS
            )));
        }
        if self.rate_limit_window_ms <= 0 {
            return Err(GateError::Config(
                "RATE_LIMIT_WINDOW must be positive".to_string(),
            ));
        }
        if self.rate_limit_window_ms > MAX_LIFETIME_MS {
            return Err(GateError::Config(format!(
                "RATE_LIMIT_WINDOW must not exceed {} ms",
                MAX_LIFETIME_MS
            )));
        }
        Ok(())
    }

    /// `host:port` of the store
    pub fn store_addr(&self) -> String {
        format!("{}:{}", self.store_host, self.store_port)
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| GateError::Config(format!("{} has an invalid value: {:?}", name, raw)))
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Start from an existing config instead of the defaults
    pub fn from_config(config: Config) -> Self {
        Self { config }
    }

    /// Set the store host
    pub fn store_host(mut self, host: impl Into<String>) -> Self {
        self.config.store_host = host.into();
        self
    }

    /// Set the store port
    pub fn store_port(mut self, port: u16) -> Self {
        self.config.store_port = port;
        self
    }

    /// Set the connect timeout (in milliseconds)
    pub fn connect_timeout_ms(mut self, ms: u64) -> Self {
        self.config.connect_timeout_ms = ms;
        self
    }

    /// Set the per-command reply timeout (in milliseconds)
    pub fn command_timeout_ms(mut self, ms: u64) -> Self {
        self.config.command_timeout_ms = ms;
        self
    }

    /// Set the store-side TTL of issued codes (in seconds)
    pub fn code_ttl_secs(mut self, secs: u64) -> Self {
        self.config.code_ttl_secs = secs;
        self
    }

    /// Set the logical validity window of codes (in milliseconds)
    pub fn code_validity_ms(mut self, ms: i64) -> Self {
        self.config.code_validity_ms = ms;
        self
    }

    /// Set the rate limit window (in milliseconds)
    pub fn rate_limit_window_ms(mut self, ms: i64) -> Self {
        self.config.rate_limit_window_ms = ms;
        self
    }

    /// Set the messaging bot token
    pub fn bot_token(mut self, token: impl Into<String>) -> Self {
        self.config.bot_token = Some(token.into());
        self
    }

    /// Set the HTTP front end port
    pub fn server_port(mut self, port: u16) -> Self {
        self.config.server_port = port;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
