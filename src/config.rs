use std::time::Duration;

use crate::error::{Result, WalletError};

/// Upper bound accepted for `MAX_RETRIES`
pub const MAX_RETRIES_LIMIT: u32 = 10;

/// Retry, lookup and confirmation tuning, loaded from environment variables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Maximum number of nonce-conflict retries
    pub max_retries: u32,
    /// Base delay in milliseconds between nonce-conflict retries
    pub retry_base_delay_ms: u64,
    /// Cap in milliseconds for the nonce-conflict backoff
    pub retry_max_delay_ms: u64,
    /// How many times an "already known" transaction is looked up before giving up
    pub duplicate_lookup_retries: u32,
    pub duplicate_lookup_base_delay_ms: u64,
    pub duplicate_lookup_max_delay_ms: u64,
    /// How long to wait for a receipt once a transaction is accepted
    pub receipt_timeout_secs: u64,
    pub receipt_poll_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_base_delay_ms: 1000,
            retry_max_delay_ms: 10_000,
            duplicate_lookup_retries: 5,
            duplicate_lookup_base_delay_ms: 500,
            duplicate_lookup_max_delay_ms: 4000,
            receipt_timeout_secs: 120,
            receipt_poll_interval_ms: 2000,
        }
    }
}

impl Config {
    /// Creates a new Config instance by loading values from environment variables.
    /// Unset variables fall back to [`Config::default`]; set but malformed ones are errors.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        let defaults = Self::default();

        let config = Self {
            max_retries: env_or("MAX_RETRIES", defaults.max_retries)?,
            retry_base_delay_ms: env_or("RETRY_BASE_DELAY_MS", defaults.retry_base_delay_ms)?,
            retry_max_delay_ms: env_or("RETRY_MAX_DELAY_MS", defaults.retry_max_delay_ms)?,
            duplicate_lookup_retries: env_or(
                "DUPLICATE_LOOKUP_RETRIES",
                defaults.duplicate_lookup_retries,
            )?,
            duplicate_lookup_base_delay_ms: env_or(
                "DUPLICATE_LOOKUP_BASE_DELAY_MS",
                defaults.duplicate_lookup_base_delay_ms,
            )?,
            duplicate_lookup_max_delay_ms: env_or(
                "DUPLICATE_LOOKUP_MAX_DELAY_MS",
                defaults.duplicate_lookup_max_delay_ms,
            )?,
            receipt_timeout_secs: env_or("RECEIPT_TIMEOUT_SECS", defaults.receipt_timeout_secs)?,
            receipt_poll_interval_ms: env_or(
                "RECEIPT_POLL_INTERVAL_MS",
                defaults.receipt_poll_interval_ms,
            )?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_retries > MAX_RETRIES_LIMIT {
            return Err(WalletError::InputError(format!(
                "MAX_RETRIES must be between 0 and {}, got {}",
                MAX_RETRIES_LIMIT, self.max_retries
            )));
        }
        if self.receipt_poll_interval_ms == 0 {
            return Err(WalletError::InputError(
                "RECEIPT_POLL_INTERVAL_MS must be a positive number".to_string(),
            ));
        }
        Ok(())
    }

    pub fn receipt_timeout(&self) -> Duration {
        Duration::from_secs(self.receipt_timeout_secs)
    }

    pub fn receipt_poll_interval(&self) -> Duration {
        Duration::from_millis(self.receipt_poll_interval_ms)
    }
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match dotenv::var(name) {
        Ok(v) => v.trim().parse::<T>().map_err(|_| {
            WalletError::InputError(format!("{} must be a non-negative number, got {:?}", name, v))
        }),
        Err(_) => Ok(default),
    }
}
