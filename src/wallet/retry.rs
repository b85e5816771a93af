//! Nonce-conflict retry coordination.
//!
//! The coordinator drives repeated sign+submit attempts through an injected callback:
//!
//! ```text
//! ATTEMPT(nonce, i) ─ ok ───────────────────────────────▶ SUCCESS(finalNonce = nonce, retryCount = i)
//!                   ├ nonce conflict, i < maxRetries ──▶ ATTEMPT(nonce + 1, i + 1)
//!                   ├ nonce conflict, i == maxRetries ─▶ FAILURE(nonce, i)
//!                   └ anything else ───────────────────▶ FAILURE(nonce, i)
//! ```
//!
//! Expected failures are returned as [`BroadcastOutcome::Failure`], never as `Err`.

use futures::FutureExt;
use std::{any::Any, future::Future, panic::AssertUnwindSafe, sync::Arc};
use tracing::{info, warn};

use crate::{
    config::{Config, MAX_RETRIES_LIMIT},
    error::{Result, WalletError},
    types::{BroadcastOutcome, SubmitReceipt},
    wallet::backoff::{BackoffPolicy, Sleeper, TokioSleeper},
};

/// Error messages that mean "this nonce cannot be used, try the next one".
/// "already known" is deliberately absent: a duplicate is resolved by the broadcaster.
const NONCE_CONFLICT_PATTERNS: &[&str] = &[
    "nonce too low",
    "nonce too high",
    "replacement transaction underpriced",
    "invalid nonce",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    NonceConflict,
    Other,
}

/// Classifies an attempt failure. Only node-reported failures can be nonce conflicts;
/// the message, details and cause are all inspected, case-insensitively.
pub fn classify(error: &WalletError) -> ErrorClass {
    let conflict = match error {
        WalletError::BroadcastError(failure) => failure.texts().any(mentions_nonce_conflict),
        WalletError::NetworkError(message) => mentions_nonce_conflict(message),
        _ => false,
    };

    if conflict {
        ErrorClass::NonceConflict
    } else {
        ErrorClass::Other
    }
}

fn mentions_nonce_conflict(text: &str) -> bool {
    let text = text.to_lowercase();
    NONCE_CONFLICT_PATTERNS
        .iter()
        .any(|pattern| text.contains(pattern))
}

/// Lives for one coordinator run only.
#[derive(Debug)]
struct RetryState {
    current_nonce: u64,
    attempts_made: u32,
    last_error: Option<WalletError>,
}

impl RetryState {
    /// Failure carrying the conflict that used up the last retry.
    fn into_exhausted(self) -> BroadcastOutcome {
        BroadcastOutcome::Failure {
            error: self.last_error.unwrap_or_else(|| {
                WalletError::UnexpectedError("retries exhausted without an attempt".to_string())
            }),
            final_nonce: self.current_nonce,
            retry_count: self.attempts_made.saturating_sub(1),
        }
    }
}

pub struct NonceRetryCoordinator {
    max_retries: u32,
    backoff: BackoffPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl NonceRetryCoordinator {
    /// `max_retries` is clamped to [`MAX_RETRIES_LIMIT`].
    pub fn new(max_retries: u32, backoff: BackoffPolicy) -> Self {
        Self {
            max_retries: max_retries.min(MAX_RETRIES_LIMIT),
            backoff,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.max_retries,
            BackoffPolicy::new(config.retry_base_delay_ms, config.retry_max_delay_ms),
        )
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Calls `execute` with `initial_nonce`, then with each next nonce after a nonce
    /// conflict, until it succeeds, fails otherwise, or retries run out.
    pub async fn run<F, Fut>(&self, initial_nonce: u64, mut execute: F) -> BroadcastOutcome
    where
        F: FnMut(u64) -> Fut,
        Fut: Future<Output = Result<SubmitReceipt>>,
    {
        let mut state = RetryState {
            current_nonce: initial_nonce,
            attempts_made: 0,
            last_error: None,
        };

        loop {
            let retry_count = state.attempts_made;
            let nonce = state.current_nonce;

            let attempt = AssertUnwindSafe(async { execute(nonce).await })
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| Err(panic_to_error(panic)));
            state.attempts_made += 1;

            let error = match attempt {
                Ok(receipt) => {
                    info!(hash = %receipt.hash, nonce, retry_count, "Transaction broadcast");
                    return BroadcastOutcome::Success {
                        hash: receipt.hash,
                        explorer_url: receipt.explorer_url,
                        final_nonce: nonce,
                        retry_count,
                    };
                }
                Err(error) => error,
            };

            if classify(&error) == ErrorClass::Other {
                warn!(nonce, retry_count, error = %error, "Broadcast failed, not retrying");
                return BroadcastOutcome::Failure {
                    error,
                    final_nonce: nonce,
                    retry_count,
                };
            }

            if retry_count >= self.max_retries {
                warn!(nonce, retry_count, error = %error, "Nonce conflict, retries exhausted");
                state.last_error = Some(error);
                break;
            }

            let Some(next_nonce) = nonce.checked_add(1) else {
                return BroadcastOutcome::Failure {
                    error: WalletError::InputError("nonce overflow".to_string()),
                    final_nonce: nonce,
                    retry_count,
                };
            };

            let next_retry = retry_count + 1;
            // The first retry goes out immediately
            if next_retry >= 2 {
                let delay = self.backoff.delay(next_retry - 2);
                warn!(
                    nonce,
                    next_nonce,
                    attempt = next_retry,
                    max_retries = self.max_retries,
                    delay = %humantime::format_duration(delay),
                    error = %error,
                    "Nonce conflict, retrying after backoff"
                );
                self.sleeper.sleep(delay).await;
            } else {
                warn!(
                    nonce,
                    next_nonce,
                    attempt = next_retry,
                    max_retries = self.max_retries,
                    error = %error,
                    "Nonce conflict, retrying"
                );
            }

            state.last_error = Some(error);
            state.current_nonce = next_nonce;
        }

        state.into_exhausted()
    }
}

fn panic_to_error(panic: Box<dyn Any + Send>) -> WalletError {
    let message = if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "attempt panicked with a non-string payload".to_string()
    };
    WalletError::UnexpectedError(message)
}
