use alloy::primitives::{keccak256, TxHash};
use std::{sync::Arc, time::Duration};
use tokio::time::timeout;
use tracing::{debug, info, warn};
use url::Url;

use crate::{
    config::Config,
    error::{Result, WalletError},
    networks,
    types::{ReceiptSummary, SignedTransaction, SubmitReceipt},
    wallet::{
        backoff::{BackoffPolicy, Sleeper, TokioSleeper},
        rpc::{RpcClient, RpcFailure},
    },
};

/// Messages nodes use to say they already hold this exact transaction.
const DUPLICATE_PATTERNS: &[&str] = &[
    "already known",
    "known transaction",
    "transaction already imported",
    "tx already exists",
];

/// True when a submission failure means the node already has the transaction.
pub fn is_duplicate_submission(failure: &RpcFailure) -> bool {
    failure.texts().any(|text| {
        let text = text.to_lowercase();
        DUPLICATE_PATTERNS.iter().any(|pattern| text.contains(pattern))
    })
}

/// Checks that `rpc_url` is an http(s) URL with a host.
pub fn validate_rpc_url(rpc_url: &str) -> Result<Url> {
    let url = Url::parse(rpc_url.trim())
        .map_err(|e| WalletError::NetworkError(format!("Invalid RPC URL '{}': {}", rpc_url, e)))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(WalletError::NetworkError(format!(
            "Invalid RPC URL '{}': scheme must be http or https",
            rpc_url
        )));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(WalletError::NetworkError(format!(
            "Invalid RPC URL '{}': missing host",
            rpc_url
        )));
    }
    Ok(url)
}

/// Submits signed payloads to a node and classifies what comes back.
pub struct Broadcaster<R> {
    client: R,
    rpc_url: Url,
    lookup_retries: u32,
    lookup_backoff: BackoffPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl<R: RpcClient> Broadcaster<R> {
    /// Wraps an existing client. `rpc_url` is still validated before anything is sent.
    pub fn new(rpc_url: &str, client: R, config: &Config) -> Result<Self> {
        let url = validate_rpc_url(rpc_url)?;
        Ok(Self::from_validated(url, client, config))
    }

    /// For callers that already ran [`validate_rpc_url`].
    pub(crate) fn from_validated(rpc_url: Url, client: R, config: &Config) -> Self {
        Self {
            client,
            rpc_url,
            lookup_retries: config.duplicate_lookup_retries,
            lookup_backoff: BackoffPolicy::new(
                config.duplicate_lookup_base_delay_ms,
                config.duplicate_lookup_max_delay_ms,
            ),
            sleeper: Arc::new(TokioSleeper),
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn rpc_url(&self) -> &Url {
        &self.rpc_url
    }

    /// Sends `signed` to the node.
    ///
    /// A duplicate submission is resolved by looking the transaction up by its hash.
    /// A node rejection is a [`WalletError::BroadcastError`]; failing to reach the node
    /// at all is a [`WalletError::NetworkError`].
    pub async fn submit(&self, signed: &SignedTransaction) -> Result<SubmitReceipt> {
        debug!(hash = %signed.hash, nonce = signed.nonce, rpc_url = %self.rpc_url, "Submitting transaction");

        match self.client.send_raw_transaction(&signed.raw).await {
            Ok(hash) => {
                if hash != signed.hash {
                    warn!(local = %signed.hash, node = %hash, "Node reported a different transaction hash");
                }
                info!(hash = %hash, nonce = signed.nonce, "Transaction accepted by node");
                Ok(SubmitReceipt {
                    hash,
                    explorer_url: Self::explorer_url(signed.chain_id, hash),
                })
            }
            Err(failure) if is_duplicate_submission(&failure) => {
                warn!(nonce = signed.nonce, error = %failure, "Node already knows this transaction, confirming by hash");
                self.confirm_duplicate(signed).await
            }
            Err(failure) if failure.transport => Err(WalletError::NetworkError(format!(
                "Failed to send transaction: {}",
                failure
            ))),
            Err(failure) => Err(WalletError::BroadcastError(failure)),
        }
    }

    /// Looks the already-known transaction up by its recomputed hash, with bounded retries.
    async fn confirm_duplicate(&self, signed: &SignedTransaction) -> Result<SubmitReceipt> {
        let hash = keccak256(&signed.raw);
        let mut last_error = None;

        for attempt in 0..=self.lookup_retries {
            if attempt > 0 {
                let delay = self.lookup_backoff.delay(attempt - 1);
                debug!(hash = %hash, attempt, delay = %humantime::format_duration(delay), "Retrying duplicate lookup");
                self.sleeper.sleep(delay).await;
            }

            match self.client.transaction_exists(hash).await {
                Ok(true) => {
                    info!(hash = %hash, "Duplicate submission confirmed");
                    return Ok(SubmitReceipt {
                        hash,
                        explorer_url: Self::explorer_url(signed.chain_id, hash),
                    });
                }
                Ok(false) => debug!(hash = %hash, attempt, "Duplicate not visible yet"),
                Err(e) => {
                    warn!(hash = %hash, attempt, error = %e, "Duplicate lookup failed");
                    last_error = Some(e);
                }
            }
        }

        let failure = RpcFailure::new(format!(
            "transaction {} reported as already known but not found after {} lookups",
            hash,
            self.lookup_retries + 1
        ));
        Err(WalletError::BroadcastError(match last_error {
            Some(e) => failure.with_cause(e.to_string()),
            None => failure,
        }))
    }

    /// Polls for the receipt of `hash` until it appears or `wait` elapses.
    pub async fn wait_for_receipt(
        &self,
        hash: TxHash,
        wait: Duration,
        poll_interval: Duration,
    ) -> Result<ReceiptSummary> {
        let polled = timeout(wait, async {
            loop {
                match self.client.get_receipt(hash).await {
                    Ok(Some(receipt)) => return Ok(receipt),
                    Ok(None) => debug!(hash = %hash, "Transaction pending"),
                    Err(e) => {
                        return Err(WalletError::NetworkError(format!(
                            "Failed to get transaction receipt: {}",
                            e
                        )))
                    }
                }
                tokio::time::sleep(poll_interval).await;
            }
        })
        .await;

        match polled {
            Ok(result) => result,
            Err(_) => Err(WalletError::NetworkError(format!(
                "timeout waiting for receipt of {} after {}",
                hash,
                humantime::format_duration(wait)
            ))),
        }
    }

    /// Best effort: an unknown chain or explorer simply yields `None`.
    pub fn explorer_url(chain_id: u64, hash: TxHash) -> Option<String> {
        networks::explorer_tx_url(chain_id, hash)
    }
}
