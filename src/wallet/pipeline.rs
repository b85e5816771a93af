//! Sign → (optional) retry-coordinated broadcast → receipt confirmation.

use std::sync::Arc;
use tracing::{info, info_span, warn, Instrument};
use url::Url;

use crate::{
    config::{Config, MAX_RETRIES_LIMIT},
    error::{Result, WalletError},
    types::{
        BroadcastOutcome, BroadcastReport, BroadcastStatus, PipelineResult, TransactionParameters,
    },
    wallet::{
        backoff::{Sleeper, TokioSleeper},
        broadcast::{validate_rpc_url, Broadcaster},
        key_store::SecureKeyStore,
        retry::NonceRetryCoordinator,
        rpc::{AlloyRpc, RpcClient},
        signer::TransactionSigner,
    },
};

/// Input of one pipeline run. The key store is consumed and wiped by the run.
#[derive(Debug)]
pub struct PipelineOptions {
    pub private_key: SecureKeyStore,
    pub tx_params: TransactionParameters,
    pub broadcast: bool,
    pub rpc_url: Option<String>,
    pub max_retries: u32,
}

/// Signs and broadcasts over HTTP with default tuning.
pub async fn process_transaction(options: PipelineOptions) -> Result<PipelineResult> {
    TransactionPipeline::new(Config::default())
        .process(options, AlloyRpc::connect)
        .await
}

/// Same as [`process_transaction`] with explicit tuning and RPC client construction.
pub async fn process_transaction_with<R, C>(
    options: PipelineOptions,
    config: Config,
    connect: C,
) -> Result<PipelineResult>
where
    R: RpcClient,
    C: FnOnce(Url) -> R,
{
    TransactionPipeline::new(config).process(options, connect).await
}

/// Wipes the borrowed key when dropped, whichever way the run ends.
struct KeyScope<'a> {
    key: &'a mut SecureKeyStore,
}

impl Drop for KeyScope<'_> {
    fn drop(&mut self) {
        self.key.wipe();
    }
}

pub struct TransactionPipeline {
    config: Config,
    signer: TransactionSigner,
    sleeper: Arc<dyn Sleeper>,
}

impl TransactionPipeline {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            signer: TransactionSigner::new(),
            sleeper: Arc::new(TokioSleeper),
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub async fn process<R, C>(&self, options: PipelineOptions, connect: C) -> Result<PipelineResult>
    where
        R: RpcClient,
        C: FnOnce(Url) -> R,
    {
        let PipelineOptions {
            mut private_key,
            tx_params,
            broadcast,
            rpc_url,
            max_retries,
        } = options;

        if let Err(e) = self.config.validate() {
            private_key.wipe();
            return Err(e);
        }

        let target = match (broadcast, rpc_url.as_deref()) {
            (false, _) => None,
            (true, Some(url)) => Some(url),
            (true, None) => {
                private_key.wipe();
                return Err(WalletError::InputError(
                    "rpcUrl is required when broadcast is requested".to_string(),
                ));
            }
        };
        self.process_scoped(&mut private_key, &tx_params, target, max_retries, connect)
            .await
    }

    /// Runs the pipeline against `key` and wipes it before returning. Broadcasting
    /// happens when `rpc_url` is given.
    pub(crate) async fn process_scoped<R, C>(
        &self,
        key: &mut SecureKeyStore,
        params: &TransactionParameters,
        rpc_url: Option<&str>,
        max_retries: u32,
        connect: C,
    ) -> Result<PipelineResult>
    where
        R: RpcClient,
        C: FnOnce(Url) -> R,
    {
        let scope = KeyScope { key };
        let span = info_span!("pipeline", chain_id = params.chain_id, nonce = params.nonce);
        self.execute(&*scope.key, params, rpc_url, max_retries, connect)
            .instrument(span)
            .await
    }

    async fn execute<R, C>(
        &self,
        key: &SecureKeyStore,
        params: &TransactionParameters,
        rpc_url: Option<&str>,
        max_retries: u32,
        connect: C,
    ) -> Result<PipelineResult>
    where
        R: RpcClient,
        C: FnOnce(Url) -> R,
    {
        if max_retries > MAX_RETRIES_LIMIT {
            return Err(WalletError::InputError(format!(
                "maxRetries must be between 0 and {}, got {}",
                MAX_RETRIES_LIMIT, max_retries
            )));
        }

        let signed = self.signer.sign(key, params)?;
        info!(hash = %signed.hash, "Transaction signed offline");

        let Some(rpc_url) = rpc_url else {
            return Ok(PipelineResult {
                signed_transaction: signed.to_hex(),
                broadcast: None,
            });
        };

        let url = validate_rpc_url(rpc_url)?;
        let broadcaster =
            Broadcaster::from_validated(url.clone(), connect(url), &self.config)
                .with_sleeper(self.sleeper.clone());
        let coordinator = NonceRetryCoordinator::from_config(&Config {
            max_retries,
            ..self.config.clone()
        })
        .with_sleeper(self.sleeper.clone());

        let mut latest = signed;
        let outcome = coordinator
            .run(params.nonce, |nonce| {
                // The nonce is part of the signed payload, so every attempt is signed anew
                let attempt = self.signer.sign(key, &params.with_nonce(nonce));
                if let Ok(signed) = &attempt {
                    latest = signed.clone();
                }
                let broadcaster = &broadcaster;
                async move { broadcaster.submit(&attempt?).await }
            })
            .await;

        let report = self.confirm(&broadcaster, outcome).await;
        Ok(PipelineResult {
            signed_transaction: latest.to_hex(),
            broadcast: Some(report),
        })
    }

    /// Turns the coordinator outcome into a report, waiting for the receipt on success.
    async fn confirm<R: RpcClient>(
        &self,
        broadcaster: &Broadcaster<R>,
        outcome: BroadcastOutcome,
    ) -> BroadcastReport {
        match outcome {
            BroadcastOutcome::Success {
                hash,
                explorer_url,
                final_nonce,
                retry_count,
            } => {
                let mut report = BroadcastReport {
                    status: BroadcastStatus::Success,
                    transaction_hash: Some(hash),
                    explorer_url,
                    block_number: None,
                    gas_used: None,
                    final_nonce: Some(final_nonce),
                    retry_count: Some(retry_count),
                    error: None,
                };

                match broadcaster
                    .wait_for_receipt(
                        hash,
                        self.config.receipt_timeout(),
                        self.config.receipt_poll_interval(),
                    )
                    .await
                {
                    Ok(receipt) => {
                        if !receipt.success {
                            warn!(hash = %hash, block = receipt.block_number, "Transaction mined but reverted");
                        }
                        info!(hash = %hash, block = receipt.block_number, gas_used = receipt.gas_used, "Transaction confirmed");
                        report.block_number = Some(receipt.block_number);
                        report.gas_used = Some(receipt.gas_used);
                    }
                    Err(e) => {
                        warn!(hash = %hash, error = %e, "Transaction broadcast but not confirmed");
                        report.status = BroadcastStatus::BroadcastedButUnconfirmed;
                        report.error = Some(e.to_string());
                    }
                }
                report
            }
            BroadcastOutcome::Failure {
                error,
                final_nonce,
                retry_count,
            } => BroadcastReport {
                status: BroadcastStatus::Failed,
                transaction_hash: None,
                explorer_url: None,
                block_number: None,
                gas_used: None,
                final_nonce: Some(final_nonce),
                retry_count: Some(retry_count),
                error: Some(error.to_string()),
            },
        }
    }
}
