//! The node-facing surface used by the broadcaster.
//!
//! [`RpcClient`] is the seam between broadcast logic and the wire. [`AlloyRpc`] is the
//! production implementation over an alloy HTTP provider.

use alloy::{
    network::Ethereum,
    primitives::TxHash,
    providers::{Provider, ProviderBuilder},
    transports::{RpcError, TransportError},
};
use async_trait::async_trait;
use std::{error::Error as StdError, fmt, sync::Arc};
use url::Url;

use crate::types::ReceiptSummary;

/// A failed RPC call, keeping every place a node may put the reason.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RpcFailure {
    /// Primary error message
    pub message: String,
    /// JSON-RPC error `data`, if the node sent any
    pub details: Option<String>,
    /// Message of the underlying transport error, if any
    pub cause: Option<String>,
    /// The request never got a JSON-RPC answer (connection, DNS, timeout, bad response body)
    pub transport: bool,
}

impl RpcFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    /// A failure below the JSON-RPC layer.
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            transport: true,
            ..Self::new(message)
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    /// All text fields, in the order they are inspected by classifiers.
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.message.as_str())
            .chain(self.details.as_deref())
            .chain(self.cause.as_deref())
    }
}

impl fmt::Display for RpcFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(details) = &self.details {
            write!(f, " ({})", details)?;
        }
        if let Some(cause) = &self.cause {
            write!(f, ": {}", cause)?;
        }
        Ok(())
    }
}

impl From<TransportError> for RpcFailure {
    fn from(err: TransportError) -> Self {
        match &err {
            RpcError::ErrorResp(payload) => {
                let failure = RpcFailure::new(payload.message.to_string());
                match &payload.data {
                    Some(data) => failure.with_details(data.get().to_string()),
                    None => failure,
                }
            }
            _ => {
                let message = err.to_string();
                let cause = err
                    .source()
                    .map(|source| source.to_string())
                    .filter(|cause| !message.contains(cause.as_str()));
                let failure = RpcFailure::transport(message);
                match cause {
                    Some(cause) => failure.with_cause(cause),
                    None => failure,
                }
            }
        }
    }
}

/// Minimal set of node calls needed to submit and confirm a signed transaction.
#[async_trait]
pub trait RpcClient: Send + Sync {
    /// `eth_sendRawTransaction`
    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<TxHash, RpcFailure>;

    /// Whether the node knows a transaction with this hash (pending or mined).
    async fn transaction_exists(&self, hash: TxHash) -> Result<bool, RpcFailure>;

    /// The receipt, once the transaction is mined.
    async fn get_receipt(&self, hash: TxHash) -> Result<Option<ReceiptSummary>, RpcFailure>;
}

/// [`RpcClient`] backed by an alloy HTTP provider.
#[derive(Clone)]
pub struct AlloyRpc {
    provider: Arc<dyn Provider<Ethereum>>,
}

impl AlloyRpc {
    pub fn connect(url: Url) -> Self {
        let provider = ProviderBuilder::new().connect_http(url);
        Self {
            provider: Arc::new(provider),
        }
    }

    pub fn from_provider(provider: Arc<dyn Provider<Ethereum>>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl RpcClient for AlloyRpc {
    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<TxHash, RpcFailure> {
        let pending = self.provider.send_raw_transaction(raw).await?;
        Ok(*pending.tx_hash())
    }

    async fn transaction_exists(&self, hash: TxHash) -> Result<bool, RpcFailure> {
        let tx = self.provider.get_transaction_by_hash(hash).await?;
        Ok(tx.is_some())
    }

    async fn get_receipt(&self, hash: TxHash) -> Result<Option<ReceiptSummary>, RpcFailure> {
        let receipt = self.provider.get_transaction_receipt(hash).await?;
        Ok(receipt.map(|receipt| ReceiptSummary {
            block_number: receipt.block_number.unwrap_or_default(),
            gas_used: receipt.gas_used,
            success: receipt.status(),
        }))
    }
}

impl fmt::Debug for AlloyRpc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlloyRpc").finish_non_exhaustive()
    }
}
