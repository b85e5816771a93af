//! Core type definitions for transaction signing and broadcasting.
//!
//! This module contains the parameters handed to the signer, the signed payload
//! it produces, and the results reported by the retry coordinator and pipeline.

use alloy::primitives::{Address, Bytes, TxHash, B256};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

use crate::error::WalletError;

/// One entry of an EIP-2930 access list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessListEntry {
    pub address: Address,
    #[serde(default)]
    pub storage_keys: Vec<B256>,
}

/// Already-validated parameters of a type-2 transaction.
///
/// Amounts and gas fields are decimal strings so that arbitrarily large values survive
/// the trip through JSON; they are converted to integers only when the payload is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionParameters {
    /// Recipient address
    pub to: Address,
    /// Value in wei
    pub value: String,
    pub chain_id: u64,
    pub nonce: u64,
    pub gas_limit: String,
    pub max_fee_per_gas: String,
    pub max_priority_fee_per_gas: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_list: Option<Vec<AccessListEntry>>,
}

impl TransactionParameters {
    /// Returns a copy of these parameters with the nonce replaced.
    /// Every retry attempt signs its own copy; the original is never mutated.
    pub fn with_nonce(&self, nonce: u64) -> Self {
        Self {
            nonce,
            ..self.clone()
        }
    }
}

/// A fully signed, EIP-2718 encoded type-2 transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    /// Encoded envelope bytes, ready for `eth_sendRawTransaction`
    pub raw: Bytes,
    /// keccak256 of the encoded envelope
    pub hash: TxHash,
    pub nonce: u64,
    pub chain_id: u64,
}

impl SignedTransaction {
    /// Hex encoding of the raw payload with a `0x` prefix.
    pub fn to_hex(&self) -> String {
        alloy::hex::encode_prefixed(&self.raw)
    }
}

impl Display for SignedTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "type-2 tx {} (chain {}, nonce {})",
            self.hash, self.chain_id, self.nonce
        )
    }
}

/// What a node told us after accepting (or already knowing) a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitReceipt {
    pub hash: TxHash,
    pub explorer_url: Option<String>,
}

/// The single result of one retry-coordinator run.
#[derive(Debug)]
pub enum BroadcastOutcome {
    Success {
        hash: TxHash,
        explorer_url: Option<String>,
        final_nonce: u64,
        retry_count: u32,
    },
    Failure {
        error: WalletError,
        final_nonce: u64,
        retry_count: u32,
    },
}

impl BroadcastOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, BroadcastOutcome::Success { .. })
    }

    pub fn final_nonce(&self) -> u64 {
        match self {
            BroadcastOutcome::Success { final_nonce, .. }
            | BroadcastOutcome::Failure { final_nonce, .. } => *final_nonce,
        }
    }

    pub fn retry_count(&self) -> u32 {
        match self {
            BroadcastOutcome::Success { retry_count, .. }
            | BroadcastOutcome::Failure { retry_count, .. } => *retry_count,
        }
    }
}

/// Block inclusion facts taken from a transaction receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiptSummary {
    pub block_number: u64,
    pub gas_used: u64,
    /// false when the transaction was mined but reverted
    pub success: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BroadcastStatus {
    /// Submitted and a receipt was observed
    Success,
    /// Submitted, but the receipt could not be obtained in time
    BroadcastedButUnconfirmed,
    /// Never accepted by the node
    Failed,
}

/// Broadcast section of a [`PipelineResult`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastReport {
    pub status: BroadcastStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<TxHash>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explorer_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_used: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_nonce: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Everything a pipeline run produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineResult {
    /// Hex encoded signed payload (the one signed at the caller's nonce, or the one
    /// that was finally accepted when broadcasting)
    pub signed_transaction: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub broadcast: Option<BroadcastReport>,
}
