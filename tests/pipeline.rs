//! End-to-end pipeline runs against a scripted in-memory node.

use alloy::primitives::{address, keccak256, TxHash};
use async_trait::async_trait;
use eip1559_signer::{
    process_transaction, process_transaction_with,
    types::ReceiptSummary,
    wallet::{RpcClient, RpcFailure},
    BroadcastStatus, Config, PipelineOptions, SecureKeyStore, TransactionParameters, WalletError,
};
use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

// Well-known test private key (Anvil's first account)
const TEST_PRIVATE_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

#[derive(Default)]
struct Script {
    sends: VecDeque<Result<(), RpcFailure>>,
    send_default: Option<RpcFailure>,
    exists: VecDeque<bool>,
    receipt: Option<Result<Option<ReceiptSummary>, RpcFailure>>,
    sent: Vec<Vec<u8>>,
}

#[derive(Clone, Default)]
struct ScriptedNode {
    script: Arc<Mutex<Script>>,
}

impl ScriptedNode {
    fn reject_next(&self, message: &str) {
        self.script
            .lock()
            .unwrap()
            .sends
            .push_back(Err(RpcFailure::new(message)));
    }

    fn unreachable_next(&self, message: &str) {
        self.script
            .lock()
            .unwrap()
            .sends
            .push_back(Err(RpcFailure::transport(message)));
    }

    fn reject_always(&self, message: &str) {
        self.script.lock().unwrap().send_default = Some(RpcFailure::new(message));
    }

    fn found_on_lookup(&self) {
        self.script.lock().unwrap().exists.push_back(true);
    }

    fn receipt(&self, receipt: Result<Option<ReceiptSummary>, RpcFailure>) {
        self.script.lock().unwrap().receipt = Some(receipt);
    }

    fn sent(&self) -> Vec<Vec<u8>> {
        self.script.lock().unwrap().sent.clone()
    }
}

#[async_trait]
impl RpcClient for ScriptedNode {
    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<TxHash, RpcFailure> {
        let mut script = self.script.lock().unwrap();
        script.sent.push(raw.to_vec());
        let response = match script.sends.pop_front() {
            Some(response) => response,
            None => match &script.send_default {
                Some(failure) => Err(failure.clone()),
                None => Ok(()),
            },
        };
        response.map(|_| keccak256(raw))
    }

    async fn transaction_exists(&self, _hash: TxHash) -> Result<bool, RpcFailure> {
        Ok(self.script.lock().unwrap().exists.pop_front().unwrap_or(false))
    }

    async fn get_receipt(&self, _hash: TxHash) -> Result<Option<ReceiptSummary>, RpcFailure> {
        self.script
            .lock()
            .unwrap()
            .receipt
            .clone()
            .unwrap_or(Ok(None))
    }
}

fn params() -> TransactionParameters {
    TransactionParameters {
        to: address!("70997970C51812dc3A010C7d01b50e0d17dc79C8"),
        value: "1000000000000000".into(),
        chain_id: 11155111,
        nonce: 10,
        gas_limit: "21000".into(),
        max_fee_per_gas: "30000000000".into(),
        max_priority_fee_per_gas: "1000000000".into(),
        access_list: None,
    }
}

fn options(broadcast: bool) -> PipelineOptions {
    PipelineOptions {
        private_key: SecureKeyStore::store(TEST_PRIVATE_KEY.to_string()).unwrap(),
        tx_params: params(),
        broadcast,
        rpc_url: Some("https://rpc.sepolia.example".into()),
        max_retries: 3,
    }
}

fn fast_config() -> Config {
    Config {
        retry_base_delay_ms: 1,
        retry_max_delay_ms: 2,
        duplicate_lookup_base_delay_ms: 1,
        duplicate_lookup_max_delay_ms: 2,
        receipt_timeout_secs: 1,
        receipt_poll_interval_ms: 10,
        ..Config::default()
    }
}

fn mined() -> ReceiptSummary {
    ReceiptSummary {
        block_number: 5_000_000,
        gas_used: 21000,
        success: true,
    }
}

#[tokio::test]
async fn test_sign_only_needs_no_node() {
    let result = process_transaction(options(false)).await.unwrap();
    assert!(result.broadcast.is_none());
    assert!(result.signed_transaction.starts_with("0x02"));

    let json = serde_json::to_value(&result).unwrap();
    assert!(json.get("signedTransaction").is_some());
    assert!(json.get("broadcast").is_none());
}

#[tokio::test]
async fn test_confirmed_broadcast() {
    let node = ScriptedNode::default();
    node.receipt(Ok(Some(mined())));
    let connect = node.clone();
    let result = process_transaction_with(options(true), fast_config(), move |_| connect)
        .await
        .unwrap();

    let report = result.broadcast.unwrap();
    assert_eq!(report.status, BroadcastStatus::Success);
    assert_eq!(report.block_number, Some(5_000_000));
    assert_eq!(report.final_nonce, Some(10));
    assert_eq!(report.retry_count, Some(0));
    assert!(report
        .explorer_url
        .unwrap()
        .starts_with("https://sepolia.etherscan.io/tx/0x"));
    assert_eq!(node.sent().len(), 1);
}

#[tokio::test]
async fn test_receipt_timeout_is_broadcast_but_unconfirmed() {
    let node = ScriptedNode::default();
    node.receipt(Err(RpcFailure::new("timeout")));
    let connect = node.clone();
    let result = process_transaction_with(options(true), fast_config(), move |_| connect)
        .await
        .unwrap();

    let report = result.broadcast.unwrap();
    assert_eq!(report.status, BroadcastStatus::BroadcastedButUnconfirmed);
    assert_eq!(report.transaction_hash, Some(keccak256(&node.sent()[0])));
    assert!(report.error.unwrap().contains("timeout"));
    assert_eq!(
        result.signed_transaction,
        alloy::hex::encode_prefixed(&node.sent()[0])
    );
}

#[tokio::test]
async fn test_receipt_never_arrives_is_unconfirmed() {
    let node = ScriptedNode::default();
    let connect = node.clone();
    let result = process_transaction_with(options(true), fast_config(), move |_| connect)
        .await
        .unwrap();

    let report = result.broadcast.unwrap();
    assert_eq!(report.status, BroadcastStatus::BroadcastedButUnconfirmed);
    assert!(report.transaction_hash.is_some());
    assert!(report.error.unwrap().contains("timeout"));
}

#[tokio::test]
async fn test_already_known_is_recovered() {
    let node = ScriptedNode::default();
    node.reject_next("already known");
    node.found_on_lookup();
    node.receipt(Ok(Some(mined())));
    let connect = node.clone();
    let result = process_transaction_with(options(true), fast_config(), move |_| connect)
        .await
        .unwrap();

    let report = result.broadcast.unwrap();
    assert_eq!(report.status, BroadcastStatus::Success);
    assert_eq!(report.transaction_hash, Some(keccak256(&node.sent()[0])));
    // a duplicate never advances the nonce
    assert_eq!(report.final_nonce, Some(10));
    assert_eq!(report.retry_count, Some(0));
    assert_eq!(node.sent().len(), 1);
}

#[tokio::test]
async fn test_persistent_nonce_conflict_reports_failed() {
    let node = ScriptedNode::default();
    node.reject_always("nonce too low: next nonce 42, tx nonce 10");
    let connect = node.clone();
    let result = process_transaction_with(options(true), fast_config(), move |_| connect)
        .await
        .unwrap();

    let report = result.broadcast.unwrap();
    assert_eq!(report.status, BroadcastStatus::Failed);
    assert!(report.transaction_hash.is_none());
    assert_eq!(report.final_nonce, Some(13));
    assert_eq!(report.retry_count, Some(3));
    assert!(report.error.unwrap().contains("nonce too low"));
    assert_eq!(node.sent().len(), 4);
}

#[tokio::test]
async fn test_conflict_then_success() {
    let node = ScriptedNode::default();
    node.reject_next("replacement transaction underpriced");
    node.reject_next("nonce too low");
    node.receipt(Ok(Some(mined())));
    let connect = node.clone();
    let result = process_transaction_with(options(true), fast_config(), move |_| connect)
        .await
        .unwrap();

    let report = result.broadcast.unwrap();
    assert_eq!(report.status, BroadcastStatus::Success);
    assert_eq!(report.final_nonce, Some(12));
    assert_eq!(report.retry_count, Some(2));

    let sent = node.sent();
    assert_eq!(sent.len(), 3);
    assert_ne!(sent[0], sent[1]);
    assert_ne!(sent[1], sent[2]);
}

#[tokio::test]
async fn test_unreachable_node_reports_network_error() {
    let node = ScriptedNode::default();
    node.unreachable_next("error sending request for url (http://127.0.0.1:1/)");
    let connect = node.clone();
    let result = process_transaction_with(options(true), fast_config(), move |_| connect)
        .await
        .unwrap();

    let report = result.broadcast.unwrap();
    assert_eq!(report.status, BroadcastStatus::Failed);
    assert!(report.transaction_hash.is_none());
    assert!(report.error.unwrap().starts_with("Network error"));
    assert_eq!(node.sent().len(), 1);
}

#[tokio::test]
async fn test_zero_poll_interval_is_rejected() {
    let config = Config {
        receipt_poll_interval_ms: 0,
        ..fast_config()
    };
    let node = ScriptedNode::default();
    let connect = node.clone();
    let err = process_transaction_with(options(true), config, move |_| connect)
        .await
        .unwrap_err();

    assert!(matches!(err, WalletError::InputError(_)));
    assert!(node.sent().is_empty());
}

#[tokio::test]
async fn test_malformed_rpc_url_is_network_error() {
    let mut opts = options(true);
    opts.rpc_url = Some("not a url".into());
    let node = ScriptedNode::default();
    let connect = node.clone();
    let err = process_transaction_with(opts, fast_config(), move |_| connect)
        .await
        .unwrap_err();

    assert!(matches!(err, WalletError::NetworkError(_)));
    assert!(node.sent().is_empty());
}

#[tokio::test]
async fn test_wiped_key_is_key_error() {
    let mut opts = options(false);
    opts.private_key.wipe();
    let err = process_transaction(opts).await.unwrap_err();
    assert!(matches!(err, WalletError::KeyError(_)));
}
