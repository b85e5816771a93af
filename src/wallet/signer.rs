use alloy::{
    consensus::{SignableTransaction, TxEip1559, TxEnvelope},
    eips::{
        eip2718::Encodable2718,
        eip2930::{AccessList, AccessListItem},
    },
    network::TxSignerSync,
    primitives::{Bytes, TxKind, U256},
    signers::local::PrivateKeySigner,
};
use secrecy::zeroize::Zeroizing;
use tracing::debug;

use crate::{
    error::{Result, WalletError},
    types::{SignedTransaction, TransactionParameters},
    wallet::key_store::SecureKeyStore,
};

/// Maps validated parameters onto a type-2 payload and signs it offline.
#[derive(Debug, Default, Clone, Copy)]
pub struct TransactionSigner;

impl TransactionSigner {
    pub fn new() -> Self {
        Self
    }

    /// Signs `params` with the key held in `key`.
    ///
    /// Numeric conversion, account derivation and signature failures all surface as
    /// [`WalletError::SigningError`]; a wiped key surfaces as [`WalletError::KeyError`].
    pub fn sign(&self, key: &SecureKeyStore, params: &TransactionParameters) -> Result<SignedTransaction> {
        let mut tx = build_payload(params)?;
        let signer = derive_signer(key)?;

        let signature = signer
            .sign_transaction_sync(&mut tx)
            .map_err(|e| WalletError::SigningError(format!("Failed to sign transaction: {}", e)))?;

        let envelope = TxEnvelope::from(tx.into_signed(signature));
        let signed = SignedTransaction {
            raw: Bytes::from(envelope.encoded_2718()),
            hash: *envelope.tx_hash(),
            nonce: params.nonce,
            chain_id: params.chain_id,
        };

        debug!(
            hash = %signed.hash,
            nonce = signed.nonce,
            chain_id = signed.chain_id,
            from = %signer.address(),
            "Transaction signed"
        );
        Ok(signed)
    }
}

/// Builds the canonical type-2 payload for `params`.
pub fn build_payload(params: &TransactionParameters) -> Result<TxEip1559> {
    let value = parse_decimal("value", &params.value)?;
    let gas_limit = narrow::<u64>("gasLimit", parse_decimal("gasLimit", &params.gas_limit)?)?;
    let max_fee_per_gas = narrow::<u128>(
        "maxFeePerGas",
        parse_decimal("maxFeePerGas", &params.max_fee_per_gas)?,
    )?;
    let max_priority_fee_per_gas = narrow::<u128>(
        "maxPriorityFeePerGas",
        parse_decimal("maxPriorityFeePerGas", &params.max_priority_fee_per_gas)?,
    )?;

    // Only a non-empty access list is mapped; otherwise the canonical default is left
    let access_list = match params.access_list.as_deref() {
        Some(entries) if !entries.is_empty() => AccessList(
            entries
                .iter()
                .map(|entry| AccessListItem {
                    address: entry.address,
                    storage_keys: entry.storage_keys.clone(),
                })
                .collect(),
        ),
        _ => AccessList::default(),
    };

    Ok(TxEip1559 {
        chain_id: params.chain_id,
        nonce: params.nonce,
        gas_limit,
        max_fee_per_gas,
        max_priority_fee_per_gas,
        to: TxKind::Call(params.to),
        value,
        access_list,
        input: Bytes::new(),
    })
}

/// Parses a decimal string into an arbitrary-precision integer, naming `field` on failure.
pub fn parse_decimal(field: &str, value: &str) -> Result<U256> {
    let trimmed = value.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(WalletError::SigningError(format!(
            "Field '{}' is not a decimal integer: {:?}",
            field, value
        )));
    }
    U256::from_str_radix(trimmed, 10).map_err(|e| {
        WalletError::SigningError(format!("Field '{}' could not be converted: {}", field, e))
    })
}

fn narrow<T: TryFrom<U256>>(field: &str, value: U256) -> Result<T> {
    T::try_from(value).map_err(|_| {
        WalletError::SigningError(format!("Field '{}' is out of range: {}", field, value))
    })
}

fn derive_signer(key: &SecureKeyStore) -> Result<PrivateKeySigner> {
    let text = key.read_str()?;
    let hex_body = text.strip_prefix("0x").unwrap_or(text);
    let bytes = Zeroizing::new(alloy::hex::decode(hex_body).map_err(|e| {
        WalletError::SigningError(format!("Failed to derive account from private key: {}", e))
    })?);

    PrivateKeySigner::from_slice(&bytes).map_err(|e| {
        WalletError::SigningError(format!("Failed to derive account from private key: {}", e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AccessListEntry;
    use alloy::{
        consensus::Transaction,
        eips::eip2718::Decodable2718,
        primitives::{address, keccak256, B256},
    };

    // Well-known test private key (Anvil's first account)
    const TEST_PRIVATE_KEY: &str =
        "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn test_params() -> TransactionParameters {
        TransactionParameters {
            to: address!("70997970C51812dc3A010C7d01b50e0d17dc79C8"),
            value: "1000000000000000000".into(),
            chain_id: 31337,
            nonce: 10,
            gas_limit: "21000".into(),
            max_fee_per_gas: "30000000000".into(),
            max_priority_fee_per_gas: "1000000000".into(),
            access_list: None,
        }
    }

    fn test_key() -> SecureKeyStore {
        SecureKeyStore::store(TEST_PRIVATE_KEY.to_string()).unwrap()
    }

    #[test]
    fn test_payload_field_mapping() {
        let tx = build_payload(&test_params()).unwrap();
        assert_eq!(tx.chain_id, 31337);
        assert_eq!(tx.nonce, 10);
        assert_eq!(tx.gas_limit, 21000);
        assert_eq!(tx.max_fee_per_gas, 30_000_000_000);
        assert_eq!(tx.max_priority_fee_per_gas, 1_000_000_000);
        assert_eq!(tx.value, U256::from(10u128.pow(18)));
        assert_eq!(tx.to, TxKind::Call(test_params().to));
        assert!(tx.access_list.is_empty());
    }

    #[test]
    fn test_access_list_mapped_when_present() {
        let mut params = test_params();
        params.access_list = Some(vec![AccessListEntry {
            address: params.to,
            storage_keys: vec![B256::ZERO],
        }]);
        let tx = build_payload(&params).unwrap();
        assert_eq!(tx.access_list.len(), 1);
        assert_eq!(tx.access_list.0[0].storage_keys, vec![B256::ZERO]);

        params.access_list = Some(vec![]);
        assert!(build_payload(&params).unwrap().access_list.is_empty());
    }

    #[test]
    fn test_non_numeric_field_named_in_error() {
        let mut params = test_params();
        params.max_fee_per_gas = "thirty gwei".into();
        let err = build_payload(&params).unwrap_err();
        assert!(matches!(err, WalletError::SigningError(_)));
        assert!(err.to_string().contains("maxFeePerGas"));

        let mut params = test_params();
        params.value = "-1".into();
        assert!(build_payload(&params).unwrap_err().to_string().contains("value"));
    }

    #[test]
    fn test_gas_limit_out_of_range() {
        let mut params = test_params();
        params.gas_limit = "18446744073709551616".into(); // u64::MAX + 1
        let err = build_payload(&params).unwrap_err();
        assert!(err.to_string().contains("gasLimit"));
    }

    #[test]
    fn test_parse_decimal_arbitrary_precision() {
        let max = U256::MAX.to_string();
        assert_eq!(parse_decimal("value", &max).unwrap(), U256::MAX);
        assert!(parse_decimal("value", "").is_err());
        assert!(parse_decimal("value", "0x10").is_err());
    }

    #[test]
    fn test_sign_is_deterministic_and_decodable() {
        let key = test_key();
        let signer = TransactionSigner::new();
        let a = signer.sign(&key, &test_params()).unwrap();
        let b = signer.sign(&key, &test_params()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.hash, keccak256(&a.raw));
        assert_eq!(a.raw[0], 0x02);
        assert!(a.to_hex().starts_with("0x02"));

        let decoded = TxEnvelope::decode_2718(&mut a.raw.as_ref()).unwrap();
        assert_eq!(decoded.nonce(), 10);
        assert_eq!(decoded.chain_id(), Some(31337));
    }

    #[test]
    fn test_new_nonce_new_signature() {
        let key = test_key();
        let signer = TransactionSigner::new();
        let a = signer.sign(&key, &test_params()).unwrap();
        let b = signer.sign(&key, &test_params().with_nonce(11)).unwrap();
        assert_ne!(a.hash, b.hash);
        assert_eq!(b.nonce, 11);
    }

    #[test]
    fn test_invalid_key_is_signing_error() {
        let key = SecureKeyStore::store("0xnot-a-key".to_string()).unwrap();
        let err = TransactionSigner::new().sign(&key, &test_params()).unwrap_err();
        assert!(matches!(err, WalletError::SigningError(msg) if msg.contains("derive account")));

        let key = SecureKeyStore::store("0x00".to_string()).unwrap();
        assert!(matches!(
            TransactionSigner::new().sign(&key, &test_params()),
            Err(WalletError::SigningError(_))
        ));
    }

    #[test]
    fn test_wiped_key_is_key_error() {
        let mut key = test_key();
        key.wipe();
        assert!(matches!(
            TransactionSigner::new().sign(&key, &test_params()),
            Err(WalletError::KeyError(_))
        ));
    }
}
