//! Utility functions for loading the operator's inputs.
//!
//! This module provides helpers for:
//! - Reading a private key file into a [`SecureKeyStore`]
//! - Loading transaction parameters from JSON

use std::{fs, path::Path};
use tracing::warn;

use crate::{
    error::{Result, WalletError},
    types::TransactionParameters,
    wallet::SecureKeyStore,
};

/// A loaded key plus anything the operator should be told about the file it came from.
#[derive(Debug)]
pub struct KeyFile {
    pub store: SecureKeyStore,
    pub advisories: Vec<String>,
}

/// Reads a private key file. The file content goes straight into a [`SecureKeyStore`],
/// which zeroizes the intermediate string.
///
/// # Arguments
/// * `path` - Path of a file holding a hex encoded private key
pub fn read_key_file(path: &Path) -> Result<KeyFile> {
    let metadata = fs::metadata(path).map_err(|e| {
        WalletError::KeyError(format!("Cannot read key file {}: {}", path.display(), e))
    })?;
    if !metadata.is_file() {
        return Err(WalletError::KeyError(format!(
            "Key path {} is not a file",
            path.display()
        )));
    }

    let advisories = permission_advisories(path, &metadata);
    for advisory in &advisories {
        warn!(path = %path.display(), "{}", advisory);
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        WalletError::KeyError(format!("Cannot read key file {}: {}", path.display(), e))
    })?;
    let store = SecureKeyStore::store(contents)?;

    Ok(KeyFile { store, advisories })
}

#[cfg(unix)]
fn permission_advisories(path: &Path, metadata: &fs::Metadata) -> Vec<String> {
    use std::os::unix::fs::PermissionsExt;

    let mode = metadata.permissions().mode() & 0o777;
    if mode & 0o077 != 0 {
        vec![format!(
            "Key file {} has permissions {:o}, readable beyond its owner; consider chmod 600",
            path.display(),
            mode
        )]
    } else {
        Vec::new()
    }
}

#[cfg(not(unix))]
fn permission_advisories(_path: &Path, _metadata: &fs::Metadata) -> Vec<String> {
    Vec::new()
}

/// Loads transaction parameters from a JSON file with camelCase keys.
pub fn load_transaction_parameters(path: &Path) -> Result<TransactionParameters> {
    let contents = fs::read_to_string(path)?;
    serde_json::from_str(&contents).map_err(|e| {
        WalletError::InputError(format!(
            "Invalid transaction parameters in {}: {}",
            path.display(),
            e
        ))
    })
}
