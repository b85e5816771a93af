//! Static directory of well-known EVM networks.
//!
//! Used only to decorate results with a block explorer link. An unknown chain is
//! never an error, it simply has no explorer.

use alloy::primitives::TxHash;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkInfo {
    pub chain_id: u64,
    pub name: &'static str,
    pub explorer_url: Option<&'static str>,
}

const NETWORKS: &[NetworkInfo] = &[
    NetworkInfo {
        chain_id: 1,
        name: "Ethereum Mainnet",
        explorer_url: Some("https://etherscan.io"),
    },
    NetworkInfo {
        chain_id: 10,
        name: "OP Mainnet",
        explorer_url: Some("https://optimistic.etherscan.io"),
    },
    NetworkInfo {
        chain_id: 56,
        name: "BNB Smart Chain",
        explorer_url: Some("https://bscscan.com"),
    },
    NetworkInfo {
        chain_id: 137,
        name: "Polygon",
        explorer_url: Some("https://polygonscan.com"),
    },
    NetworkInfo {
        chain_id: 8453,
        name: "Base",
        explorer_url: Some("https://basescan.org"),
    },
    NetworkInfo {
        chain_id: 17000,
        name: "Holesky",
        explorer_url: Some("https://holesky.etherscan.io"),
    },
    NetworkInfo {
        chain_id: 31337,
        name: "Anvil",
        explorer_url: None,
    },
    NetworkInfo {
        chain_id: 42161,
        name: "Arbitrum One",
        explorer_url: Some("https://arbiscan.io"),
    },
    NetworkInfo {
        chain_id: 59144,
        name: "Linea",
        explorer_url: Some("https://lineascan.build"),
    },
    NetworkInfo {
        chain_id: 84532,
        name: "Base Sepolia",
        explorer_url: Some("https://sepolia.basescan.org"),
    },
    NetworkInfo {
        chain_id: 11155111,
        name: "Sepolia",
        explorer_url: Some("https://sepolia.etherscan.io"),
    },
];

pub fn lookup(chain_id: u64) -> Option<&'static NetworkInfo> {
    NETWORKS.iter().find(|n| n.chain_id == chain_id)
}

/// Explorer page for a transaction, if the chain has a known explorer.
pub fn explorer_tx_url(chain_id: u64, hash: TxHash) -> Option<String> {
    let base = lookup(chain_id)?.explorer_url?;
    Some(format!("{}/tx/{}", base.trim_end_matches('/'), hash))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_chain() {
        let info = lookup(11155111).unwrap();
        assert_eq!(info.name, "Sepolia");
        let url = explorer_tx_url(11155111, TxHash::ZERO).unwrap();
        assert_eq!(
            url,
            format!("https://sepolia.etherscan.io/tx/0x{}", "0".repeat(64))
        );
    }

    #[test]
    fn test_unknown_chain_or_missing_explorer() {
        assert!(lookup(999_999).is_none());
        assert!(explorer_tx_url(999_999, TxHash::ZERO).is_none());
        assert!(explorer_tx_url(31337, TxHash::ZERO).is_none());
    }
}
