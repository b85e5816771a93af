pub mod config;
pub mod error;
pub mod networks;
pub mod types;
pub mod utils;
pub mod wallet;

pub use config::Config;
pub use error::{Result, WalletError};
pub use types::{BroadcastOutcome, BroadcastStatus, PipelineResult, SignedTransaction, TransactionParameters};
pub use wallet::{process_transaction, process_transaction_with, PipelineOptions, SecureKeyStore};
