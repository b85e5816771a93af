use thiserror::Error;

use crate::wallet::rpc::RpcFailure;

#[derive(Error, Debug)]
pub enum WalletError {
    #[error("Invalid input: {0}")]
    InputError(String),

    #[error("Key error: {0}")]
    KeyError(String),

    #[error("Signing error: {0}")]
    SigningError(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Broadcast error: {0}")]
    BroadcastError(RpcFailure),

    #[error("Unexpected error: {0}")]
    UnexpectedError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, WalletError>;
