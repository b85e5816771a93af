pub mod backoff;
pub mod broadcast;
pub mod key_store;
pub mod pipeline;
pub mod retry;
pub mod rpc;
pub mod signer;

pub use self::{
    backoff::{BackoffPolicy, Sleeper, TokioSleeper},
    broadcast::{is_duplicate_submission, validate_rpc_url, Broadcaster},
    key_store::SecureKeyStore,
    pipeline::{process_transaction, process_transaction_with, PipelineOptions, TransactionPipeline},
    retry::{classify, ErrorClass, NonceRetryCoordinator},
    rpc::{AlloyRpc, RpcClient, RpcFailure},
    signer::TransactionSigner,
};
