use dotenv::dotenv;
use eyre::WrapErr;
use std::path::Path;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use eip1559_signer::{
    types::BroadcastStatus,
    utils::{load_transaction_parameters, read_key_file},
    wallet::{process_transaction_with, AlloyRpc, PipelineOptions},
    Config,
};

#[tokio::main]
async fn main() -> eyre::Result<()> {
    dotenv().ok();
    let _guard = init_tracing();

    let config = Config::from_env()?;

    let key_path = dotenv::var("KEY_FILE").wrap_err("KEY_FILE must be set in .env")?;
    let params_path = dotenv::var("TX_PARAMS_FILE").wrap_err("TX_PARAMS_FILE must be set in .env")?;
    let broadcast = matches!(
        dotenv::var("BROADCAST").as_deref(),
        Ok("1") | Ok("true") | Ok("yes")
    );
    let rpc_url = dotenv::var("RPC_URL").ok();

    let tx_params = load_transaction_parameters(Path::new(&params_path))?;
    let key = read_key_file(Path::new(&key_path))?;
    if !key.advisories.is_empty() {
        warn!(count = key.advisories.len(), "Key file has permission advisories");
    }

    info!(
        chain_id = tx_params.chain_id,
        nonce = tx_params.nonce,
        broadcast,
        max_retries = config.max_retries,
        "Processing transaction"
    );

    let options = PipelineOptions {
        private_key: key.store,
        tx_params,
        broadcast,
        rpc_url,
        max_retries: config.max_retries,
    };
    let result = process_transaction_with(options, config, AlloyRpc::connect).await?;

    println!("{}", serde_json::to_string_pretty(&result)?);

    match result.broadcast.as_ref().map(|b| b.status) {
        Some(BroadcastStatus::Failed) => Err(eyre::eyre!("Transaction was not broadcast")),
        Some(BroadcastStatus::BroadcastedButUnconfirmed) => {
            warn!("Transaction was broadcast but is not confirmed yet");
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Logs go to stderr so stdout carries only the JSON result.
fn init_tracing() -> WorkerGuard {
    let (writer, guard) = tracing_appender::non_blocking(std::io::stderr());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer);

    if matches!(dotenv::var("LOG_FORMAT").as_deref(), Ok("json")) {
        builder.json().init();
    } else {
        builder.init();
    }
    guard
}
