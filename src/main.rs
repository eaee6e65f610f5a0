use alloy::providers::ProviderBuilder;
use dotenv::dotenv;
use std::sync::Arc;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use wrap_swap_bridge::{
    journal::FileSink, utils::load_accounts_from_env, BatchOrchestrator, Config, Journal,
    RpcChain,
};

/// Console output filtered by `RUST_LOG`, plus a daily JSON file when
/// `DIAGNOSTIC_LOG_DIR` is set.
fn init_tracing() -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let (json_layer, guard) = match dotenv::var("DIAGNOSTIC_LOG_DIR") {
        Ok(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "wrap-swap-bridge.json");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().json().with_writer(writer)), Some(guard))
        }
        Err(_) => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(json_layer)
        .init();

    guard
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    dotenv().ok();
    let _guard = init_tracing();

    let config = Config::from_env()?;
    let accounts = load_accounts_from_env()?;

    let rpc_url = dotenv::var("RPC_URL").map_err(|_| eyre::eyre!("RPC_URL must be set"))?;
    let provider = Arc::new(ProviderBuilder::new().connect(&rpc_url).await?);
    let chain = RpcChain::new(provider, config.confirmation).await?;
    info!("Provider Chain ID: {}", chain.chain_id());

    let log_file = dotenv::var("LOG_FILE").unwrap_or_else(|_| "wrap_swap_bridge.log".to_string());
    let sink = FileSink::open(&log_file)?;
    info!("Journal: {}", sink.path().display());
    let journal = Journal::new(Arc::new(sink));

    info!(
        accounts = accounts.len(),
        parallel = config.max_parallel_accounts,
        "Loaded configuration"
    );

    let orchestrator = BatchOrchestrator::new(Arc::new(chain), config, journal)?;
    let summary = orchestrator.run_batch(&accounts).await?;
    orchestrator.print_statistics(&summary);

    Ok(())
}
