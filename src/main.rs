use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use stablepay_ledger::api::{self, AppState};
use stablepay_ledger::config::Config;
use stablepay_ledger::indexer::client::RpcChainClient;
use stablepay_ledger::indexer::paginator::{ChainSource, Paginator};
use stablepay_ledger::indexer::types::ChainSpec;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;

    // Initialize structured logging (set RUST_LOG=info for output)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    tracing::info!("StablePay ledger starting");

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    let config = Config::load(&config_path)?;
    tracing::info!(
        chains = config.chains.len(),
        "Configuration loaded from {}",
        config_path
    );

    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await
        .map_err(|e| eyre::eyre!("Failed to connect to database: {}", e))?;

    tracing::info!("Connected to PostgreSQL");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| eyre::eyre!("Failed to run migrations: {}", e))?;

    tracing::info!("Database migrations complete");

    let mut sources = Vec::with_capacity(config.chains.len());
    for chain_config in &config.chains {
        let spec = ChainSpec::from_config(chain_config, &config.pagination)?;
        let client = RpcChainClient::connect(chain_config)?;
        tracing::info!(
            chain = %spec.key,
            chain_id = spec.chain_id,
            contract = %spec.contract,
            deployment_block = spec.deployment_block,
            "Chain registered"
        );
        sources.push(ChainSource { spec, client });
    }

    if !config.api.enabled {
        tracing::warn!("API disabled in configuration, nothing to serve");
        return Ok(());
    }

    let state = AppState {
        pool,
        paginator: Paginator::new(sources),
        pagination: config.pagination.clone(),
    };

    let shutdown = CancellationToken::new();
    let server = {
        let shutdown = shutdown.clone();
        let host = config.api.host.clone();
        let port = config.api.port;
        tokio::spawn(async move {
            if let Err(e) = api::serve(state, &host, port, shutdown).await {
                tracing::error!(error = %e, "API server failed");
            }
        })
    };

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received, stopping API server...");
    shutdown.cancel();
    let _ = server.await;

    tracing::info!("StablePay ledger stopped gracefully");
    Ok(())
}
