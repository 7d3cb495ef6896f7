pub mod handlers;
pub mod types;

use axum::{
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::PaginationConfig;
use crate::indexer::client::RpcChainClient;
use crate::indexer::paginator::Paginator;

pub struct AppState {
    pub pool: PgPool,
    pub paginator: Paginator<RpcChainClient>,
    pub pagination: PaginationConfig,
}

impl AppState {
    pub fn page_limit(&self, requested: Option<usize>) -> usize {
        clamp_limit(requested, &self.pagination)
    }
}

/// Requested page size, defaulted and capped by configuration.
fn clamp_limit(requested: Option<usize>, pagination: &PaginationConfig) -> usize {
    requested
        .unwrap_or(pagination.default_page_size)
        .clamp(1, pagination.max_page_size)
}

pub fn router(state: AppState) -> Router {
    let state = Arc::new(state);

    Router::new()
        .route("/api/v1/health", get(handlers::health))
        .route("/api/v1/transactions/page", post(handlers::transactions_page))
        .route(
            "/api/v1/wallet/{address}/transactions",
            get(handlers::wallet_transactions),
        )
        .route("/api/v1/wallet/{address}/sync", post(handlers::wallet_sync))
        .route("/api/v1/wallet/{address}/stats", get(handlers::wallet_stats))
        .route(
            "/api/v1/wallet/{address}",
            axum::routing::delete(handlers::clear_wallet),
        )
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

pub async fn serve(
    state: AppState,
    host: &str,
    port: u16,
    shutdown: CancellationToken,
) -> eyre::Result<()> {
    let app = router(state);
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "API server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    Ok(())
}
