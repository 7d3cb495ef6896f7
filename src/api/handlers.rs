use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use std::sync::Arc;

use super::types::*;
use super::AppState;
use crate::db::repository;
use crate::error::LedgerError;
use crate::stats::{revenue_by_day, OverviewStats};
use crate::sync::{self, SyncReport};

type ApiError = (StatusCode, Json<ErrorResponse>);
type ApiResult<T> = Result<Json<T>, ApiError>;

fn api_error(status: StatusCode, msg: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: msg.into(),
        }),
    )
}

fn internal(e: eyre::Report) -> ApiError {
    api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

fn ledger_error(e: LedgerError) -> ApiError {
    let status = match e {
        LedgerError::HeadLookup { .. } => StatusCode::BAD_GATEWAY,
        LedgerError::InvalidLimit => StatusCode::BAD_REQUEST,
    };
    api_error(status, e.to_string())
}

fn wallet_address(address: &str) -> Result<alloy::primitives::Address, ApiError> {
    parse_address(address).map_err(|e| api_error(StatusCode::BAD_REQUEST, e))
}

// ============================================================
// Health
// ============================================================

pub async fn health(State(state): State<Arc<AppState>>) -> ApiResult<HealthResponse> {
    let chains = state
        .paginator
        .chains()
        .iter()
        .map(|source| ChainStatus {
            key: source.spec.key.clone(),
            name: source.spec.name.clone(),
            chain_id: source.spec.chain_id,
            deployment_block: source.spec.deployment_block,
        })
        .collect();

    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        chains,
    }))
}

// ============================================================
// Transactions
// ============================================================

/// Stateless "load more": the caller sends back the token it was given.
pub async fn transactions_page(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PageRequest>,
) -> ApiResult<PageResponse> {
    let limit = state.page_limit(request.limit);
    let page = state
        .paginator
        .fetch_page(request.state.as_ref(), limit, request.filter)
        .await
        .map_err(ledger_error)?;

    Ok(Json(PageResponse {
        events: page.events,
        has_more: page.next_state.has_more,
        next_state: page.next_state,
    }))
}

/// "Load more" for a wallet, with the token kept server side.
pub async fn wallet_transactions(
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
    Query(params): Query<WalletPageParams>,
) -> ApiResult<WalletPageResponse> {
    let wallet = wallet_address(&address)?;
    let key = repository::session_key(&wallet.to_string(), params.role.as_str());
    let limit = state.page_limit(params.limit);

    let previous = if params.reset {
        None
    } else {
        repository::load_fetch_state(&state.pool, &key)
            .await
            .map_err(internal)?
    };

    let page = state
        .paginator
        .fetch_page(previous.as_ref(), limit, Some(params.role.filter(wallet)))
        .await
        .map_err(ledger_error)?;

    repository::save_fetch_state(&state.pool, &key, &page.next_state)
        .await
        .map_err(internal)?;

    Ok(Json(WalletPageResponse {
        events: page.events,
        has_more: page.next_state.has_more,
    }))
}

// ============================================================
// Sync & Stats
// ============================================================

pub async fn wallet_sync(
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
    Query(params): Query<SyncParams>,
) -> ApiResult<SyncReport> {
    let wallet = wallet_address(&address)?;
    let key = repository::session_key(&wallet.to_string(), params.role.as_str());

    let cached = repository::load_sync_cache(&state.pool, &key)
        .await
        .map_err(internal)?;

    let (cache, report) = sync::sync(
        &state.paginator,
        cached,
        Some(params.role.filter(wallet)),
        params.full,
    )
    .await
    .map_err(ledger_error)?;

    repository::save_sync_cache(&state.pool, &key, &cache)
        .await
        .map_err(internal)?;

    Ok(Json(report))
}

pub async fn wallet_stats(
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
    Query(params): Query<RoleParams>,
) -> ApiResult<StatsResponse> {
    let wallet = wallet_address(&address)?;
    let key = repository::session_key(&wallet.to_string(), params.role.as_str());

    let cache = repository::load_sync_cache(&state.pool, &key)
        .await
        .map_err(internal)?
        .unwrap_or_default();

    Ok(Json(StatsResponse {
        stats: OverviewStats::from_events(&cache.events),
        revenue: revenue_by_day(&cache.events),
        last_synced: cache.last_synced,
        updated_at: cache.updated_at,
    }))
}

pub async fn clear_wallet(
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
    Query(params): Query<RoleParams>,
) -> ApiResult<ClearResponse> {
    let wallet = wallet_address(&address)?;
    let key = repository::session_key(&wallet.to_string(), params.role.as_str());

    let sessions_removed = repository::delete_fetch_state(&state.pool, &key)
        .await
        .map_err(internal)?;
    let caches_removed = repository::delete_sync_cache(&state.pool, &key)
        .await
        .map_err(internal)?;

    Ok(Json(ClearResponse {
        sessions_removed,
        caches_removed,
    }))
}
