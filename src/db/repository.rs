use serde::de::DeserializeOwned;
use sqlx::PgPool;

use crate::indexer::paginator::FetchState;
use crate::sync::SyncCache;

/// Store the pagination token for a session, replacing any previous one.
pub async fn save_fetch_state(
    pool: &PgPool,
    session_key: &str,
    state: &FetchState,
) -> eyre::Result<()> {
    let payload = serde_json::to_string(state)?;

    sqlx::query(
        "INSERT INTO fetch_sessions (session_key, state, updated_at)
         VALUES ($1, $2, NOW())
         ON CONFLICT (session_key) DO UPDATE
         SET state = $2, updated_at = NOW()",
    )
    .bind(session_key)
    .bind(payload)
    .execute(pool)
    .await?;

    Ok(())
}

/// Load a session's pagination token. Returns None if absent or unreadable.
pub async fn load_fetch_state(pool: &PgPool, session_key: &str) -> eyre::Result<Option<FetchState>> {
    let row: Option<(String,)> =
        sqlx::query_as("SELECT state FROM fetch_sessions WHERE session_key = $1")
            .bind(session_key)
            .fetch_optional(pool)
            .await?;

    Ok(row.and_then(|(payload,)| parse_stored(session_key, "fetch state", &payload)))
}

pub async fn delete_fetch_state(pool: &PgPool, session_key: &str) -> eyre::Result<u64> {
    let result = sqlx::query("DELETE FROM fetch_sessions WHERE session_key = $1")
        .bind(session_key)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

pub async fn save_sync_cache(pool: &PgPool, cache_key: &str, cache: &SyncCache) -> eyre::Result<()> {
    let payload = serde_json::to_string(cache)?;

    sqlx::query(
        "INSERT INTO sync_caches (cache_key, cache, updated_at)
         VALUES ($1, $2, NOW())
         ON CONFLICT (cache_key) DO UPDATE
         SET cache = $2, updated_at = NOW()",
    )
    .bind(cache_key)
    .bind(payload)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn load_sync_cache(pool: &PgPool, cache_key: &str) -> eyre::Result<Option<SyncCache>> {
    let row: Option<(String,)> =
        sqlx::query_as("SELECT cache FROM sync_caches WHERE cache_key = $1")
            .bind(cache_key)
            .fetch_optional(pool)
            .await?;

    Ok(row.and_then(|(payload,)| parse_stored(cache_key, "sync cache", &payload)))
}

pub async fn delete_sync_cache(pool: &PgPool, cache_key: &str) -> eyre::Result<u64> {
    let result = sqlx::query("DELETE FROM sync_caches WHERE cache_key = $1")
        .bind(cache_key)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

/// A payload written by an older, incompatible build is treated as missing.
fn parse_stored<T: DeserializeOwned>(key: &str, what: &str, payload: &str) -> Option<T> {
    match serde_json::from_str(payload) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(key, what, error = %e, "Discarding unreadable stored payload");
            None
        }
    }
}

/// Key under which a wallet's state is stored. Addresses are case-insensitive.
pub fn session_key(address: &str, scope: &str) -> String {
    format!("{}:{}", address.to_lowercase(), scope)
}
