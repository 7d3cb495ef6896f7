use alloy::primitives::Address;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::indexer::paginator::FetchState;
use crate::indexer::types::{decimal_u64, decimal_u64_map, AddressFilter, ChainKey, TransactionEvent};
use crate::stats::{OverviewStats, RevenuePoint};

/// Parse a `0x`-prefixed (or bare) 20-byte hex address from a URL path.
pub fn parse_address(hex_str: &str) -> Result<Address, String> {
    let stripped = hex_str.strip_prefix("0x").unwrap_or(hex_str);
    let bytes = hex::decode(stripped).map_err(|e| format!("Invalid hex address: {}", e))?;
    if bytes.len() != 20 {
        return Err(format!(
            "Invalid address '{}': expected 20 bytes, got {}",
            hex_str,
            bytes.len()
        ));
    }
    Ok(Address::from_slice(&bytes))
}

// ============================================================
// Query params
// ============================================================

/// Which side of a purchase a wallet is matched on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalletRole {
    #[default]
    Receiver,
    Buyer,
    Either,
}

impl WalletRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Receiver => "receiver",
            Self::Buyer => "buyer",
            Self::Either => "either",
        }
    }

    pub fn filter(&self, address: Address) -> AddressFilter {
        match self {
            Self::Receiver => AddressFilter::Receiver(address),
            Self::Buyer => AddressFilter::Buyer(address),
            Self::Either => AddressFilter::Either(address),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RoleParams {
    #[serde(default)]
    pub role: WalletRole,
}

#[derive(Debug, Deserialize)]
pub struct WalletPageParams {
    pub limit: Option<usize>,
    #[serde(default)]
    pub reset: bool,
    #[serde(default)]
    pub role: WalletRole,
}

#[derive(Debug, Deserialize)]
pub struct SyncParams {
    #[serde(default)]
    pub full: bool,
    #[serde(default)]
    pub role: WalletRole,
}

/// Stateless paging: the caller keeps the token.
#[derive(Debug, Deserialize)]
pub struct PageRequest {
    pub state: Option<FetchState>,
    pub limit: Option<usize>,
    pub filter: Option<AddressFilter>,
}

// ============================================================
// Response types
// ============================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub chains: Vec<ChainStatus>,
}

#[derive(Debug, Serialize)]
pub struct ChainStatus {
    pub key: ChainKey,
    pub name: String,
    pub chain_id: u64,
    #[serde(with = "decimal_u64")]
    pub deployment_block: u64,
}

#[derive(Debug, Serialize)]
pub struct PageResponse {
    pub events: Vec<TransactionEvent>,
    pub has_more: bool,
    pub next_state: FetchState,
}

#[derive(Debug, Serialize)]
pub struct WalletPageResponse {
    pub events: Vec<TransactionEvent>,
    pub has_more: bool,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub stats: OverviewStats,
    pub revenue: Vec<RevenuePoint>,
    #[serde(with = "decimal_u64_map")]
    pub last_synced: BTreeMap<ChainKey, u64>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct ClearResponse {
    pub sessions_removed: u64,
    pub caches_removed: u64,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
