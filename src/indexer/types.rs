use alloy::primitives::{Address, B256};
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::config::{ChainConfig, PaginationConfig};

/// Stable identity of a chain, taken from configuration.
///
/// Every event carries its key from decode time onward; the display name is
/// never used to work out which chain an event belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChainKey(String);

impl ChainKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChainKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChainKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

/// Parsed, scan-ready description of one chain deployment.
#[derive(Debug, Clone)]
pub struct ChainSpec {
    pub key: ChainKey,
    pub name: String,
    pub chain_id: u64,
    pub contract: Address,
    pub deployment_block: u64,
    pub chunk_size: u64,
    pub max_scan_iterations: u32,
}

impl ChainSpec {
    pub fn from_config(config: &ChainConfig, pagination: &PaginationConfig) -> eyre::Result<Self> {
        let contract = Address::from_str(&config.contract_address).map_err(|e| {
            eyre::eyre!(
                "Invalid contract address '{}' on chain '{}': {}",
                config.contract_address,
                config.key,
                e
            )
        })?;

        Ok(Self {
            key: ChainKey::new(config.key.clone()),
            name: config.name.clone(),
            chain_id: config.chain_id,
            contract,
            deployment_block: config.deployment_block,
            chunk_size: config.chunk_size.max(1),
            max_scan_iterations: pagination.max_scan_iterations.max(1),
        })
    }
}

/// Which side of a purchase an address filter applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", content = "address", rename_all = "snake_case")]
pub enum AddressFilter {
    Buyer(Address),
    Receiver(Address),
    /// Matches logs where the address is the buyer or the receiver.
    Either(Address),
}

/// Topic constraints for one `eth_getLogs` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogQuery {
    pub buyer: Option<Address>,
    pub receiver: Option<Address>,
}

impl LogQuery {
    /// Expand an optional filter into the provider queries it needs.
    /// Indexed topics can only be matched by equality, so `Either` takes two.
    pub fn for_filter(filter: Option<AddressFilter>) -> Vec<LogQuery> {
        match filter {
            None => vec![LogQuery::default()],
            Some(AddressFilter::Buyer(addr)) => vec![LogQuery {
                buyer: Some(addr),
                receiver: None,
            }],
            Some(AddressFilter::Receiver(addr)) => vec![LogQuery {
                buyer: None,
                receiver: Some(addr),
            }],
            Some(AddressFilter::Either(addr)) => vec![
                LogQuery {
                    buyer: Some(addr),
                    receiver: None,
                },
                LogQuery {
                    buyer: None,
                    receiver: Some(addr),
                },
            ],
        }
    }
}

/// A decoded `BoughtStableCoins` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionEvent {
    pub chain: ChainKey,
    pub chain_id: u64,
    pub network: String,
    pub buyer: Address,
    pub receiver: Address,
    /// Stablecoin amount, 6 decimals.
    pub amount_sc: BigDecimal,
    /// Base-currency amount, 18 decimals.
    pub amount_bc: BigDecimal,
    #[serde(with = "decimal_u64")]
    pub block_number: u64,
    pub log_index: u64,
    pub transaction_hash: B256,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Identity of a log across the whole ledger.
pub type EventKey = (ChainKey, B256, u64);

impl TransactionEvent {
    pub fn key(&self) -> EventKey {
        (self.chain.clone(), self.transaction_hash, self.log_index)
    }

    /// Newest-first ordering: timestamp, then chain id, block number and log
    /// index, all descending. Events without a timestamp sort last.
    pub fn cmp_newest_first(&self, other: &Self) -> Ordering {
        other
            .timestamp
            .cmp(&self.timestamp)
            .then_with(|| other.chain_id.cmp(&self.chain_id))
            .then_with(|| other.block_number.cmp(&self.block_number))
            .then_with(|| other.log_index.cmp(&self.log_index))
    }
}

/// Serialize a `u64` as a decimal string so it survives JSON consumers that
/// only have double-precision numbers.
pub mod decimal_u64 {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse::<u64>()
            .map_err(|e| de::Error::custom(format!("invalid block number '{}': {}", raw, e)))
    }
}

/// Like [`decimal_u64`] for a per-chain block map.
pub mod decimal_u64_map {
    use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::BTreeMap;

    use super::ChainKey;

    pub fn serialize<S: Serializer>(
        map: &BTreeMap<ChainKey, u64>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        map.iter()
            .map(|(key, block)| (key, block.to_string()))
            .collect::<BTreeMap<_, _>>()
            .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<ChainKey, u64>, D::Error> {
        BTreeMap::<ChainKey, String>::deserialize(deserializer)?
            .into_iter()
            .map(|(key, raw)| {
                raw.parse::<u64>()
                    .map(|block| (key, block))
                    .map_err(|e| de::Error::custom(format!("invalid block number '{}': {}", raw, e)))
            })
            .collect()
    }
}
