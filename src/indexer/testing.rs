//! In-memory chain client and fixtures for unit tests.

use alloy::primitives::{keccak256, Address, LogData, B256, U256};
use alloy::rpc::types::Log;
use alloy::sol_types::SolEvent;
use bigdecimal::BigDecimal;
use chrono::DateTime;
use std::collections::HashSet;
use std::ops::RangeInclusive;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::client::ChainClient;
use super::decoder::BoughtStableCoins;
use super::types::{ChainKey, ChainSpec, LogQuery, TransactionEvent};
use crate::error::ClientError;

/// Timestamp of block 0 on every mock chain; blocks are 12 seconds apart.
pub const BASE_TIME: i64 = 1_700_000_000;

pub const BUYER: Address = Address::new([0xb0; 20]);
pub const MERCHANT: Address = Address::new([0x5e; 20]);

pub fn block_time(block: u64) -> i64 {
    BASE_TIME + block as i64 * 12
}

pub fn chain_spec(key: &str, chain_id: u64, deployment_block: u64) -> ChainSpec {
    ChainSpec {
        key: ChainKey::from(key),
        name: format!("{} network", key),
        chain_id,
        contract: Address::repeat_byte(chain_id as u8),
        deployment_block,
        chunk_size: 50,
        max_scan_iterations: 10_000,
    }
}

pub fn tx_hash(chain_id: u64, block: u64, log_index: u64) -> B256 {
    keccak256(format!("{}:{}:{}", chain_id, block, log_index))
}

pub fn purchase_log(
    chain: &ChainSpec,
    buyer: Address,
    receiver: Address,
    amount_sc: U256,
    amount_bc: U256,
    block: u64,
    log_index: u64,
) -> Log {
    let topics = vec![
        BoughtStableCoins::SIGNATURE_HASH,
        buyer.into_word(),
        receiver.into_word(),
    ];
    let mut data = Vec::with_capacity(64);
    data.extend_from_slice(&amount_sc.to_be_bytes::<32>());
    data.extend_from_slice(&amount_bc.to_be_bytes::<32>());

    Log {
        inner: alloy::primitives::Log {
            address: chain.contract,
            data: LogData::new_unchecked(topics, data.into()),
        },
        block_number: Some(block),
        transaction_hash: Some(tx_hash(chain.chain_id, block, log_index)),
        log_index: Some(log_index),
        ..Default::default()
    }
}

/// A purchase from [`BUYER`] to [`MERCHANT`] at each of `blocks`.
pub fn merchant_logs(chain: &ChainSpec, blocks: &[u64]) -> Vec<Log> {
    blocks
        .iter()
        .map(|&block| {
            purchase_log(
                chain,
                BUYER,
                MERCHANT,
                U256::from(1_000_000u64),
                U256::from(10u64).pow(U256::from(18u64)),
                block,
                0,
            )
        })
        .collect()
}

/// A decoded event as the scanner would produce it.
pub fn event(key: &str, chain_id: u64, block: u64, log_index: u64) -> TransactionEvent {
    TransactionEvent {
        chain: ChainKey::from(key),
        chain_id,
        network: format!("{} network", key),
        buyer: BUYER,
        receiver: MERCHANT,
        amount_sc: BigDecimal::from(1),
        amount_bc: BigDecimal::from(1),
        block_number: block,
        log_index,
        transaction_hash: tx_hash(chain_id, block, log_index),
        timestamp: DateTime::from_timestamp(block_time(block), 0),
    }
}

pub struct MockChainClient {
    head: u64,
    logs: Vec<Log>,
    head_fails: bool,
    failing_chunks: Vec<RangeInclusive<u64>>,
    failing_timestamps: HashSet<u64>,
    queries: AtomicUsize,
}

impl MockChainClient {
    pub fn new(head: u64) -> Self {
        Self {
            head,
            logs: Vec::new(),
            head_fails: false,
            failing_chunks: Vec::new(),
            failing_timestamps: HashSet::new(),
            queries: AtomicUsize::new(0),
        }
    }

    pub fn with_logs(mut self, logs: Vec<Log>) -> Self {
        self.logs.extend(logs);
        self
    }

    pub fn failing_head(mut self) -> Self {
        self.head_fails = true;
        self
    }

    /// Any chunk query overlapping `range` fails.
    pub fn failing_chunk(mut self, range: RangeInclusive<u64>) -> Self {
        self.failing_chunks.push(range);
        self
    }

    pub fn failing_timestamp(mut self, block: u64) -> Self {
        self.failing_timestamps.insert(block);
        self
    }

    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

impl ChainClient for MockChainClient {
    async fn current_head(&self) -> Result<u64, ClientError> {
        if self.head_fails {
            return Err(ClientError::Rpc("head unavailable".to_string()));
        }
        Ok(self.head)
    }

    async fn block_timestamp(&self, block: u64) -> Result<u64, ClientError> {
        if self.failing_timestamps.contains(&block) {
            return Err(ClientError::Timeout);
        }
        Ok(block_time(block) as u64)
    }

    async fn query_logs(
        &self,
        contract: Address,
        range: RangeInclusive<u64>,
        query: LogQuery,
    ) -> Result<Vec<Log>, ClientError> {
        self.queries.fetch_add(1, Ordering::SeqCst);

        if self
            .failing_chunks
            .iter()
            .any(|bad| bad.start() <= range.end() && range.start() <= bad.end())
        {
            return Err(ClientError::Timeout);
        }

        let mut matched: Vec<Log> = self
            .logs
            .iter()
            .filter(|log| log.inner.address == contract)
            .filter(|log| log.block_number.is_some_and(|b| range.contains(&b)))
            .filter(|log| {
                let topics = log.inner.data.topics();
                query.buyer.map_or(true, |a| topics[1] == a.into_word())
                    && query.receiver.map_or(true, |a| topics[2] == a.into_word())
            })
            .cloned()
            .collect();
        matched.sort_by_key(|log| (log.block_number, log.log_index));
        Ok(matched)
    }
}
