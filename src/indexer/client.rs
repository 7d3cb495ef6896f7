use alloy::primitives::Address;
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::{BlockNumberOrTag, Filter, Log};
use alloy::sol_types::SolEvent;
use std::future::Future;
use std::ops::RangeInclusive;
use std::time::Duration;

use super::decoder::BoughtStableCoins;
use super::types::{ChainKey, LogQuery};
use crate::config::ChainConfig;
use crate::error::ClientError;

/// Read access to one chain.
///
/// Implementations are owned per chain; nothing here is shared between
/// networks.
pub trait ChainClient: Send + Sync {
    /// Number of the newest block.
    fn current_head(&self) -> impl Future<Output = Result<u64, ClientError>> + Send;

    /// Unix timestamp (seconds) of a block.
    fn block_timestamp(&self, block: u64) -> impl Future<Output = Result<u64, ClientError>> + Send;

    /// `BoughtStableCoins` logs emitted by `contract` within `range`, oldest first.
    fn query_logs(
        &self,
        contract: Address,
        range: RangeInclusive<u64>,
        query: LogQuery,
    ) -> impl Future<Output = Result<Vec<Log>, ClientError>> + Send;
}

/// JSON-RPC client for a single chain.
pub struct RpcChainClient {
    chain: ChainKey,
    provider: DynProvider,
    timeout: Duration,
    max_retries: u32,
}

impl RpcChainClient {
    pub fn connect(config: &ChainConfig) -> eyre::Result<Self> {
        let url = config
            .rpc_http
            .parse()
            .map_err(|e| eyre::eyre!("Invalid RPC URL for chain '{}': {}", config.key, e))?;
        let provider = ProviderBuilder::new().connect_http(url).erased();

        Ok(Self {
            chain: ChainKey::new(config.key.clone()),
            provider,
            timeout: Duration::from_millis(config.request_timeout_ms),
            max_retries: config.max_retries,
        })
    }
}

impl ChainClient for RpcChainClient {
    async fn current_head(&self) -> Result<u64, ClientError> {
        retry_rpc(&self.chain, self.max_retries, self.timeout, || {
            self.provider.get_block_number()
        })
        .await
    }

    async fn block_timestamp(&self, block: u64) -> Result<u64, ClientError> {
        let header = retry_rpc(&self.chain, self.max_retries, self.timeout, || async {
            self.provider
                .get_block_by_number(BlockNumberOrTag::Number(block))
                .await
        })
        .await?;

        header
            .map(|b| b.header.timestamp)
            .ok_or(ClientError::BlockNotFound(block))
    }

    async fn query_logs(
        &self,
        contract: Address,
        range: RangeInclusive<u64>,
        query: LogQuery,
    ) -> Result<Vec<Log>, ClientError> {
        let mut filter = Filter::new()
            .address(contract)
            .event_signature(BoughtStableCoins::SIGNATURE_HASH)
            .from_block(*range.start())
            .to_block(*range.end());
        if let Some(buyer) = query.buyer {
            filter = filter.topic1(buyer.into_word());
        }
        if let Some(receiver) = query.receiver {
            filter = filter.topic2(receiver.into_word());
        }

        retry_rpc(&self.chain, self.max_retries, self.timeout, || {
            self.provider.get_logs(&filter)
        })
        .await
    }
}

/// Retry an async RPC call with a per-attempt timeout and exponential backoff.
/// Handles transient provider errors (rate limits, network issues).
pub async fn retry_rpc<F, Fut, T, E>(
    chain: &ChainKey,
    max_retries: u32,
    timeout: Duration,
    mut f: F,
) -> Result<T, ClientError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut delay = Duration::from_millis(500);
    let mut attempt = 0;

    loop {
        let error = match tokio::time::timeout(timeout, f()).await {
            Ok(Ok(val)) => return Ok(val),
            Ok(Err(e)) => ClientError::Rpc(e.to_string()),
            Err(_) => ClientError::Timeout,
        };

        if attempt >= max_retries {
            return Err(error);
        }
        attempt += 1;

        tracing::warn!(
            chain = %chain,
            attempt,
            max_retries,
            error = %error,
            delay_ms = delay.as_millis() as u64,
            "RPC call failed, retrying..."
        );
        tokio::time::sleep(delay).await;
        delay = std::cmp::min(delay * 2, Duration::from_secs(30));
    }
}
