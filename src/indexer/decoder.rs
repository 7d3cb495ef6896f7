use alloy::primitives::U256;
use alloy::rpc::types::Log;
use alloy::sol;
use alloy::sol_types::SolEvent;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::str::FromStr;

use super::client::ChainClient;
use super::types::{ChainSpec, TransactionEvent};
use crate::error::DecodeError;

// Emitted by the payment contract for every completed purchase.
sol! {
    event BoughtStableCoins(
        address indexed buyer,
        address indexed receiver,
        uint256 amountSC,
        uint256 amountBC
    );
}

pub const STABLECOIN_DECIMALS: i64 = 6;
pub const BASE_CURRENCY_DECIMALS: i64 = 18;

/// Decode a raw log into a transaction event.
///
/// The timestamp is taken from the log when the node includes it; otherwise
/// it is left empty for [`resolve_timestamps`].
pub fn decode_purchase_log(log: &Log, chain: &ChainSpec) -> Result<TransactionEvent, DecodeError> {
    let decoded = BoughtStableCoins::decode_log(&log.inner)
        .map_err(|e| DecodeError::Abi(e.to_string()))?;

    let block_number = log.block_number.ok_or(DecodeError::MissingField("block number"))?;
    let transaction_hash = log
        .transaction_hash
        .ok_or(DecodeError::MissingField("transaction hash"))?;
    let log_index = log.log_index.ok_or(DecodeError::MissingField("log index"))?;

    Ok(TransactionEvent {
        chain: chain.key.clone(),
        chain_id: chain.chain_id,
        network: chain.name.clone(),
        buyer: decoded.buyer,
        receiver: decoded.receiver,
        amount_sc: scale_amount(decoded.amountSC, STABLECOIN_DECIMALS)?,
        amount_bc: scale_amount(decoded.amountBC, BASE_CURRENCY_DECIMALS)?,
        block_number,
        log_index,
        transaction_hash,
        timestamp: log
            .block_timestamp
            .and_then(|ts| DateTime::from_timestamp(ts as i64, 0)),
    })
}

/// Interpret a raw token integer as a fixed-point decimal.
fn scale_amount(raw: U256, decimals: i64) -> Result<BigDecimal, DecodeError> {
    let (digits, exponent) = BigDecimal::from_str(&raw.to_string())
        .map_err(|e| DecodeError::Abi(format!("amount {}: {}", raw, e)))?
        .into_bigint_and_exponent();
    Ok(BigDecimal::new(digits, exponent + decimals))
}

/// Fill in missing timestamps from block headers, one lookup per block.
///
/// A failed lookup falls back to the current time instead of failing the
/// batch.
pub async fn resolve_timestamps<C: ChainClient>(
    client: &C,
    chain: &ChainSpec,
    events: &mut [TransactionEvent],
) {
    let mut resolved: HashMap<u64, DateTime<Utc>> = HashMap::new();

    for event in events.iter_mut().filter(|e| e.timestamp.is_none()) {
        if let Some(ts) = resolved.get(&event.block_number) {
            event.timestamp = Some(*ts);
            continue;
        }

        let ts = match client.block_timestamp(event.block_number).await {
            Ok(secs) => DateTime::from_timestamp(secs as i64, 0).unwrap_or_else(Utc::now),
            Err(e) => {
                tracing::warn!(
                    chain = %chain.key,
                    block = event.block_number,
                    error = %e,
                    "Block timestamp lookup failed, using current time"
                );
                Utc::now()
            }
        };

        resolved.insert(event.block_number, ts);
        event.timestamp = Some(ts);
    }
}
