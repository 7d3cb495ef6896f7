use std::collections::HashSet;
use std::ops::RangeInclusive;

use super::client::ChainClient;
use super::cursor::Cursor;
use super::decoder::{decode_purchase_log, resolve_timestamps};
use super::types::{AddressFilter, ChainSpec, LogQuery, TransactionEvent};

/// Result of one backward scan on a single chain.
#[derive(Debug)]
pub struct ScanOutcome {
    /// Newest first.
    pub events: Vec<TransactionEvent>,
    pub next_cursor: Cursor,
}

/// Walk backward from `from_block` in `chain.chunk_size` chunks.
///
/// Stops once `min_count` events are collected, the deployment block has been
/// scanned, or `chain.max_scan_iterations` chunks have been queried. Reaching
/// the deployment block always yields [`Cursor::Exhausted`], even when
/// nothing was found.
pub async fn scan<C: ChainClient>(
    client: &C,
    chain: &ChainSpec,
    from_block: u64,
    min_count: usize,
    filter: Option<AddressFilter>,
) -> ScanOutcome {
    let floor = chain.deployment_block;
    if from_block < floor {
        return ScanOutcome {
            events: Vec::new(),
            next_cursor: Cursor::Exhausted,
        };
    }

    let queries = LogQuery::for_filter(filter);
    let mut events = Vec::new();
    let mut high = from_block;
    let mut iterations = 0u32;

    let next_cursor = loop {
        let low = high.saturating_sub(chain.chunk_size - 1).max(floor);

        // Chunks arrive oldest-first; flip them so the running list stays newest-first.
        let mut chunk = query_chunk(client, chain, low..=high, &queries).await;
        chunk.reverse();
        events.extend(chunk);
        iterations += 1;

        if low == floor {
            break Cursor::Exhausted;
        }
        high = low - 1;

        if events.len() >= min_count || iterations >= chain.max_scan_iterations {
            break Cursor::Next(high);
        }
    };

    resolve_timestamps(client, chain, &mut events).await;

    tracing::debug!(
        chain = %chain.key,
        from = from_block,
        chunks = iterations,
        found = events.len(),
        next = %next_cursor,
        "Backward scan finished"
    );

    ScanOutcome {
        events,
        next_cursor,
    }
}

/// Walk `from_block..=to_block` forward, oldest first, with no early exit.
pub async fn scan_forward<C: ChainClient>(
    client: &C,
    chain: &ChainSpec,
    from_block: u64,
    to_block: u64,
    filter: Option<AddressFilter>,
) -> Vec<TransactionEvent> {
    let from_block = from_block.max(chain.deployment_block);
    if from_block > to_block {
        tracing::debug!(chain = %chain.key, from_block, to_block, "Nothing to scan");
        return Vec::new();
    }

    let queries = LogQuery::for_filter(filter);
    let total_blocks = to_block - from_block + 1;
    let mut events = Vec::new();
    let mut current = from_block;

    while current <= to_block {
        let chunk_end = current.saturating_add(chain.chunk_size - 1).min(to_block);
        let progress = ((current - from_block) as f64 / total_blocks as f64 * 100.0) as u32;

        tracing::debug!(
            chain = %chain.key,
            from = current,
            to = chunk_end,
            progress = %format!("{}%", progress),
            "Scanning block range"
        );

        events.extend(query_chunk(client, chain, current..=chunk_end, &queries).await);

        if chunk_end == u64::MAX {
            break;
        }
        current = chunk_end + 1;
    }

    resolve_timestamps(client, chain, &mut events).await;

    tracing::info!(
        chain = %chain.key,
        from = from_block,
        to = to_block,
        found = events.len(),
        "Forward scan complete"
    );
    events
}

/// Query and decode one chunk, oldest first.
///
/// A failed query or an undecodable log is logged and skipped; neither aborts
/// the scan.
async fn query_chunk<C: ChainClient>(
    client: &C,
    chain: &ChainSpec,
    range: RangeInclusive<u64>,
    queries: &[LogQuery],
) -> Vec<TransactionEvent> {
    let mut events = Vec::new();

    for query in queries {
        let logs = match client.query_logs(chain.contract, range.clone(), *query).await {
            Ok(logs) => logs,
            Err(e) => {
                tracing::warn!(
                    chain = %chain.key,
                    from = range.start(),
                    to = range.end(),
                    error = %e,
                    "Log query failed, treating chunk as empty"
                );
                continue;
            }
        };

        for log in &logs {
            match decode_purchase_log(log, chain) {
                Ok(event) => events.push(event),
                Err(e) => tracing::warn!(
                    chain = %chain.key,
                    block = ?log.block_number,
                    tx = ?log.transaction_hash,
                    error = %e,
                    "Skipping undecodable log"
                ),
            }
        }
    }

    if queries.len() > 1 {
        // A log matching on both sides comes back from both queries.
        events.sort_by_key(|e| (e.block_number, e.log_index));
        let mut seen = HashSet::new();
        events.retain(|e| seen.insert((e.transaction_hash, e.log_index)));
    }

    events
}
