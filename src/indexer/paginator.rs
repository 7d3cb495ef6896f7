use futures::future::{join_all, try_join_all};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use super::client::ChainClient;
use super::cursor::Cursor;
use super::scanner::{scan, scan_forward};
use super::types::{AddressFilter, ChainKey, ChainSpec, TransactionEvent};
use crate::error::LedgerError;

/// Resumable pagination token.
///
/// Holds no live handles: it can be serialized, stored anywhere, and handed
/// back later to continue exactly where the previous page stopped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FetchState {
    pub cursors: BTreeMap<ChainKey, Cursor>,
    /// Decoded but undelivered events per chain, newest first.
    pub buffers: BTreeMap<ChainKey, Vec<TransactionEvent>>,
    pub has_more: bool,
}

impl FetchState {
    fn pending(&self) -> bool {
        self.cursors.values().any(|c| !c.is_exhausted())
            || self.buffers.values().any(|b| !b.is_empty())
    }

    pub fn buffered(&self) -> usize {
        self.buffers.values().map(Vec::len).sum()
    }
}

/// One page of the merged ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    /// Newest first, at most `limit` long.
    pub events: Vec<TransactionEvent>,
    pub next_state: FetchState,
}

/// Result of a forward scan over every chain.
#[derive(Debug, Clone, Default)]
pub struct FullScan {
    /// Deduplicated, newest first.
    pub events: Vec<TransactionEvent>,
    /// Head block each chain was scanned up to.
    pub scanned_to: BTreeMap<ChainKey, u64>,
}

/// A chain deployment together with the client that reads it.
pub struct ChainSource<C> {
    pub spec: ChainSpec,
    pub client: C,
}

/// Merges the event streams of several chains into newest-first pages.
pub struct Paginator<C> {
    chains: Vec<ChainSource<C>>,
}

impl<C: ChainClient> Paginator<C> {
    pub fn new(chains: Vec<ChainSource<C>>) -> Self {
        Self { chains }
    }

    pub fn chains(&self) -> &[ChainSource<C>] {
        &self.chains
    }

    /// Fetch the next page of at most `limit` events.
    ///
    /// `state` is only read. On error the caller still holds its previous
    /// state unchanged and can retry with it.
    pub async fn fetch_page(
        &self,
        state: Option<&FetchState>,
        limit: usize,
        filter: Option<AddressFilter>,
    ) -> Result<Page, LedgerError> {
        if limit == 0 {
            return Err(LedgerError::InvalidLimit);
        }

        let mut state = state.cloned().unwrap_or_default();

        // Seed cursors for chains the state has never seen. All or nothing.
        let unseeded: Vec<&ChainSource<C>> = self
            .chains
            .iter()
            .filter(|source| !state.cursors.contains_key(&source.spec.key))
            .collect();
        if !unseeded.is_empty() {
            let seeded = try_join_all(unseeded.into_iter().map(seed_cursor)).await?;
            for (key, cursor) in seeded {
                tracing::debug!(chain = %key, cursor = %cursor, "Cursor initialised at head");
                state.cursors.insert(key, cursor);
            }
        }

        // A chain dropped from configuration is never scanned again; its
        // buffered events are still delivered.
        for (key, cursor) in state.cursors.iter_mut() {
            match self.chains.iter().find(|source| &source.spec.key == key) {
                Some(source) => *cursor = cursor.clamped(source.spec.deployment_block),
                None if !cursor.is_exhausted() => {
                    tracing::warn!(chain = %key, "Chain no longer configured, retiring cursor");
                    *cursor = Cursor::Exhausted;
                }
                None => {}
            }
        }

        // Top up every short buffer whose chain still has history to scan.
        let top_ups: Vec<_> = self
            .chains
            .iter()
            .filter_map(|source| {
                let cursor = *state.cursors.get(&source.spec.key)?;
                let buffered = state.buffers.get(&source.spec.key).map_or(0, Vec::len);
                match cursor {
                    Cursor::Next(from) if buffered < limit => Some(async move {
                        let outcome = scan(&source.client, &source.spec, from, limit, filter).await;
                        (source, cursor, outcome)
                    }),
                    _ => None,
                }
            })
            .collect();

        for (source, cursor, outcome) in join_all(top_ups).await {
            let key = source.spec.key.clone();
            let next = cursor.retreat_to(outcome.next_cursor, source.spec.deployment_block);
            tracing::debug!(
                chain = %key,
                found = outcome.events.len(),
                cursor = %next,
                "Buffer topped up"
            );
            state.cursors.insert(key.clone(), next);
            state.buffers.entry(key).or_default().extend(outcome.events);
        }

        let mut merged: Vec<TransactionEvent> = std::mem::take(&mut state.buffers)
            .into_values()
            .flatten()
            .collect();
        merged.sort_by(TransactionEvent::cmp_newest_first);

        let rest = if merged.len() > limit {
            merged.split_off(limit)
        } else {
            Vec::new()
        };

        let mut buffers: BTreeMap<ChainKey, Vec<TransactionEvent>> = state
            .cursors
            .keys()
            .map(|key| (key.clone(), Vec::new()))
            .collect();
        for event in rest {
            buffers.entry(event.chain.clone()).or_default().push(event);
        }
        state.buffers = buffers;
        state.has_more = state.pending();

        tracing::info!(
            returned = merged.len(),
            buffered = state.buffered(),
            has_more = state.has_more,
            "Ledger page fetched"
        );

        Ok(Page {
            events: merged,
            next_state: state,
        })
    }

    /// Every matching event from `from_block` (or each deployment block) up
    /// to the current heads, newest first.
    pub async fn fetch_all(
        &self,
        filter: Option<AddressFilter>,
        from_block: Option<u64>,
    ) -> Result<Vec<TransactionEvent>, LedgerError> {
        let resume: BTreeMap<ChainKey, u64> = match from_block {
            Some(block) => self
                .chains
                .iter()
                .map(|source| (source.spec.key.clone(), block))
                .collect(),
            None => BTreeMap::new(),
        };

        Ok(self.fetch_all_from(filter, &resume).await?.events)
    }

    /// Like [`Paginator::fetch_all`] with a resume block per chain. Chains
    /// missing from `resume` start at their deployment block.
    pub async fn fetch_all_from(
        &self,
        filter: Option<AddressFilter>,
        resume: &BTreeMap<ChainKey, u64>,
    ) -> Result<FullScan, LedgerError> {
        let heads = try_join_all(self.chains.iter().map(|source| async move {
            source
                .client
                .current_head()
                .await
                .map_err(|e| LedgerError::HeadLookup {
                    chain: source.spec.key.clone(),
                    source: e,
                })
        }))
        .await?;

        let scans = join_all(self.chains.iter().zip(heads).map(|(source, head)| async move {
            let from = resume
                .get(&source.spec.key)
                .copied()
                .unwrap_or(source.spec.deployment_block);
            let events = scan_forward(&source.client, &source.spec, from, head, filter).await;
            (source.spec.key.clone(), head, events)
        }))
        .await;

        let mut result = FullScan::default();
        for (key, head, events) in scans {
            result.scanned_to.insert(key, head);
            result.events.extend(events);
        }

        let before = result.events.len();
        let mut seen = HashSet::new();
        result.events.retain(|e| seen.insert(e.key()));
        result.events.sort_by(TransactionEvent::cmp_newest_first);

        tracing::info!(
            chains = result.scanned_to.len(),
            events = result.events.len(),
            duplicates = before - result.events.len(),
            "Full fetch complete"
        );
        Ok(result)
    }
}

async fn seed_cursor<C: ChainClient>(
    source: &ChainSource<C>,
) -> Result<(ChainKey, Cursor), LedgerError> {
    let head = source
        .client
        .current_head()
        .await
        .map_err(|e| LedgerError::HeadLookup {
            chain: source.spec.key.clone(),
            source: e,
        })?;
    Ok((
        source.spec.key.clone(),
        Cursor::at_head(head, source.spec.deployment_block),
    ))
}
