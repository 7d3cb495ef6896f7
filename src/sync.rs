use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::error::LedgerError;
use crate::indexer::client::ChainClient;
use crate::indexer::paginator::{FullScan, Paginator};
use crate::indexer::types::{decimal_u64_map, AddressFilter, ChainKey, TransactionEvent};

/// Locally kept copy of a wallet's full ledger, refreshed by forward scans.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncCache {
    pub filter: Option<AddressFilter>,
    /// Newest first, unique by `(chain, tx hash, log index)`.
    pub events: Vec<TransactionEvent>,
    /// Highest block scanned per chain.
    #[serde(with = "decimal_u64_map")]
    pub last_synced: BTreeMap<ChainKey, u64>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    Full,
    Incremental,
}

/// Summary of one sync run.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub mode: SyncMode,
    pub new_events: usize,
    pub total_events: usize,
    #[serde(with = "decimal_u64_map")]
    pub last_synced: BTreeMap<ChainKey, u64>,
}

impl SyncCache {
    pub fn new(filter: Option<AddressFilter>) -> Self {
        Self {
            filter,
            ..Default::default()
        }
    }

    /// First unscanned block per chain.
    pub fn resume_points(&self) -> BTreeMap<ChainKey, u64> {
        self.last_synced
            .iter()
            .map(|(key, block)| (key.clone(), block.saturating_add(1)))
            .collect()
    }

    /// Replace the cache with a complete scan. Returns the event count.
    pub fn apply_full(&mut self, scan: FullScan) -> usize {
        self.events.clear();
        self.last_synced.clear();
        self.apply_incremental(scan)
    }

    /// Merge a scan of newer blocks. Returns how many events were new.
    pub fn apply_incremental(&mut self, scan: FullScan) -> usize {
        let mut seen: HashSet<_> = self.events.iter().map(TransactionEvent::key).collect();
        let before = self.events.len();

        for event in scan.events {
            if seen.insert(event.key()) {
                self.events.push(event);
            }
        }
        self.events.sort_by(TransactionEvent::cmp_newest_first);

        for (key, head) in scan.scanned_to {
            let synced = self.last_synced.entry(key).or_insert(head);
            *synced = (*synced).max(head);
        }
        self.updated_at = Some(Utc::now());

        self.events.len() - before
    }
}

/// Bring `cache` up to date for `filter`.
///
/// A missing cache, a cache built for a different filter, or `full = true`
/// triggers a complete rescan from each deployment block.
pub async fn sync<C: ChainClient>(
    paginator: &Paginator<C>,
    cache: Option<SyncCache>,
    filter: Option<AddressFilter>,
    full: bool,
) -> Result<(SyncCache, SyncReport), LedgerError> {
    let (mut cache, mode) = match cache {
        Some(cache) if !full && cache.filter == filter => (cache, SyncMode::Incremental),
        _ => (SyncCache::new(filter), SyncMode::Full),
    };

    let scan = paginator
        .fetch_all_from(filter, &cache.resume_points())
        .await?;

    let new_events = match mode {
        SyncMode::Full => cache.apply_full(scan),
        SyncMode::Incremental => cache.apply_incremental(scan),
    };

    tracing::info!(
        mode = ?mode,
        new_events,
        total = cache.events.len(),
        "Ledger sync complete"
    );

    let report = SyncReport {
        mode,
        new_events,
        total_events: cache.events.len(),
        last_synced: cache.last_synced.clone(),
    };
    Ok((cache, report))
}
