use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::indexer::types::{ChainKey, TransactionEvent};

/// Headline numbers for the merchant overview.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverviewStats {
    pub transactions_processed: u64,
    /// Sum of base-currency amounts.
    pub revenue_generated: BigDecimal,
    /// Sum of stablecoin amounts.
    pub stablecoin_volume: BigDecimal,
    /// Percent. Purchase events are only emitted for completed purchases, so
    /// this is 100 whenever there is any activity.
    pub success_rate: u32,
    pub failed_transactions: u64,
    pub pending_transactions: u64,
    pub per_chain: BTreeMap<ChainKey, u64>,
}

impl OverviewStats {
    pub fn from_events(events: &[TransactionEvent]) -> Self {
        let mut revenue = BigDecimal::from(0);
        let mut volume = BigDecimal::from(0);
        let mut per_chain: BTreeMap<ChainKey, u64> = BTreeMap::new();

        for event in events {
            revenue += &event.amount_bc;
            volume += &event.amount_sc;
            *per_chain.entry(event.chain.clone()).or_default() += 1;
        }

        Self {
            transactions_processed: events.len() as u64,
            revenue_generated: revenue.normalized(),
            stablecoin_volume: volume.normalized(),
            success_rate: if events.is_empty() { 0 } else { 100 },
            failed_transactions: 0,
            pending_transactions: 0,
            per_chain,
        }
    }
}

/// One bar of the revenue chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RevenuePoint {
    pub day: NaiveDate,
    pub revenue: BigDecimal,
    pub transactions: u64,
}

/// Revenue per UTC day, oldest day first. Events without a timestamp are
/// left out.
pub fn revenue_by_day(events: &[TransactionEvent]) -> Vec<RevenuePoint> {
    let mut days: BTreeMap<NaiveDate, (BigDecimal, u64)> = BTreeMap::new();

    for event in events {
        let Some(ts) = event.timestamp else {
            continue;
        };
        let (revenue, count) = days
            .entry(ts.date_naive())
            .or_insert_with(|| (BigDecimal::from(0), 0));
        *revenue += &event.amount_bc;
        *count += 1;
    }

    days.into_iter()
        .map(|(day, (revenue, transactions))| RevenuePoint {
            day,
            revenue: revenue.normalized(),
            transactions,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::testing::event;
    use chrono::{TimeZone, Utc};
    use std::str::FromStr;

    fn priced(key: &str, block: u64, bc: &str, sc: &str) -> TransactionEvent {
        let mut e = event(key, 1, block, 0);
        e.amount_bc = BigDecimal::from_str(bc).unwrap();
        e.amount_sc = BigDecimal::from_str(sc).unwrap();
        e
    }

    #[test]
    fn test_overview_sums_exactly() {
        let events = vec![
            priced("sepolia", 1, "0.1", "10.5"),
            priced("sepolia", 2, "0.2", "20.25"),
            priced("mordor", 3, "0.000000000000000001", "0.000001"),
        ];

        let stats = OverviewStats::from_events(&events);
        assert_eq!(stats.transactions_processed, 3);
        assert_eq!(
            stats.revenue_generated,
            BigDecimal::from_str("0.300000000000000001").unwrap()
        );
        assert_eq!(stats.stablecoin_volume, BigDecimal::from_str("30.750001").unwrap());
        assert_eq!(stats.success_rate, 100);
        assert_eq!(stats.per_chain[&ChainKey::from("sepolia")], 2);
        assert_eq!(stats.per_chain[&ChainKey::from("mordor")], 1);
    }

    #[test]
    fn test_overview_of_nothing() {
        let stats = OverviewStats::from_events(&[]);
        assert_eq!(stats.transactions_processed, 0);
        assert_eq!(stats.success_rate, 0);
        assert_eq!(stats.revenue_generated, BigDecimal::from(0));
    }

    #[test]
    fn test_revenue_by_day_groups_and_orders() {
        let mut late = priced("sepolia", 1, "2", "1");
        late.timestamp = Some(Utc.with_ymd_and_hms(2024, 3, 2, 23, 59, 0).unwrap());
        let mut early = priced("sepolia", 2, "1.5", "1");
        early.timestamp = Some(Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap());
        let mut same_day = priced("mordor", 3, "0.5", "1");
        same_day.timestamp = Some(Utc.with_ymd_and_hms(2024, 3, 1, 20, 0, 0).unwrap());
        let mut undated = priced("mordor", 4, "9", "1");
        undated.timestamp = None;

        let series = revenue_by_day(&[late, early, same_day, undated]);
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].day, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(series[0].revenue, BigDecimal::from(2));
        assert_eq!(series[0].transactions, 2);
        assert_eq!(series[1].revenue, BigDecimal::from(2));
    }
}
