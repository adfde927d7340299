use crate::core::{
    Adjustment, AdjustmentRegistry, NewReward, PriceCache, PriceEntry, RewardEvent, RewardLedger,
    StoreError,
};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Default)]
struct LedgerState {
    last_id: u64,
    events: Vec<RewardEvent>,
    keys: HashSet<String>,
}

/// In-memory reward ledger. Ids start at 1.
#[derive(Clone, Default)]
pub struct MemoryLedger {
    inner: Arc<Mutex<LedgerState>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RewardLedger for MemoryLedger {
    async fn record_reward(&self, reward: NewReward) -> Result<RewardEvent, StoreError> {
        let mut state = self.inner.lock().await;
        if !state.keys.insert(reward.uniqueness_key()) {
            debug!("Duplicate reward for {}/{}", reward.user_id, reward.symbol);
            return Err(reward.conflict());
        }
        state.last_id += 1;
        let event = reward.into_event(state.last_id);
        state.events.push(event.clone());
        debug!("Ledger APPEND id {}", event.id);
        Ok(event)
    }

    async fn list_symbols(&self) -> Result<BTreeSet<String>, StoreError> {
        let state = self.inner.lock().await;
        Ok(state.events.iter().map(|e| e.symbol.clone()).collect())
    }

    async fn all_events_for_user(&self, user_id: &str) -> Result<Vec<RewardEvent>, StoreError> {
        let state = self.inner.lock().await;
        Ok(state
            .events
            .iter()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect())
    }
}

/// In-memory adjustment registry keyed by symbol.
#[derive(Clone, Default)]
pub struct MemoryAdjustments {
    inner: Arc<Mutex<BTreeMap<String, Adjustment>>>,
}

impl MemoryAdjustments {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AdjustmentRegistry for MemoryAdjustments {
    async fn upsert(&self, adjustment: Adjustment) -> Result<(), StoreError> {
        let mut adjustments = self.inner.lock().await;
        debug!("Adjustment PUT for {}", adjustment.symbol);
        adjustments.insert(adjustment.symbol.clone(), adjustment);
        Ok(())
    }

    async fn get(&self, symbol: &str) -> Result<Option<Adjustment>, StoreError> {
        Ok(self.inner.lock().await.get(symbol).cloned())
    }

    async fn list_all(&self) -> Result<Vec<Adjustment>, StoreError> {
        Ok(self.inner.lock().await.values().cloned().collect())
    }
}

/// In-memory price cache keyed by symbol.
#[derive(Clone, Default)]
pub struct MemoryPriceCache {
    inner: Arc<Mutex<HashMap<String, PriceEntry>>>,
}

impl MemoryPriceCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PriceCache for MemoryPriceCache {
    async fn get(&self, symbol: &str) -> Result<Option<PriceEntry>, StoreError> {
        let cache = self.inner.lock().await;
        let entry = cache.get(symbol).cloned();
        if entry.is_some() {
            debug!("Price cache HIT for {symbol}");
        } else {
            debug!("Price cache MISS for {symbol}");
        }
        Ok(entry)
    }

    async fn upsert(&self, entry: PriceEntry) -> Result<(), StoreError> {
        let mut cache = self.inner.lock().await;
        debug!("Price cache PUT for {}", entry.symbol);
        cache.insert(entry.symbol.clone(), entry);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};
    use rust_decimal::Decimal;

    fn reward(user: &str, symbol: &str, shares: i64, day: u32, hour: u32) -> NewReward {
        NewReward::new(
            user,
            symbol,
            Decimal::from(shares),
            Utc.with_ymd_and_hms(2024, 6, day, hour, 0, 0).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_ledger_assigns_increasing_ids() {
        let ledger = MemoryLedger::new();
        let first = ledger.record_reward(reward("U1", "AAA", 1, 1, 9)).await.unwrap();
        let second = ledger.record_reward(reward("U1", "BBB", 1, 1, 9)).await.unwrap();
        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
    }

    #[tokio::test]
    async fn test_duplicate_reward_is_a_conflict() {
        let ledger = MemoryLedger::new();
        let results = [
            ledger.record_reward(reward("U1", "AAA", 10, 1, 9)).await,
            ledger.record_reward(reward("U1", "AAA", 10, 1, 15)).await,
        ];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(matches!(results[1], Err(StoreError::Conflict { .. })));
        assert_eq!(ledger.all_events_for_user("U1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_same_reward_on_another_day_or_user_is_accepted() {
        let ledger = MemoryLedger::new();
        ledger.record_reward(reward("U1", "AAA", 10, 1, 9)).await.unwrap();
        ledger.record_reward(reward("U1", "AAA", 10, 2, 9)).await.unwrap();
        ledger.record_reward(reward("U2", "AAA", 10, 1, 9)).await.unwrap();
        assert_eq!(ledger.all_events_for_user("U1").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_date_scoped_queries() {
        let ledger = MemoryLedger::new();
        ledger.record_reward(reward("U1", "AAA", 1, 2, 18)).await.unwrap();
        ledger.record_reward(reward("U1", "BBB", 2, 2, 8)).await.unwrap();
        ledger.record_reward(reward("U1", "CCC", 3, 1, 12)).await.unwrap();
        ledger.record_reward(reward("U2", "DDD", 4, 2, 12)).await.unwrap();

        let day = NaiveDate::from_ymd_opt(2024, 6, 2).unwrap();
        let today: Vec<_> = ledger
            .events_for_user_on("U1", day)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.symbol)
            .collect();
        assert_eq!(today, vec!["BBB", "AAA"]);

        let before = ledger.events_for_user_before("U1", day).await.unwrap();
        assert_eq!(before.len(), 1);
        assert_eq!(before[0].symbol, "CCC");

        let symbols = ledger.list_symbols().await.unwrap();
        assert_eq!(
            symbols.into_iter().collect::<Vec<_>>(),
            vec!["AAA", "BBB", "CCC", "DDD"]
        );
    }

    #[tokio::test]
    async fn test_adjustment_upsert_replaces_and_is_idempotent() {
        let registry = MemoryAdjustments::new();
        let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let split = Adjustment {
            symbol: "BBB".to_string(),
            multiplier: Decimal::TWO,
            effective_date: date,
            delisted: false,
        };
        registry.upsert(split.clone()).await.unwrap();
        registry.upsert(split.clone()).await.unwrap();
        assert_eq!(registry.get("BBB").await.unwrap(), Some(split.clone()));

        let delisting = Adjustment {
            delisted: true,
            ..split
        };
        registry.upsert(delisting.clone()).await.unwrap();
        registry
            .upsert(Adjustment {
                symbol: "AAA".to_string(),
                multiplier: Decimal::ONE,
                effective_date: date,
                delisted: false,
            })
            .await
            .unwrap();

        let all = registry.list_all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].symbol, "AAA");
        assert_eq!(all[1], delisting);
        assert!(registry.get("ZZZ").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_price_cache_get_upsert() {
        let cache = MemoryPriceCache::new();
        assert!(cache.get("AAA").await.unwrap().is_none());

        let entry = PriceEntry {
            symbol: "AAA".to_string(),
            price: Decimal::new(123456, 2),
            updated_at: Utc::now(),
        };
        cache.upsert(entry.clone()).await.unwrap();
        assert_eq!(cache.get("AAA").await.unwrap(), Some(entry));
    }
}
