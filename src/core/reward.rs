//! Reward events and the ledger that records them.

use crate::core::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A single grant of shares to a user. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardEvent {
    pub id: u64,
    pub user_id: String,
    pub symbol: String,
    pub shares: Decimal,
    pub rewarded_at: DateTime<Utc>,
}

impl RewardEvent {
    pub fn date(&self) -> NaiveDate {
        self.rewarded_at.date_naive()
    }
}

/// A reward that has not been assigned an id yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReward {
    pub user_id: String,
    pub symbol: String,
    pub shares: Decimal,
    pub rewarded_at: DateTime<Utc>,
}

impl NewReward {
    pub fn new(
        user_id: impl Into<String>,
        symbol: impl Into<String>,
        shares: Decimal,
        rewarded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            symbol: symbol.into(),
            shares,
            rewarded_at,
        }
    }

    /// Key under which duplicates are detected: the same number of shares of
    /// the same symbol for the same user on the same UTC day.
    pub fn uniqueness_key(&self) -> String {
        // Free-form ids are length-prefixed so no id can spill into the next field.
        format!(
            "{}:{}{}:{}{}/{}",
            self.user_id.len(),
            self.user_id,
            self.symbol.len(),
            self.symbol,
            self.shares.normalize(),
            self.rewarded_at.date_naive()
        )
    }

    pub fn into_event(self, id: u64) -> RewardEvent {
        RewardEvent {
            id,
            user_id: self.user_id,
            symbol: self.symbol,
            shares: self.shares,
            rewarded_at: self.rewarded_at,
        }
    }

    pub(crate) fn conflict(&self) -> StoreError {
        StoreError::Conflict {
            user_id: self.user_id.clone(),
            symbol: self.symbol.clone(),
        }
    }
}

/// Append-only store of reward events.
///
/// Backends implement `record_reward`, `list_symbols` and
/// `all_events_for_user`; the date-scoped queries are derived from the latter.
#[async_trait]
pub trait RewardLedger: Send + Sync {
    /// Appends a reward with a server-assigned id. Returns
    /// [`StoreError::Conflict`] when an equivalent reward is already recorded.
    async fn record_reward(&self, reward: NewReward) -> Result<RewardEvent, StoreError>;

    /// Distinct symbols across every recorded reward.
    async fn list_symbols(&self) -> Result<BTreeSet<String>, StoreError>;

    async fn all_events_for_user(&self, user_id: &str) -> Result<Vec<RewardEvent>, StoreError>;

    /// Rewards whose timestamp falls on `date`, oldest first.
    async fn events_for_user_on(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<RewardEvent>, StoreError> {
        let mut events: Vec<_> = self
            .all_events_for_user(user_id)
            .await?
            .into_iter()
            .filter(|event| event.date() == date)
            .collect();
        events.sort_by(|a, b| a.rewarded_at.cmp(&b.rewarded_at).then(a.id.cmp(&b.id)));
        Ok(events)
    }

    /// Rewards strictly before `date`.
    async fn events_for_user_before(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<RewardEvent>, StoreError> {
        Ok(self
            .all_events_for_user(user_id)
            .await?
            .into_iter()
            .filter(|event| event.date() < date)
            .collect())
    }
}
