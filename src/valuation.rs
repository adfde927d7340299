//! Adjustment-aware valuation of a user's rewards.
//!
//! Every view starts from raw reward events, resolves the current adjustment
//! of each symbol as of today, drops delisted symbols and prices what is
//! left. Two pricing policies exist side by side and must not be merged:
//! [`notional_price`] for today's stats and [`ValuationEngine::cached_price`]
//! for the portfolio and the historical series.
use crate::core::{
    AdjustmentEffect, AdjustmentRegistry, Clock, PriceCache, RewardEvent, RewardLedger,
    StoreError,
};
use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

pub const QUANTITY_DP: u32 = 6;
pub const MONEY_DP: u32 = 2;

/// Price assumed for a symbol the refresher has not priced yet.
pub const DEFAULT_PRICE: Decimal = Decimal::ONE_THOUSAND;

pub fn round_quantity(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(QUANTITY_DP, RoundingStrategy::MidpointAwayFromZero)
}

pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MONEY_DP, RoundingStrategy::MidpointAwayFromZero)
}

/// Placeholder price derived from the symbol length: `1000 + 100 * len`.
pub fn notional_price(symbol: &str) -> Decimal {
    DEFAULT_PRICE + Decimal::ONE_HUNDRED * Decimal::from(symbol.chars().count())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolShares {
    pub symbol: String,
    pub total_shares: Decimal,
}

/// Today's rewards per symbol, valued at the notional price.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TodayStats {
    pub user_id: String,
    pub rewards: Vec<SymbolShares>,
    pub portfolio_value: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Holding {
    pub symbol: String,
    pub total_shares: Decimal,
    pub current_price: Decimal,
    pub total_value: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Portfolio {
    pub user_id: String,
    pub holdings: Vec<Holding>,
    pub grand_total: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyValue {
    pub date: NaiveDate,
    pub total: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoricalValue {
    pub user_id: String,
    pub days: Vec<DailyValue>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TodayRewards {
    pub user_id: String,
    pub rewards: Vec<RewardEvent>,
}

/// Failure to produce a valuation view.
#[derive(Debug, Error)]
pub enum ValuationError {
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A share count or value left the range a `Decimal` can hold.
    #[error("valuation for user {user_id} is out of range")]
    OutOfRange { user_id: String },
}

impl ValuationError {
    fn out_of_range(user_id: &str) -> Self {
        ValuationError::OutOfRange {
            user_id: user_id.to_string(),
        }
    }
}

fn checked_sum(values: impl IntoIterator<Item = Option<Decimal>>) -> Option<Decimal> {
    values
        .into_iter()
        .try_fold(Decimal::ZERO, |acc, value| acc.checked_add(value?))
}

pub struct ValuationEngine {
    ledger: Arc<dyn RewardLedger>,
    adjustments: Arc<dyn AdjustmentRegistry>,
    prices: Arc<dyn PriceCache>,
    clock: Arc<dyn Clock>,
}

impl ValuationEngine {
    pub fn new(
        ledger: Arc<dyn RewardLedger>,
        adjustments: Arc<dyn AdjustmentRegistry>,
        prices: Arc<dyn PriceCache>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            ledger,
            adjustments,
            prices,
            clock,
        }
    }

    /// Cached price of `symbol`, or [`DEFAULT_PRICE`] when none is cached.
    pub async fn cached_price(&self, symbol: &str) -> Result<Decimal, StoreError> {
        Ok(self
            .prices
            .get(symbol)
            .await?
            .map_or(DEFAULT_PRICE, |entry| entry.price))
    }

    /// Resolves each distinct symbol's adjustment once and keeps only the
    /// events of symbols that are not delisted, paired with their effect.
    async fn listed_events(
        &self,
        events: Vec<RewardEvent>,
        today: NaiveDate,
    ) -> Result<Vec<(RewardEvent, AdjustmentEffect)>, StoreError> {
        let mut effects: HashMap<String, AdjustmentEffect> = HashMap::new();
        for event in &events {
            if !effects.contains_key(&event.symbol) {
                let adjustment = self.adjustments.get(&event.symbol).await?;
                let effect = AdjustmentEffect::resolve(adjustment.as_ref(), today);
                effects.insert(event.symbol.clone(), effect);
            }
        }

        Ok(events
            .into_iter()
            .filter_map(|event| {
                let effect = effects[&event.symbol];
                if effect.delisted {
                    debug!("Skipping delisted {} for reward {}", event.symbol, event.id);
                    None
                } else {
                    Some((event, effect))
                }
            })
            .collect())
    }

    async fn prices_for(
        &self,
        symbols: &BTreeSet<String>,
    ) -> Result<HashMap<String, Decimal>, StoreError> {
        let mut prices = HashMap::with_capacity(symbols.len());
        for symbol in symbols {
            prices.insert(symbol.clone(), self.cached_price(symbol).await?);
        }
        Ok(prices)
    }

    /// Adjusted share totals per symbol, `None` on overflow.
    fn total_by_symbol(
        events: &[(RewardEvent, AdjustmentEffect)],
    ) -> Option<BTreeMap<String, Decimal>> {
        let mut totals: BTreeMap<String, Decimal> = BTreeMap::new();
        for (event, effect) in events {
            let total = totals.entry(event.symbol.clone()).or_default();
            *total = total.checked_add(effect.adjust(event.shares)?)?;
        }
        Some(totals)
    }

    pub async fn today_stats(&self, user_id: &str) -> Result<TodayStats, ValuationError> {
        let today = self.clock.today();
        let events = self.ledger.events_for_user_on(user_id, today).await?;
        let listed = self.listed_events(events, today).await?;

        let rewards: Vec<SymbolShares> = Self::total_by_symbol(&listed)
            .ok_or_else(|| ValuationError::out_of_range(user_id))?
            .into_iter()
            .map(|(symbol, total)| SymbolShares {
                symbol,
                total_shares: round_quantity(total),
            })
            .collect();
        let portfolio_value = checked_sum(
            rewards
                .iter()
                .map(|r| r.total_shares.checked_mul(notional_price(&r.symbol))),
        )
        .ok_or_else(|| ValuationError::out_of_range(user_id))?;

        Ok(TodayStats {
            user_id: user_id.to_string(),
            rewards,
            portfolio_value: round_money(portfolio_value),
        })
    }

    pub async fn portfolio(&self, user_id: &str) -> Result<Portfolio, ValuationError> {
        let today = self.clock.today();
        let events = self.ledger.all_events_for_user(user_id).await?;
        let listed = self.listed_events(events, today).await?;
        let totals = Self::total_by_symbol(&listed)
            .ok_or_else(|| ValuationError::out_of_range(user_id))?;
        let symbols: BTreeSet<String> = totals.keys().cloned().collect();
        let prices = self.prices_for(&symbols).await?;

        let holdings: Vec<Holding> = totals
            .into_iter()
            .map(|(symbol, total)| {
                let total_shares = round_quantity(total);
                let current_price = prices[&symbol];
                Some(Holding {
                    total_value: round_money(total_shares.checked_mul(current_price)?),
                    symbol,
                    total_shares,
                    current_price,
                })
            })
            .collect::<Option<_>>()
            .ok_or_else(|| ValuationError::out_of_range(user_id))?;
        let grand_total = checked_sum(holdings.iter().map(|h| Some(h.total_value)))
            .ok_or_else(|| ValuationError::out_of_range(user_id))?;

        Ok(Portfolio {
            user_id: user_id.to_string(),
            holdings,
            grand_total: round_money(grand_total),
        })
    }

    /// Value of the rewards granted on each past day, oldest first. Today is
    /// never included.
    pub async fn historical_inr(&self, user_id: &str) -> Result<HistoricalValue, ValuationError> {
        let today = self.clock.today();
        let events = self.ledger.events_for_user_before(user_id, today).await?;
        let listed = self.listed_events(events, today).await?;
        let symbols: BTreeSet<String> = listed.iter().map(|(e, _)| e.symbol.clone()).collect();
        let prices = self.prices_for(&symbols).await?;

        let mut per_day: BTreeMap<NaiveDate, Decimal> = BTreeMap::new();
        for (event, effect) in &listed {
            let value = effect
                .adjust(event.shares)
                .and_then(|shares| shares.checked_mul(prices[&event.symbol]));
            let day = per_day.entry(event.date()).or_default();
            *day = value
                .and_then(|value| day.checked_add(value))
                .ok_or_else(|| ValuationError::out_of_range(user_id))?;
        }

        Ok(HistoricalValue {
            user_id: user_id.to_string(),
            days: per_day
                .into_iter()
                .map(|(date, total)| DailyValue {
                    date,
                    total: round_money(total),
                })
                .collect(),
        })
    }

    /// Today's rewards, oldest first, with shares adjusted.
    pub async fn today_rewards(&self, user_id: &str) -> Result<TodayRewards, ValuationError> {
        let today = self.clock.today();
        let events = self.ledger.events_for_user_on(user_id, today).await?;
        let listed = self.listed_events(events, today).await?;

        let rewards: Vec<RewardEvent> = listed
            .into_iter()
            .map(|(event, effect)| {
                Some(RewardEvent {
                    shares: round_quantity(effect.adjust(event.shares)?),
                    ..event
                })
            })
            .collect::<Option<_>>()
            .ok_or_else(|| ValuationError::out_of_range(user_id))?;

        Ok(TodayRewards {
            user_id: user_id.to_string(),
            rewards,
        })
    }
}
