//! Request and response bodies. Decimal fields travel as JSON numbers.

use crate::api::error::{ApiError, ApiResult};
use crate::core::{Adjustment, RewardEvent};
use crate::valuation::{HistoricalValue, Portfolio, TodayRewards, TodayStats};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub const REWARD_RECORDED: &str = "Reward recorded successfully";
pub const ADJUSTMENT_RECORDED: &str = "Stock adjustment recorded successfully";

fn required<T>(value: Option<T>, field: &str) -> ApiResult<T> {
    value.ok_or_else(|| ApiError::Validation(format!("{field} is required")))
}

/// Zero counts as missing, like an absent number.
fn required_nonzero(value: Option<Decimal>, field: &str) -> ApiResult<Decimal> {
    required(value, field).and_then(|number| {
        if number.is_zero() {
            Err(ApiError::Validation(format!("{field} must not be zero")))
        } else {
            Ok(number)
        }
    })
}

fn required_text(value: Option<String>, field: &str) -> ApiResult<String> {
    required(value, field).and_then(|text| {
        if text.is_empty() {
            Err(ApiError::Validation(format!("{field} must not be empty")))
        } else {
            Ok(text)
        }
    })
}

#[derive(Debug, Default, Deserialize)]
pub struct RewardRequest {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub stock_symbol: Option<String>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub shares: Option<Decimal>,
}

/// A reward request that passed the presence checks.
#[derive(Debug, PartialEq, Eq)]
pub struct ValidReward {
    pub user_id: String,
    pub symbol: String,
    pub shares: Decimal,
}

impl RewardRequest {
    pub fn validate(self) -> ApiResult<ValidReward> {
        Ok(ValidReward {
            user_id: required_text(self.user_id, "user_id")?,
            symbol: required_text(self.stock_symbol, "stock_symbol")?,
            shares: required_nonzero(self.shares, "shares")?,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct RewardResponse {
    pub message: &'static str,
    pub reward_id: u64,
    pub reward_time: DateTime<Utc>,
}

impl From<RewardEvent> for RewardResponse {
    fn from(event: RewardEvent) -> Self {
        Self {
            message: REWARD_RECORDED,
            reward_id: event.id,
            reward_time: event.rewarded_at,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct AdjustmentRequest {
    #[serde(default)]
    pub stock_symbol: Option<String>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub multiplier: Option<Decimal>,
    /// `YYYY-MM-DD`
    #[serde(default)]
    pub effective_date: Option<String>,
    #[serde(default)]
    pub delisted: bool,
}

impl AdjustmentRequest {
    pub fn validate(self) -> ApiResult<Adjustment> {
        let symbol = required_text(self.stock_symbol, "stock_symbol")?;
        let multiplier = required_nonzero(self.multiplier, "multiplier")?;
        let raw_date = required_text(self.effective_date, "effective_date")?;
        let effective_date = NaiveDate::parse_from_str(&raw_date, "%Y-%m-%d").map_err(|e| {
            ApiError::Validation(format!("effective_date {raw_date:?} is not YYYY-MM-DD: {e}"))
        })?;
        Ok(Adjustment {
            symbol,
            multiplier,
            effective_date,
            delisted: self.delisted,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct AdjustmentResponse {
    pub message: &'static str,
    pub stock: String,
}

#[derive(Debug, Serialize)]
pub struct AdjustmentDto {
    pub stock_symbol: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub multiplier: Decimal,
    pub effective_date: NaiveDate,
    pub delisted: bool,
}

#[derive(Debug, Serialize)]
pub struct AdjustmentsResponse {
    pub adjustments: Vec<AdjustmentDto>,
}

impl From<Vec<Adjustment>> for AdjustmentsResponse {
    fn from(adjustments: Vec<Adjustment>) -> Self {
        Self {
            adjustments: adjustments
                .into_iter()
                .map(|a| AdjustmentDto {
                    stock_symbol: a.symbol,
                    multiplier: a.multiplier,
                    effective_date: a.effective_date,
                    delisted: a.delisted,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StockStat {
    pub stock_symbol: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_shares: Decimal,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub user_id: String,
    pub today_rewards: Vec<StockStat>,
    #[serde(with = "rust_decimal::serde::float")]
    pub portfolio_inr_value: Decimal,
}

impl From<TodayStats> for StatsResponse {
    fn from(stats: TodayStats) -> Self {
        Self {
            user_id: stats.user_id,
            today_rewards: stats
                .rewards
                .into_iter()
                .map(|r| StockStat {
                    stock_symbol: r.symbol,
                    total_shares: r.total_shares,
                })
                .collect(),
            portfolio_inr_value: stats.portfolio_value,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HoldingDto {
    pub stock_symbol: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_shares: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub current_price: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_value_inr: Decimal,
}

#[derive(Debug, Serialize)]
pub struct PortfolioResponse {
    pub user_id: String,
    pub portfolio: Vec<HoldingDto>,
    #[serde(with = "rust_decimal::serde::float")]
    pub portfolio_total_inr: Decimal,
}

impl From<Portfolio> for PortfolioResponse {
    fn from(portfolio: Portfolio) -> Self {
        Self {
            user_id: portfolio.user_id,
            portfolio: portfolio
                .holdings
                .into_iter()
                .map(|h| HoldingDto {
                    stock_symbol: h.symbol,
                    total_shares: h.total_shares,
                    current_price: h.current_price,
                    total_value_inr: h.total_value,
                })
                .collect(),
            portfolio_total_inr: portfolio.grand_total,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HistoricalDto {
    pub date: NaiveDate,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_inr: Decimal,
}

#[derive(Debug, Serialize)]
pub struct HistoricalResponse {
    pub user_id: String,
    pub historical_inr: Vec<HistoricalDto>,
}

impl From<HistoricalValue> for HistoricalResponse {
    fn from(history: HistoricalValue) -> Self {
        Self {
            user_id: history.user_id,
            historical_inr: history
                .days
                .into_iter()
                .map(|d| HistoricalDto {
                    date: d.date,
                    total_inr: d.total,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RewardDto {
    pub reward_id: u64,
    pub stock_symbol: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub shares: Decimal,
    pub reward_time: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct TodayStocksResponse {
    pub user_id: String,
    pub rewards_today: Vec<RewardDto>,
}

impl From<TodayRewards> for TodayStocksResponse {
    fn from(today: TodayRewards) -> Self {
        Self {
            user_id: today.user_id,
            rewards_today: today
                .rewards
                .into_iter()
                .map(|r| RewardDto {
                    reward_id: r.id,
                    stock_symbol: r.symbol,
                    shares: r.shares,
                    reward_time: r.rewarded_at,
                })
                .collect(),
        }
    }
}
