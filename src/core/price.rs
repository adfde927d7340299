//! Pricing abstractions and core types

use crate::core::error::StoreError;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Mock prices are drawn in paise from `[900.00, 2500.00)`.
const MOCK_PRICE_MIN_PAISE: i64 = 90_000;
const MOCK_PRICE_MAX_PAISE: i64 = 250_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceEntry {
    pub symbol: String,
    pub price: Decimal,
    pub updated_at: DateTime<Utc>,
}

/// Latest known price per symbol. Written by the refresher only.
#[async_trait]
pub trait PriceCache: Send + Sync {
    async fn get(&self, symbol: &str) -> Result<Option<PriceEntry>, StoreError>;

    async fn upsert(&self, entry: PriceEntry) -> Result<(), StoreError>;
}

#[async_trait]
pub trait PriceProvider: Send + Sync {
    async fn fetch_price(&self, symbol: &str) -> Result<Decimal>;
}

/// Stands in for a market-data feed: uniform random prices with two
/// decimal places.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockPriceProvider;

impl MockPriceProvider {
    pub fn new() -> Self {
        Self
    }
}

pub fn mock_price() -> Decimal {
    let paise = rand::rng().random_range(MOCK_PRICE_MIN_PAISE..MOCK_PRICE_MAX_PAISE);
    Decimal::new(paise, 2)
}

#[async_trait]
impl PriceProvider for MockPriceProvider {
    async fn fetch_price(&self, _symbol: &str) -> Result<Decimal> {
        Ok(mock_price())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_prices_stay_in_range() {
        let provider = MockPriceProvider::new();
        let low = Decimal::from(900);
        let high = Decimal::from(2500);
        for _ in 0..1_000 {
            let price = provider.fetch_price("AAA").await.unwrap();
            assert!(price >= low && price < high, "price out of range: {price}");
            assert!(price.scale() <= 2);
        }
    }
}
