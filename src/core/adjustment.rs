//! Corporate-action adjustments (split multipliers and delistings).

use crate::core::error::StoreError;
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// The current adjustment for a symbol. Upserting replaces the previous
/// record entirely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Adjustment {
    pub symbol: String,
    pub multiplier: Decimal,
    pub effective_date: NaiveDate,
    pub delisted: bool,
}

impl Adjustment {
    pub fn is_effective_on(&self, date: NaiveDate) -> bool {
        self.effective_date <= date
    }
}

/// What an (optional) adjustment means for a symbol on a given day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdjustmentEffect {
    pub multiplier: Decimal,
    pub delisted: bool,
}

impl Default for AdjustmentEffect {
    fn default() -> Self {
        Self {
            multiplier: Decimal::ONE,
            delisted: false,
        }
    }
}

impl AdjustmentEffect {
    /// An adjustment whose effective date is still in the future has no
    /// effect, neither its multiplier nor its delisting.
    pub fn resolve(adjustment: Option<&Adjustment>, today: NaiveDate) -> Self {
        match adjustment {
            Some(adj) if adj.is_effective_on(today) => Self {
                multiplier: adj.multiplier,
                delisted: adj.delisted,
            },
            _ => Self::default(),
        }
    }

    /// Adjusted share count, or `None` when it does not fit in a `Decimal`.
    pub fn adjust(&self, shares: Decimal) -> Option<Decimal> {
        shares.checked_mul(self.multiplier)
    }
}

/// One adjustment record per symbol.
#[async_trait]
pub trait AdjustmentRegistry: Send + Sync {
    async fn upsert(&self, adjustment: Adjustment) -> Result<(), StoreError>;

    async fn get(&self, symbol: &str) -> Result<Option<Adjustment>, StoreError>;

    /// Every adjustment, ordered by symbol.
    async fn list_all(&self) -> Result<Vec<Adjustment>, StoreError>;
}
