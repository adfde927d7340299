//! Core domain types and storage abstractions

pub mod adjustment;
pub mod clock;
pub mod config;
pub mod error;
pub mod log;
pub mod price;
pub mod reward;

// Re-export main types for cleaner imports
pub use adjustment::{Adjustment, AdjustmentEffect, AdjustmentRegistry};
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::StoreError;
pub use price::{MockPriceProvider, PriceCache, PriceEntry, PriceProvider};
pub use reward::{NewReward, RewardEvent, RewardLedger};
