//! Background task that keeps the price cache populated.

use crate::core::{PriceCache, PriceEntry, PriceProvider, RewardLedger, StoreError};
use anyhow::Result;
use chrono::Utc;
use futures::future::join_all;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Outcome of one refresh pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    pub updated: usize,
    pub failed: usize,
}

/// Re-prices every symbol in the ledger on a fixed interval.
pub struct PriceRefresher {
    ledger: Arc<dyn RewardLedger>,
    prices: Arc<dyn PriceCache>,
    provider: Arc<dyn PriceProvider>,
    interval: Duration,
}

impl PriceRefresher {
    pub fn new(
        ledger: Arc<dyn RewardLedger>,
        prices: Arc<dyn PriceCache>,
        provider: Arc<dyn PriceProvider>,
        interval: Duration,
    ) -> Self {
        Self {
            ledger,
            prices,
            provider,
            interval,
        }
    }

    async fn refresh_symbol(&self, symbol: &str) -> Result<Decimal> {
        let price = self.provider.fetch_price(symbol).await?;
        self.prices
            .upsert(PriceEntry {
                symbol: symbol.to_string(),
                price,
                updated_at: Utc::now(),
            })
            .await?;
        Ok(price)
    }

    /// Prices every known symbol once. A symbol that fails is logged and
    /// counted; it never stops the others.
    pub async fn refresh_once(&self) -> Result<RefreshSummary, StoreError> {
        let symbols = self.ledger.list_symbols().await?;
        debug!("Refreshing prices for {} symbols", symbols.len());

        let results = join_all(symbols.iter().map(|symbol| async move {
            (symbol, self.refresh_symbol(symbol).await)
        }))
        .await;

        let mut summary = RefreshSummary::default();
        for (symbol, result) in results {
            match result {
                Ok(price) => {
                    info!("Stock {symbol} price updated to {price:.2}");
                    summary.updated += 1;
                }
                Err(e) => {
                    error!("Error updating price for {symbol}: {e:#}");
                    summary.failed += 1;
                }
            }
        }
        Ok(summary)
    }

    /// Starts the loop on the current runtime. The first pass runs
    /// immediately.
    pub fn spawn(self) -> RefresherHandle {
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(self.run(cancel.clone()));
        RefresherHandle { cancel, handle }
    }

    async fn run(self, cancel: CancellationToken) {
        info!("Price refresher started, interval {:?}", self.interval);
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            match self.refresh_once().await {
                Ok(summary) if summary.failed > 0 => warn!(
                    "Price refresh finished with {} failures ({} updated)",
                    summary.failed, summary.updated
                ),
                Ok(summary) => debug!("Price refresh updated {} symbols", summary.updated),
                Err(e) => error!("Error retrieving stock symbols: {e}"),
            }
        }
        info!("Price refresher stopped");
    }
}

/// Owns a running refresher; dropping it leaves the task running.
pub struct RefresherHandle {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl RefresherHandle {
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Signals the loop to stop between ticks and waits for it.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.handle.await {
            error!("Price refresher task failed: {e}");
        }
    }
}
