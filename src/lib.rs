pub mod api;
pub mod core;
pub mod refresher;
pub mod store;
pub mod valuation;

use crate::core::config::AppConfig;
use crate::core::{Clock, MockPriceProvider, SystemClock};
use crate::refresher::PriceRefresher;
use crate::store::Stores;
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Loads the config and serves until Ctrl-C.
pub async fn run(config_path: Option<&str>) -> Result<()> {
    info!("Stocky starting...");

    let config = AppConfig::load(config_path)?;
    debug!("Loaded config: {config:#?}");

    let shutdown = CancellationToken::new();
    let on_signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
            on_signal.cancel();
        }
    });

    let stores = Stores::open(&config.storage)?;
    let listener = TcpListener::bind(config.server.bind_addr())
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind_addr()))?;
    serve(listener, stores, Arc::new(SystemClock), &config, shutdown).await
}

/// Runs the price refresher and the HTTP server on `listener` until
/// `shutdown` is cancelled, then stops the refresher and flushes the stores.
pub async fn serve(
    listener: TcpListener,
    stores: Stores,
    clock: Arc<dyn Clock>,
    config: &AppConfig,
    shutdown: CancellationToken,
) -> Result<()> {
    let refresher = PriceRefresher::new(
        Arc::clone(&stores.ledger),
        Arc::clone(&stores.prices),
        Arc::new(MockPriceProvider::new()),
        config.refresher.interval(),
    )
    .spawn();

    let app = api::create_app(api::AppState::new(&stores, clock));
    info!("Server listening on {}", listener.local_addr()?);

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await;

    refresher.shutdown().await;
    stores.persist()?;
    info!("Server stopped");
    served.context("HTTP server failed")
}
