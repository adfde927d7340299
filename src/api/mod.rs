//! HTTP surface: router, shared state and handlers.

pub mod dto;
pub mod error;
pub mod handlers;

use crate::core::{AdjustmentRegistry, Clock, RewardLedger};
use crate::store::Stores;
use crate::valuation::ValuationEngine;
use axum::Router;
use axum::routing::{get, post};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Handles shared by every handler. Cloned per request.
#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<dyn RewardLedger>,
    pub adjustments: Arc<dyn AdjustmentRegistry>,
    pub engine: Arc<ValuationEngine>,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    pub fn new(stores: &Stores, clock: Arc<dyn Clock>) -> Self {
        let engine = ValuationEngine::new(
            Arc::clone(&stores.ledger),
            Arc::clone(&stores.adjustments),
            Arc::clone(&stores.prices),
            Arc::clone(&clock),
        );
        Self {
            ledger: Arc::clone(&stores.ledger),
            adjustments: Arc::clone(&stores.adjustments),
            engine: Arc::new(engine),
            clock,
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/reward", post(handlers::add_reward))
        .route("/stats/{user_id}", get(handlers::get_stats))
        .route("/portfolio/{user_id}", get(handlers::get_portfolio))
        .route("/historical-inr/{user_id}", get(handlers::get_historical_inr))
        .route("/today-stocks/{user_id}", get(handlers::get_today_stocks))
        .route("/stock-adjustment", post(handlers::upsert_adjustment))
        .route("/stock-adjustments", get(handlers::list_adjustments))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
