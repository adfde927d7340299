//! Route handlers.

use crate::api::AppState;
use crate::api::dto::{
    ADJUSTMENT_RECORDED, AdjustmentRequest, AdjustmentResponse, AdjustmentsResponse,
    HistoricalResponse, PortfolioResponse, RewardRequest, RewardResponse, StatsResponse,
    TodayStocksResponse,
};
use crate::api::error::{ApiError, ApiResult};
use crate::core::NewReward;
use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use serde_json::{Value, json};
use tracing::{info, warn};

/// `GET /health`
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// `POST /reward`
pub async fn add_reward(
    State(state): State<AppState>,
    payload: Result<Json<RewardRequest>, JsonRejection>,
) -> ApiResult<Json<RewardResponse>> {
    let Json(request) = payload.map_err(|e| ApiError::Validation(e.body_text()))?;
    let reward = request.validate()?;

    let new_reward = NewReward::new(
        reward.user_id,
        reward.symbol,
        reward.shares,
        state.clock.now(),
    );
    let event = state
        .ledger
        .record_reward(new_reward)
        .await
        .inspect_err(|e| {
            if e.is_conflict() {
                warn!("Duplicate reward: {e}");
            }
        })?;

    info!(
        reward_id = event.id,
        user_id = %event.user_id,
        symbol = %event.symbol,
        shares = %event.shares,
        "Reward added"
    );
    Ok(Json(event.into()))
}

/// `GET /stats/{user_id}`
pub async fn get_stats(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<StatsResponse>> {
    Ok(Json(state.engine.today_stats(&user_id).await?.into()))
}

/// `GET /portfolio/{user_id}`
pub async fn get_portfolio(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<PortfolioResponse>> {
    Ok(Json(state.engine.portfolio(&user_id).await?.into()))
}

/// `GET /historical-inr/{user_id}`
pub async fn get_historical_inr(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<HistoricalResponse>> {
    Ok(Json(state.engine.historical_inr(&user_id).await?.into()))
}

/// `GET /today-stocks/{user_id}`
pub async fn get_today_stocks(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<TodayStocksResponse>> {
    Ok(Json(state.engine.today_rewards(&user_id).await?.into()))
}

/// `POST /stock-adjustment`
pub async fn upsert_adjustment(
    State(state): State<AppState>,
    payload: Result<Json<AdjustmentRequest>, JsonRejection>,
) -> ApiResult<Json<AdjustmentResponse>> {
    let Json(request) = payload.map_err(|e| ApiError::Validation(e.body_text()))?;
    let adjustment = request.validate()?;
    let stock = adjustment.symbol.clone();
    let action = if adjustment.delisted { "delisted" } else { "updated" };
    let summary = format!(
        "multiplier {}, effective {}",
        adjustment.multiplier, adjustment.effective_date
    );

    state.adjustments.upsert(adjustment).await?;

    info!("{action} stock adjustment for {stock} ({summary})");
    Ok(Json(AdjustmentResponse {
        message: ADJUSTMENT_RECORDED,
        stock,
    }))
}

/// `GET /stock-adjustments`
pub async fn list_adjustments(
    State(state): State<AppState>,
) -> ApiResult<Json<AdjustmentsResponse>> {
    Ok(Json(state.adjustments.list_all().await?.into()))
}
