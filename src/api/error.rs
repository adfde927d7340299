//! HTTP error mapping.

use crate::core::StoreError;
use crate::valuation::ValuationError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::{error, warn};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Missing or malformed field (400).
    #[error("Invalid input: {0}")]
    Validation(String),

    /// The reward was already recorded (409).
    #[error("Duplicate reward event — this reward already exists")]
    Conflict,

    /// Any other storage failure (500). Details are logged, not returned.
    #[error("Database error")]
    Storage(#[source] StoreError),

    /// A valuation does not fit in a decimal (500).
    #[error("Value out of range")]
    OutOfRange(#[source] ValuationError),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict { .. } => ApiError::Conflict,
            other => ApiError::Storage(other),
        }
    }
}

impl From<ValuationError> for ApiError {
    fn from(err: ValuationError) -> Self {
        match err {
            ValuationError::Store(e) => e.into(),
            out_of_range => ApiError::OutOfRange(out_of_range),
        }
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict => StatusCode::CONFLICT,
            ApiError::Storage(_) | ApiError::OutOfRange(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = match &self {
            ApiError::Validation(reason) => {
                warn!("Invalid request payload: {reason}");
                "Invalid input".to_string()
            }
            ApiError::Conflict => self.to_string(),
            ApiError::Storage(e) => {
                error!("DB error: {e}");
                self.to_string()
            }
            ApiError::OutOfRange(e) => {
                error!("Valuation failed: {e}");
                self.to_string()
            }
        };

        (self.status(), Json(json!({ "error": message }))).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
