use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::recommend::ComputeError;

/// Request-level error taxonomy. Per-record catalog misses are not errors:
/// they are logged and skipped during aggregation.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("User not found")]
    UserNotFound,

    #[error("No daily record found for that date")]
    DayNotFound,

    #[error("No meals found")]
    NoMealsFound,

    #[error("Invalid date format. Please use YYYY-MM-DD.")]
    InvalidDate,

    #[error("Failed to compute recommendation: {0}")]
    RecommendationUnavailable(#[from] ComputeError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::UserNotFound | ApiError::DayNotFound | ApiError::NoMealsFound => {
                (StatusCode::NOT_FOUND, self.to_string())
            }
            ApiError::InvalidDate => (StatusCode::BAD_REQUEST, self.to_string()),
            ApiError::RecommendationUnavailable(e) => {
                tracing::error!(error = %e, "recommendation computation failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to compute recommendation".to_string(),
                )
            }
            ApiError::Internal(e) => {
                tracing::error!(error = %e, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "status": "error",
            "message": message,
        }));

        (status, body).into_response()
    }
}
