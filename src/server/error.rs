//! API error handling.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::AppError;
use crate::weather::WeatherQuery;

const UNEXPECTED_FAILURE: &str = "An unexpected error occurred while fetching weather data";

/// API error response body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiErrorBody {
    /// HTTP reason phrase, e.g. `"Bad Request"`.
    pub error: String,
    /// Human-readable detail.
    pub message: String,
}

/// API error type that converts to HTTP responses.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// Map a weather lookup failure, phrasing "not found" for the query kind.
    ///
    /// Every lookup failure is a 500; only the message distinguishes an
    /// unknown place from a provider outage.
    pub fn from_weather(err: AppError, query: &WeatherQuery) -> Self {
        match err {
            AppError::LocationNotFound(_) => Self::internal(query.not_found_message()),
            other => {
                tracing::warn!(query = %query, error = %other, "Weather lookup failed");
                other.into()
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            error: self
                .status
                .canonical_reason()
                .unwrap_or("Error")
                .to_string(),
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::Network(_) | AppError::Upstream { .. } | AppError::UpstreamPayload(_) => {
                ApiError::internal(format!("Failed to fetch weather data: {}", err))
            }
            AppError::LocationNotFound(query) => {
                ApiError::internal(format!("Location '{}' not found", query))
            }
            _ => ApiError::internal(UNEXPECTED_FAILURE),
        }
    }
}
