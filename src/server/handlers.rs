//! API request handlers.
//!
//! Each weather handler validates its query string, asks the shared
//! [`WeatherClient`](crate::weather::WeatherClient) for the current
//! conditions and returns them as JSON. Provider failures are mapped by
//! [`ApiError::from_weather`].

use axum::{
    Json,
    extract::{Query, State, rejection::QueryRejection},
    http::Uri,
};
use std::sync::Arc;
use tracing::instrument;

use crate::version;
use crate::weather::{WeatherData, WeatherQuery};

use super::AppState;
use super::error::{ApiError, ApiErrorBody};
use super::types::*;

/// Maximum accepted length of a location name.
const MAX_LOCATION_LENGTH: usize = 200;

const LOCATION_REQUIRED: &str = "Location parameter is required";
const LAT_LON_REQUIRED: &str = "Both lat and lon parameters are required";
const INVALID_COORDINATES: &str = "Lat and lon must be valid numbers";

/// Malformed query strings (a repeated key, say) still answer with the JSON
/// error body.
fn query_params<T>(query: Result<Query<T>, QueryRejection>) -> Result<T, ApiError> {
    query
        .map(|Query(params)| params)
        .map_err(|rejection| ApiError::bad_request(rejection.body_text()))
}

fn parse_coordinate(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Current weather for a named location.
#[utoipa::path(
    get,
    path = "/api/weather/location",
    params(LocationParams),
    responses(
        (status = 200, description = "Current weather", body = WeatherData),
        (status = 400, description = "Missing or invalid location", body = ApiErrorBody),
        (status = 500, description = "Location not found or weather provider failure", body = ApiErrorBody),
    ),
    tag = "weather"
)]
#[instrument(skip_all, fields(location = tracing::field::Empty))]
pub async fn weather_by_location(
    State(state): State<Arc<AppState>>,
    query: Result<Query<LocationParams>, QueryRejection>,
) -> Result<Json<WeatherData>, ApiError> {
    let location = query_params(query)?
        .location
        .filter(|l| !l.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request(LOCATION_REQUIRED))?;
    tracing::Span::current().record("location", location.as_str());

    if location.chars().count() > MAX_LOCATION_LENGTH {
        return Err(ApiError::bad_request(format!(
            "Location too long (max {} characters)",
            MAX_LOCATION_LENGTH
        )));
    }

    let query = WeatherQuery::Location(location);
    let data = state
        .weather
        .fetch(&query)
        .await
        .map_err(|e| ApiError::from_weather(e, &query))?;

    tracing::debug!(resolved = %data.location.name, "Location weather served");
    Ok(Json(data))
}

/// Current weather at a latitude/longitude pair.
#[utoipa::path(
    get,
    path = "/api/weather/coordinates",
    params(CoordinatesParams),
    responses(
        (status = 200, description = "Current weather", body = WeatherData),
        (status = 400, description = "Missing or non-numeric coordinates", body = ApiErrorBody),
        (status = 500, description = "Location not found or weather provider failure", body = ApiErrorBody),
    ),
    tag = "weather"
)]
#[instrument(skip_all, fields(lat = tracing::field::Empty, lon = tracing::field::Empty))]
pub async fn weather_by_coordinates(
    State(state): State<Arc<AppState>>,
    query: Result<Query<CoordinatesParams>, QueryRejection>,
) -> Result<Json<WeatherData>, ApiError> {
    let params = query_params(query)?;
    let (Some(lat), Some(lon)) = (
        params.lat.filter(|v| !v.is_empty()),
        params.lon.filter(|v| !v.is_empty()),
    ) else {
        return Err(ApiError::bad_request(LAT_LON_REQUIRED));
    };

    let (Some(lat), Some(lon)) = (parse_coordinate(&lat), parse_coordinate(&lon)) else {
        return Err(ApiError::bad_request(INVALID_COORDINATES));
    };
    let span = tracing::Span::current();
    span.record("lat", lat);
    span.record("lon", lon);

    let query = WeatherQuery::Coordinates { lat, lon };
    let data = state
        .weather
        .fetch(&query)
        .await
        .map_err(|e| ApiError::from_weather(e, &query))?;

    Ok(Json(data))
}

/// Liveness probe. Answers from whichever worker accepted the connection.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    ),
    tag = "health"
)]
#[instrument(skip(state))]
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        message: "Server is running".to_string(),
        version: version::full_version().to_string(),
        environment: state.environment.clone(),
        pid: std::process::id(),
        worker_id: state.worker_id,
    })
}

/// Fallback for unmatched routes.
pub async fn not_found(uri: Uri) -> ApiError {
    tracing::trace!(path = %uri.path(), "No route matched");
    ApiError::not_found(format!("Route {} not found", uri.path()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_coordinate() {
        assert_eq!(parse_coordinate("48.85"), Some(48.85));
        assert_eq!(parse_coordinate(" -2.35 "), Some(-2.35));
        assert_eq!(parse_coordinate("0"), Some(0.0));
        assert_eq!(parse_coordinate("north"), None);
        assert_eq!(parse_coordinate("NaN"), None);
        assert_eq!(parse_coordinate("inf"), None);
        assert_eq!(parse_coordinate(""), None);
    }

    #[test]
    fn test_query_params_rejection_is_bad_request() {
        let uri: Uri = "/api/weather/location?location=a&location=b".parse().unwrap();
        let err = query_params(Query::<LocationParams>::try_from_uri(&uri)).unwrap_err();
        assert_eq!(err.status, axum::http::StatusCode::BAD_REQUEST);
        assert!(err.message.contains("location"), "{}", err.message);
    }
}
