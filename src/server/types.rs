//! API request and response types.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Query parameters for `/api/weather/location`.
///
/// Fields are optional so a missing value is reported with the API's own
/// error body rather than a generic extractor rejection.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LocationParams {
    /// Place name, e.g. `Paris` or `New York`.
    pub location: Option<String>,
}

/// Query parameters for `/api/weather/coordinates`.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CoordinatesParams {
    /// Latitude in decimal degrees.
    pub lat: Option<String>,
    /// Longitude in decimal degrees.
    pub lon: Option<String>,
}

/// Health check response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
    pub version: String,
    /// Runtime environment label.
    pub environment: String,
    /// OS process id of the worker that served the request.
    pub pid: u32,
    /// Slot id assigned by the primary (absent in single-process mode).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker_id: Option<usize>,
}
