//! OpenAPI document for the weather API.

use utoipa::OpenApi;

use super::error::ApiErrorBody;
use super::handlers;
use super::types::HealthResponse;
use crate::weather::{CurrentWeather, WeatherCondition, WeatherData, WeatherLocation};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Weather API",
        description = "Current weather conditions by place name or coordinates, proxied from a wttr.in-compatible provider.",
        version = "1.0.0",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "/", description = "Local server")
    ),
    paths(
        handlers::weather_by_location,
        handlers::weather_by_coordinates,
        handlers::health_check,
    ),
    components(schemas(
        WeatherData,
        WeatherLocation,
        CurrentWeather,
        WeatherCondition,
        HealthResponse,
        ApiErrorBody,
    )),
    tags(
        (name = "weather", description = "Current weather lookups"),
        (name = "health", description = "Health checks")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_documents_every_route() {
        let doc = ApiDoc::openapi();
        let paths: Vec<_> = doc.paths.paths.keys().cloned().collect();
        assert!(paths.contains(&"/api/weather/location".to_string()));
        assert!(paths.contains(&"/api/weather/coordinates".to_string()));
        assert!(paths.contains(&"/health".to_string()));
    }
}
