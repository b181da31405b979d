//! Weather provider integration.
//!
//! Requests go to a wttr.in-compatible service
//! (`GET {base}/{location}?format=j1`) and its response is reshaped into a
//! [`WeatherData`] document.

mod client;
mod model;

pub use client::{RESPONSE_FORMAT, USER_AGENT, WeatherClient};
pub use model::{CurrentWeather, WeatherCondition, WeatherData, WeatherLocation};

/// What to fetch the weather for.
#[derive(Debug, Clone, PartialEq)]
pub enum WeatherQuery {
    /// Free-form place name, e.g. `"Paris"` or `"New York"`.
    Location(String),
    /// Latitude/longitude in decimal degrees.
    Coordinates { lat: f64, lon: f64 },
}

impl WeatherQuery {
    /// Path segment identifying this query to the provider.
    pub fn path_segment(&self) -> String {
        match self {
            Self::Location(location) => urlencoding::encode(location).into_owned(),
            Self::Coordinates { lat, lon } => format!("{},{}", lat, lon),
        }
    }

    /// Message returned to clients when the provider cannot resolve the query.
    pub fn not_found_message(&self) -> &'static str {
        match self {
            Self::Location(_) => "Location not found. Please try a different location.",
            Self::Coordinates { .. } => "Location not found. Please try different coordinates.",
        }
    }
}

impl std::fmt::Display for WeatherQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Location(location) => write!(f, "{}", location),
            Self::Coordinates { lat, lon } => write!(f, "{},{}", lat, lon),
        }
    }
}
