//! Weather provider payload and the reshaped document served to clients.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{AppError, Result};

/// Weather document returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct WeatherData {
    pub location: WeatherLocation,
    pub current: CurrentWeather,
}

/// Resolved location of a weather report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct WeatherLocation {
    pub name: String,
    pub region: String,
    pub country: String,
    pub lat: f64,
    pub lon: f64,
    /// Local observation time as reported upstream, or the current UTC time.
    pub localtime: String,
}

/// Current conditions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CurrentWeather {
    pub temp_c: f64,
    pub temp_f: f64,
    pub condition: WeatherCondition,
    pub humidity: f64,
    pub wind_kph: f64,
    pub wind_dir: String,
    pub pressure_mb: f64,
    pub feelslike_c: f64,
    pub feelslike_f: f64,
    pub uv: f64,
    pub vis_km: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct WeatherCondition {
    pub text: String,
    /// URL of the condition icon.
    pub icon: String,
}

/// Raw `?format=j1` response from the provider.
///
/// Every numeric field arrives as a string.
#[derive(Debug, Deserialize)]
pub struct ProviderResponse {
    #[serde(default)]
    current_condition: Vec<ProviderCurrent>,
    #[serde(default)]
    nearest_area: Vec<ProviderArea>,
}

#[derive(Debug, Deserialize)]
struct ProviderCurrent {
    #[serde(rename = "temp_C")]
    temp_c: String,
    #[serde(rename = "temp_F")]
    temp_f: String,
    #[serde(rename = "FeelsLikeC")]
    feels_like_c: String,
    #[serde(rename = "FeelsLikeF")]
    feels_like_f: String,
    humidity: String,
    pressure: String,
    #[serde(rename = "windspeedKmph")]
    wind_kph: String,
    #[serde(rename = "winddir16Point", default)]
    wind_dir: String,
    #[serde(rename = "uvIndex")]
    uv_index: Option<String>,
    visibility: Option<String>,
    #[serde(rename = "weatherCode", default)]
    weather_code: String,
    #[serde(rename = "weatherDesc", default)]
    weather_desc: Vec<ProviderValue>,
    #[serde(rename = "localObsDateTime")]
    local_obs_date_time: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProviderArea {
    #[serde(rename = "areaName", default)]
    area_name: Vec<ProviderValue>,
    #[serde(default)]
    region: Vec<ProviderValue>,
    #[serde(default)]
    country: Vec<ProviderValue>,
    latitude: String,
    longitude: String,
}

#[derive(Debug, Deserialize)]
struct ProviderValue {
    value: String,
}

fn first_value(values: &[ProviderValue]) -> String {
    values.first().map(|v| v.value.clone()).unwrap_or_default()
}

fn number(field: &str, raw: &str) -> Result<f64> {
    raw.trim()
        .parse()
        .map_err(|_| AppError::UpstreamPayload(format!("{} is not a number: {:?}", field, raw)))
}

fn number_or_zero(field: &str, raw: Option<&str>) -> Result<f64> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => number(field, raw),
        None => Ok(0.0),
    }
}

impl ProviderResponse {
    /// True when the provider could not resolve the requested place.
    pub fn is_unresolved(&self) -> bool {
        self.current_condition.is_empty() || self.nearest_area.is_empty()
    }

    /// Reshape into a [`WeatherData`], building icon URLs under `icon_base`.
    pub fn into_weather_data(self, icon_base: &str) -> Result<WeatherData> {
        let current = self
            .current_condition
            .into_iter()
            .next()
            .ok_or_else(|| AppError::UpstreamPayload("missing current_condition".into()))?;
        let area = self
            .nearest_area
            .into_iter()
            .next()
            .ok_or_else(|| AppError::UpstreamPayload("missing nearest_area".into()))?;

        let localtime = current
            .local_obs_date_time
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true));

        Ok(WeatherData {
            location: WeatherLocation {
                name: first_value(&area.area_name),
                region: first_value(&area.region),
                country: first_value(&area.country),
                lat: number("latitude", &area.latitude)?,
                lon: number("longitude", &area.longitude)?,
                localtime,
            },
            current: CurrentWeather {
                temp_c: number("temp_C", &current.temp_c)?,
                temp_f: number("temp_F", &current.temp_f)?,
                condition: WeatherCondition {
                    text: first_value(&current.weather_desc),
                    icon: format!(
                        "{}/{}.png",
                        icon_base.trim_end_matches('/'),
                        current.weather_code
                    ),
                },
                humidity: number("humidity", &current.humidity)?,
                wind_kph: number("windspeedKmph", &current.wind_kph)?,
                wind_dir: current.wind_dir,
                pressure_mb: number("pressure", &current.pressure)?,
                feelslike_c: number("FeelsLikeC", &current.feels_like_c)?,
                feelslike_f: number("FeelsLikeF", &current.feels_like_f)?,
                uv: number_or_zero("uvIndex", current.uv_index.as_deref())?,
                vis_km: number_or_zero("visibility", current.visibility.as_deref())?,
            },
        })
    }
}
