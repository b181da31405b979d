//! HTTP client for the weather provider.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use tracing::instrument;

use super::WeatherQuery;
use super::model::{ProviderResponse, WeatherData};
use crate::error::{AppError, Result};

/// Value of the provider's `format` query parameter selecting JSON output.
pub const RESPONSE_FORMAT: &str = "j1";

/// User agent sent to the provider.
pub const USER_AGENT: &str = concat!("weather-cluster/", env!("CARGO_PKG_VERSION"));

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Async client for the weather provider.
///
/// Cheap to clone; clones share one connection pool.
#[derive(Debug, Clone)]
pub struct WeatherClient {
    base_url: String,
    client: Client,
}

impl WeatherClient {
    /// Create a client for the provider at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .map_err(AppError::Network)?;

        Ok(Self { base_url, client })
    }

    /// Provider base URL, without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch and reshape the current weather for `query`.
    ///
    /// An upstream 404, or a payload without current conditions or a nearest
    /// area, yields [`AppError::LocationNotFound`].
    #[instrument(level = "debug", skip(self), fields(query = %query))]
    pub async fn fetch(&self, query: &WeatherQuery) -> Result<WeatherData> {
        let url = format!("{}/{}", self.base_url, query.path_segment());

        let response = self
            .client
            .get(&url)
            .query(&[("format", RESPONSE_FORMAT)])
            .send()
            .await
            .map_err(AppError::Network)?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(AppError::LocationNotFound(query.to_string()));
        }
        if !status.is_success() {
            return Err(AppError::Upstream {
                status: status.as_u16(),
                url,
            });
        }

        let payload: ProviderResponse = response.json().await.map_err(AppError::Network)?;
        if payload.is_unresolved() {
            return Err(AppError::LocationNotFound(query.to_string()));
        }

        let data = payload.into_weather_data(&self.base_url)?;
        tracing::debug!(
            location = %data.location.name,
            temp_c = data.current.temp_c,
            "Weather fetched"
        );
        Ok(data)
    }
}
