//! Runtime configuration resolved from the process environment.
//!
//! # Environment Variables
//!
//! - `PORT` - Listen port (default: 5000)
//! - `HOST` - Bind address (default: 0.0.0.0)
//! - `APP_ENV` - Runtime environment label (default: development)
//! - `CORS_ORIGIN` - Allowed cross-origin value (default: http://localhost:5173)
//! - `WORKERS` - Worker process count, 0 derives it from host parallelism (default: 0)
//! - `RESTART_DELAY_MS` - Delay before replacing an exited worker (default: 1000)
//! - `WEATHER_API_URL` - Base URL of the weather provider (default: https://wttr.in)
//!
//! A `.env` file in the working directory is loaded first (see
//! [`load_dotenv`]). Variables already present in the process environment
//! take precedence over it.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::cluster::WorkerPoolConfig;

pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_ENVIRONMENT: &str = "development";
pub const DEFAULT_CORS_ORIGIN: &str = "http://localhost:5173";
pub const DEFAULT_WEATHER_API_URL: &str = "https://wttr.in";
pub const DEFAULT_RESTART_DELAY: Duration = Duration::from_millis(1000);

/// Resolved application configuration.
///
/// Built once at process start and never re-read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Address to bind the HTTP listener to.
    pub host: String,
    /// Port shared by every worker.
    pub port: u16,
    /// Runtime environment label, informational only.
    pub environment: String,
    /// Value of `Access-Control-Allow-Origin`.
    pub cors_origin: String,
    /// Requested worker count (0 = one per available CPU).
    pub workers: usize,
    /// Wait between a worker exit and its replacement.
    pub restart_delay: Duration,
    /// Base URL of the weather provider.
    pub weather_api_url: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            environment: DEFAULT_ENVIRONMENT.to_string(),
            cors_origin: DEFAULT_CORS_ORIGIN.to_string(),
            workers: 0,
            restart_delay: DEFAULT_RESTART_DELAY,
            weather_api_url: DEFAULT_WEATHER_API_URL.to_string(),
        }
    }
}

impl AppConfig {
    /// Resolve configuration from the process environment.
    ///
    /// Call [`load_dotenv`] and install logging first, so `.env` values are
    /// visible and fallbacks are reported.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve configuration through an arbitrary variable lookup.
    ///
    /// Missing, empty, or unparsable values fall back to their defaults.
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let config = AppConfig::from_lookup(|key| match key {
    ///     "PORT" => Some("8080".to_string()),
    ///     _ => None,
    /// });
    /// assert_eq!(config.port, 8080);
    /// assert_eq!(config.environment, "development");
    /// ```
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let text = |key: &str, default: String| non_empty(lookup(key)).unwrap_or(default);

        Self {
            host: text("HOST", defaults.host),
            port: parse_or("PORT", lookup("PORT"), defaults.port),
            environment: text("APP_ENV", defaults.environment),
            cors_origin: text("CORS_ORIGIN", defaults.cors_origin),
            workers: parse_or("WORKERS", lookup("WORKERS"), defaults.workers),
            restart_delay: Duration::from_millis(parse_or(
                "RESTART_DELAY_MS",
                lookup("RESTART_DELAY_MS"),
                defaults.restart_delay.as_millis() as u64,
            )),
            weather_api_url: text("WEATHER_API_URL", defaults.weather_api_url),
        }
    }

    /// Supervisor settings derived from this configuration.
    pub fn pool_config(&self) -> WorkerPoolConfig {
        WorkerPoolConfig {
            desired_worker_count: self.workers,
            restart_delay: self.restart_delay,
        }
    }

    /// `host:port` string for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Load `.env` from the working directory or its ancestors into the process
/// environment, without overriding variables that are already set.
///
/// Returns the path of the file that was read, if any.
pub fn load_dotenv() -> Option<PathBuf> {
    dotenvy::dotenv().ok()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse `raw`, falling back to `default` when absent or malformed.
fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> T
where
    T: FromStr + Copy + std::fmt::Debug,
{
    let Some(raw) = non_empty(raw) else {
        return default;
    };
    match raw.parse() {
        Ok(value) => value,
        Err(_) => {
            tracing::debug!(
                key,
                value = %raw,
                default = ?default,
                "Ignoring malformed numeric setting"
            );
            default
        }
    }
}
