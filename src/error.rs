//! Error types for weather-cluster.

use thiserror::Error;

/// Main error type for weather-cluster.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Location not found: {0}")]
    LocationNotFound(String),

    #[error("Weather API error: HTTP {status} at {url}")]
    Upstream { status: u16, url: String },

    #[error("Unexpected weather API payload: {0}")]
    UpstreamPayload(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Worker error: {0}")]
    Worker(String),

    #[error("Supervisor already started")]
    AlreadyStarted,
}

/// Result type alias for weather-cluster operations.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_location_not_found_message() {
        let err = AppError::LocationNotFound("Atlantis".to_string());
        let msg = err.to_string();
        assert!(msg.contains("Atlantis"));
        assert!(msg.contains("not found"));
    }

    #[test]
    fn test_upstream_error_message() {
        let err = AppError::Upstream {
            status: 503,
            url: "https://wttr.in/Paris".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("503"));
        assert!(msg.contains("https://wttr.in/Paris"));
    }

    #[test]
    fn test_worker_error_message() {
        let err = AppError::Worker("Failed to spawn worker: EAGAIN".to_string());
        assert!(err.to_string().contains("EAGAIN"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::AddrInUse, "address in use");
        let err: AppError = io_err.into();
        assert!(err.to_string().contains("address in use"));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{ nope").unwrap_err();
        let err: AppError = json_err.into();
        assert!(err.to_string().contains("JSON"));
    }

    #[test]
    fn test_result_type_alias() {
        fn returns_ok() -> Result<u16> {
            Ok(5000)
        }

        fn returns_err() -> Result<u16> {
            Err(AppError::AlreadyStarted)
        }

        assert_eq!(returns_ok().unwrap(), 5000);
        assert!(returns_err().is_err());
    }
}
