//! HTTP entry point run by every worker process.
//!
//! # Routes
//!
//! ```text
//! GET /api/weather/location?location=Paris
//! GET /api/weather/coordinates?lat=48.85&lon=2.35
//! GET /health
//! GET /docs            (Scalar UI)
//! GET /openapi.json
//! ```
//!
//! Workers bind their listener with `SO_REUSEPORT` so the whole pool can
//! share one port.

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod openapi;
pub mod types;

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    http::{HeaderName, HeaderValue, Method, header},
    routing::get,
};
use tokio::net::{TcpListener, TcpSocket};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

use crate::config::{AppConfig, DEFAULT_CORS_ORIGIN};
use crate::error::{AppError, Result};
use crate::shutdown::shutdown_signal;
use crate::weather::WeatherClient;

const LISTEN_BACKLOG: u32 = 1024;

/// Shared application state.
pub struct AppState {
    pub weather: WeatherClient,
    /// Runtime environment label reported by `/health`.
    pub environment: String,
    /// Slot id assigned by the primary, if any.
    pub worker_id: Option<usize>,
}

impl AppState {
    pub fn new(weather: WeatherClient, environment: impl Into<String>) -> Self {
        Self {
            weather,
            environment: environment.into(),
            worker_id: None,
        }
    }

    pub fn with_worker_id(mut self, worker_id: Option<usize>) -> Self {
        self.worker_id = worker_id;
        self
    }
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Single origin allowed by CORS, or `*`.
    pub cors_origin: String,
    pub environment: String,
    pub weather_api_url: String,
    /// Set `SO_REUSEPORT` so sibling workers can bind the same port.
    pub reuse_port: bool,
    pub worker_id: Option<usize>,
}

impl ServerConfig {
    pub fn from_app_config(config: &AppConfig, reuse_port: bool, worker_id: Option<usize>) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            cors_origin: config.cors_origin.clone(),
            environment: config.environment.clone(),
            weather_api_url: config.weather_api_url.clone(),
            reuse_port,
            worker_id,
        }
    }
}

/// CORS policy admitting a single origin (or any, for `*`).
pub fn cors_layer(origin: &str) -> CorsLayer {
    let allow_origin = if origin == "*" {
        AllowOrigin::any()
    } else {
        match HeaderValue::from_str(origin) {
            Ok(value) => AllowOrigin::exact(value),
            Err(_) => {
                tracing::warn!(
                    origin,
                    fallback = DEFAULT_CORS_ORIGIN,
                    "Invalid CORS origin, using default"
                );
                AllowOrigin::exact(HeaderValue::from_static(DEFAULT_CORS_ORIGIN))
            }
        }
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::ORIGIN,
            HeaderName::from_static("x-requested-with"),
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::AUTHORIZATION,
        ])
        .max_age(Duration::from_secs(3600))
}

/// Build the application router.
pub fn build_router(state: Arc<AppState>, cors: CorsLayer) -> Router {
    let weather_routes = Router::new()
        .route("/location", get(handlers::weather_by_location))
        .route("/coordinates", get(handlers::weather_by_coordinates));

    Router::new()
        .nest("/api/weather", weather_routes)
        .route("/health", get(handlers::health_check))
        .merge(Scalar::with_url("/docs", openapi::ApiDoc::openapi()))
        .route(
            "/openapi.json",
            get(|| async { Json(openapi::ApiDoc::openapi()) }),
        )
        .fallback(handlers::not_found)
        .layer(axum::middleware::from_fn(
            middleware::request_context_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Bind a listening socket, optionally shared with sibling processes.
pub fn bind_listener(addr: SocketAddr, reuse_port: bool) -> io::Result<TcpListener> {
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    socket.set_reuseaddr(true)?;
    if reuse_port {
        socket.set_reuseport(true)?;
    }
    socket.bind(addr)?;
    socket.listen(LISTEN_BACKLOG)
}

async fn resolve(host: &str, port: u16) -> Result<SocketAddr> {
    tokio::net::lookup_host((host, port))
        .await?
        .next()
        .ok_or_else(|| {
            AppError::Io(io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                format!("could not resolve {}:{}", host, port),
            ))
        })
}

/// Serve `router` on `listener` until `shutdown` resolves, then drain
/// in-flight connections.
pub async fn serve<F>(listener: TcpListener, router: Router, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

/// Run the HTTP server until SIGTERM or SIGINT.
pub async fn run_server(config: ServerConfig) -> Result<()> {
    let pid = std::process::id();
    let weather = WeatherClient::new(&config.weather_api_url)?;
    let provider = weather.base_url().to_string();
    let state = Arc::new(
        AppState::new(weather, config.environment.clone()).with_worker_id(config.worker_id),
    );
    let app = build_router(state, cors_layer(&config.cors_origin));

    let addr = resolve(&config.host, config.port).await?;
    let listener = bind_listener(addr, config.reuse_port)?;

    tracing::info!(
        pid,
        worker_id = ?config.worker_id,
        addr = %listener.local_addr()?,
        environment = %config.environment,
        cors_origin = %config.cors_origin,
        %provider,
        "Server listening"
    );

    serve(listener, app, async move {
        let signal = shutdown_signal().await;
        tracing::info!(pid, signal, "Closing HTTP server");
    })
    .await?;

    tracing::info!(pid, "HTTP server closed");
    Ok(())
}
