//! HTTP middleware for the API server.

use axum::{
    body::Body,
    extract::Request,
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use tracing::Instrument;
use uuid::Uuid;

/// Header name for request correlation IDs.
pub static X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Header naming the worker process that produced the response.
pub static X_WORKER_PID: HeaderName = HeaderName::from_static("x-worker-pid");

/// Tags every request with a correlation ID and the serving process.
///
/// An incoming `X-Request-ID` is reused, otherwise a UUIDv4 is generated.
/// The ID is attached to a tracing span covering the handler and echoed
/// back alongside `X-Worker-PID`.
pub async fn request_context_middleware(request: Request<Body>, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(&X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(String::from)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let pid = std::process::id();
    let span = tracing::info_span!(
        "request",
        request_id = %request_id,
        pid,
        method = %request.method(),
        path = %request.uri().path(),
    );

    let mut response = next.run(request).instrument(span).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(X_REQUEST_ID.clone(), value);
    }
    response
        .headers_mut()
        .insert(X_WORKER_PID.clone(), HeaderValue::from(pid));

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        Router,
        body::Body,
        http::{Request, StatusCode},
        middleware,
        routing::get,
    };
    use tower::ServiceExt;

    fn test_app() -> Router {
        Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(middleware::from_fn(request_context_middleware))
    }

    #[tokio::test]
    async fn test_generates_request_id() {
        let response = test_app()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let id = response
            .headers()
            .get("x-request-id")
            .unwrap()
            .to_str()
            .unwrap();
        assert!(Uuid::parse_str(id).is_ok());
    }

    #[tokio::test]
    async fn test_preserves_provided_request_id() {
        let response = test_app()
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header("x-request-id", "my-custom-request-id-123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(
            response.headers().get("x-request-id").unwrap(),
            "my-custom-request-id-123"
        );
    }

    #[tokio::test]
    async fn test_reports_worker_pid() {
        let response = test_app()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let pid = response.headers().get("x-worker-pid").unwrap();
        assert_eq!(pid.to_str().unwrap(), std::process::id().to_string());
    }
}
