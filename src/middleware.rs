//! Request middleware: transport checks, authentication, logging.

use crate::error::GatewayError;
use crate::state::GatewayState;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use std::sync::Arc;

/// Reject plain-HTTP requests.
///
/// Behind a TLS terminator the original scheme arrives in
/// `x-forwarded-proto`; a directly served TLS connection carries the scheme
/// on the request URI. The check can be disabled via configuration for
/// deployments where termination is trusted implicitly.
pub async fn require_https(
    State(state): State<Arc<GatewayState>>,
    request: Request,
    next: Next,
) -> Result<Response, GatewayError> {
    if state.config.require_https && !is_https(&request) {
        return Err(GatewayError::HttpsRequired);
    }
    Ok(next.run(request).await)
}

fn is_https(request: &Request) -> bool {
    if request.uri().scheme_str() == Some("https") {
        return true;
    }
    request
        .headers()
        .get("x-forwarded-proto")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .is_some_and(|proto| proto.trim().eq_ignore_ascii_case("https"))
}

/// API key authentication middleware. The header name is configured; the
/// comparison is constant-time.
pub async fn api_key_auth(
    State(state): State<Arc<GatewayState>>,
    request: Request,
    next: Next,
) -> Result<Response, GatewayError> {
    let presented = request
        .headers()
        .get(state.config.api_key_header.as_str())
        .and_then(|value| value.to_str().ok());

    match presented {
        Some(key) if state.verify_api_key(key) => Ok(next.run(request).await),
        _ => Err(GatewayError::InvalidApiKey),
    }
}

/// Request logging middleware.
pub async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = std::time::Instant::now();

    let response = next.run(request).await;
    let duration = start.elapsed();
    let status = response.status();

    tracing::info!(
        method = %method,
        uri = %uri,
        status = %status,
        duration_ms = %duration.as_millis(),
        "request completed"
    );

    response
}
