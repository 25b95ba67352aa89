//! Server initialization and routing.
//!
//! Builds the axum router around the single configured conversion route and
//! runs it with graceful shutdown. Middleware, outermost first: tracing,
//! request logging, whole-request timeout, body size limit, HTTPS check,
//! API key authentication.

use crate::config::GatewayConfig;
use crate::middleware::{api_key_auth, log_requests, require_https};
use crate::routes::{convert, invalid_endpoint};
use crate::state::GatewayState;
use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::post;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Build the axum router with the configured conversion route and middleware.
///
/// Auth and transport checks wrap the fallback too: an unauthenticated
/// request to an unknown path is rejected for its key before its path.
pub fn build_router(state: Arc<GatewayState>) -> Router {
    let route = format!("/{}", state.config.route_name.trim_start_matches('/'));

    Router::new()
        .route(&route, post(convert::convert_batch))
        .fallback(invalid_endpoint)
        .method_not_allowed_fallback(invalid_endpoint)
        .layer(from_fn_with_state(state.clone(), api_key_auth))
        .layer(from_fn_with_state(state.clone(), require_https))
        .layer(DefaultBodyLimit::max(state.config.max_body_size()))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            state.config.timeout(),
        ))
        .layer(from_fn(log_requests))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the gateway.
///
/// Initializes logging, provisions the temp directory, resolves the cwebp
/// binary, binds the listener, and serves until SIGTERM or Ctrl+C.
pub async fn start_server(config: GatewayConfig) -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(config.log_level.as_str())
        .with_target(false)
        .json()
        .init();

    let state = Arc::new(GatewayState::new(config)?);
    let app = build_router(state.clone());

    let addr: SocketAddr = state.config.socket_addr()?;

    tracing::info!(
        route = %state.config.route_name,
        temp_dir = %state.config.temp_dir.display(),
        "starting webpgate on {addr}"
    );
    tracing::info!(
        "timeout: {}s, max body: {}MB, max file: {}MB, conversion concurrency: {}",
        state.config.timeout_secs,
        state.config.max_body_size_mb,
        state.config.max_file_size_mb,
        state.config.conversion_concurrency,
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server shutdown complete");
    Ok(())
}

/// Shutdown signal handler
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down..."),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down..."),
    }
}
