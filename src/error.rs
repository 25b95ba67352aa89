//! Gateway error surface and the fatal-response envelope.
//!
//! Request-fatal errors abort before any file is touched and serialize as
//! `{status: false, version, message}` with the mapped HTTP status. Per-file
//! failures never appear here; they live inside the batch report.

use crate::pipeline::descriptor::DescriptorParseError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Request-fatal gateway errors.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("HTTPS is required.")]
    HttpsRequired,

    #[error("Invalid API key provided.")]
    InvalidApiKey,

    #[error("Invalid endpoint.")]
    InvalidEndpoint,

    #[error("No images uploaded.")]
    NoImages,

    #[error(transparent)]
    Descriptors(#[from] DescriptorParseError),

    #[error("{0}")]
    BadRequest(String),

    #[error("cwebp binary not found. Install it using \"sudo apt install webp\" on Ubuntu/Debian.")]
    ConverterUnavailable,

    #[error("{0}")]
    Config(String),

    #[error("Internal server error.")]
    Internal(String),
}

impl GatewayError {
    fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::HttpsRequired
            | GatewayError::InvalidEndpoint
            | GatewayError::NoImages
            | GatewayError::Descriptors(_)
            | GatewayError::BadRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::InvalidApiKey => StatusCode::UNAUTHORIZED,
            GatewayError::ConverterUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::Config(_) | GatewayError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        if let GatewayError::Internal(detail) = &self {
            tracing::error!(detail = %detail, "internal gateway error");
        }
        let body = Json(json!({
            "status": false,
            "version": crate::VERSION,
            "message": self.to_string(),
        }));
        (self.status_code(), body).into_response()
    }
}
