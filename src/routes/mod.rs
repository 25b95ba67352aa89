//! HTTP route handlers.
//!
//! The gateway exposes a single conversion route whose name comes from
//! configuration; everything else falls through to [`invalid_endpoint`].

pub mod convert;

use crate::error::GatewayError;

/// Fallback handler for any path or method other than the configured route.
pub async fn invalid_endpoint() -> GatewayError {
    GatewayError::InvalidEndpoint
}
