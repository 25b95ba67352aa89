//! Shared application state.

use crate::config::GatewayConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::pipeline::executor::Converter;
use crate::pipeline::runner::Pipeline;
use std::path::PathBuf;
use std::sync::Arc;
use subtle::ConstantTimeEq;

/// Per-process state shared across requests: the immutable configuration and
/// the fully wired pipeline. Constructed once at startup; construction fails
/// when the temp directory cannot be provisioned or the conversion binary is
/// missing.
#[derive(Debug, Clone)]
pub struct GatewayState {
    pub config: Arc<GatewayConfig>,
    pub pipeline: Pipeline,
}

impl GatewayState {
    pub fn new(config: GatewayConfig) -> GatewayResult<Self> {
        std::fs::create_dir_all(&config.temp_dir)
            .map_err(|_| GatewayError::Config("Failed to create temporary directory.".to_string()))?;

        let binary = resolve_converter(&config)?;
        tracing::info!(binary = %binary.display(), "conversion binary resolved");

        let converter = Converter::new(
            binary,
            config.temp_dir.clone(),
            config.conversion_timeout(),
        );
        let pipeline = Pipeline::new(
            converter,
            config.temp_dir.clone(),
            config.conversion_concurrency,
        );

        Ok(Self {
            config: Arc::new(config),
            pipeline,
        })
    }

    /// Constant-time API key comparison.
    pub fn verify_api_key(&self, candidate: &str) -> bool {
        candidate
            .as_bytes()
            .ct_eq(self.config.api_key.as_bytes())
            .into()
    }
}

/// Resolve the cwebp binary once: an explicit config path wins, otherwise
/// PATH is searched.
fn resolve_converter(config: &GatewayConfig) -> GatewayResult<PathBuf> {
    match &config.cwebp_path {
        Some(path) if path.is_file() => Ok(path.clone()),
        Some(path) => {
            tracing::error!(path = %path.display(), "configured cwebp path does not exist");
            Err(GatewayError::ConverterUnavailable)
        }
        None => which::which("cwebp").map_err(|_| GatewayError::ConverterUnavailable),
    }
}
