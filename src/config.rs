//! Gateway configuration.
//!
//! Loaded once at startup from an optional `gateway` config file, a `.env`
//! file, and `WEBPGATE__*` environment variables. Every field has a default
//! except the API key, which must be configured for the service to start.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Immutable gateway configuration, constructed once and passed explicitly
/// into the pipeline components.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GatewayConfig {
    /// Server bind address
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Shared API key clients must present
    #[serde(default)]
    pub api_key: String,

    /// Header the API key is read from
    #[serde(default = "default_api_key_header")]
    pub api_key_header: String,

    /// Name of the single conversion route (`POST /<route_name>`)
    #[serde(default = "default_route_name")]
    pub route_name: String,

    /// Directory for spooled uploads and conversion scratch files
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,

    /// Explicit cwebp binary path; when unset the binary is resolved from PATH
    #[serde(default)]
    pub cwebp_path: Option<PathBuf>,

    /// Reject plain-HTTP requests. Disable only behind trusted TLS termination.
    #[serde(default = "default_true")]
    pub require_https: bool,

    /// Whole-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Maximum request body size in MB
    #[serde(default = "default_max_body_size_mb")]
    pub max_body_size_mb: usize,

    /// Maximum size of a single uploaded file in MB
    #[serde(default = "default_max_file_size_mb")]
    pub max_file_size_mb: usize,

    /// Per-file conversion timeout in seconds
    #[serde(default = "default_conversion_timeout_secs")]
    pub conversion_timeout_secs: u64,

    /// How many conversions may run concurrently within one batch
    #[serde(default = "default_conversion_concurrency")]
    pub conversion_concurrency: usize,

    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            port: default_port(),
            api_key: String::new(),
            api_key_header: default_api_key_header(),
            route_name: default_route_name(),
            temp_dir: default_temp_dir(),
            cwebp_path: None,
            require_https: default_true(),
            timeout_secs: default_timeout_secs(),
            max_body_size_mb: default_max_body_size_mb(),
            max_file_size_mb: default_max_file_size_mb(),
            conversion_timeout_secs: default_conversion_timeout_secs(),
            conversion_concurrency: default_conversion_concurrency(),
            log_level: default_log_level(),
        }
    }
}

impl GatewayConfig {
    /// Load configuration from `.env`, an optional `gateway` config file, and
    /// `WEBPGATE__*` environment variables. An unparseable source or a
    /// missing API key is fatal.
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let builder = config::Config::builder()
            .add_source(config::File::with_name("gateway").required(false))
            .add_source(config::Environment::with_prefix("WEBPGATE").separator("__"));

        let config: GatewayConfig = builder.build()?.try_deserialize()?;

        if config.api_key.is_empty() {
            anyhow::bail!("api_key is not configured; set WEBPGATE__API_KEY or the gateway config file");
        }

        Ok(config)
    }

    /// Get the socket address to bind to
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        let addr_str = format!("{}:{}", self.bind_addr, self.port);
        Ok(addr_str.parse()?)
    }

    /// Get request timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Get per-file conversion timeout as Duration
    pub fn conversion_timeout(&self) -> Duration {
        Duration::from_secs(self.conversion_timeout_secs)
    }

    /// Get max body size in bytes
    pub fn max_body_size(&self) -> usize {
        self.max_body_size_mb * 1024 * 1024
    }

    /// Get max per-file size in bytes
    pub fn max_file_size(&self) -> usize {
        self.max_file_size_mb * 1024 * 1024
    }
}

fn default_bind_addr() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_api_key_header() -> String {
    "x-api-key".to_string()
}

fn default_route_name() -> String {
    "convert".to_string()
}

fn default_temp_dir() -> PathBuf {
    std::env::temp_dir().join("webpgate")
}

fn default_true() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_max_body_size_mb() -> usize {
    100
}

fn default_max_file_size_mb() -> usize {
    25
}

fn default_conversion_timeout_secs() -> u64 {
    60
}

fn default_conversion_concurrency() -> usize {
    4
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = GatewayConfig::default();
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.route_name, "convert");
        assert_eq!(cfg.api_key_header, "x-api-key");
        assert_eq!(cfg.max_body_size_mb, 100);
        assert_eq!(cfg.max_file_size_mb, 25);
        assert_eq!(cfg.conversion_timeout_secs, 60);
        assert_eq!(cfg.conversion_concurrency, 4);
        assert!(cfg.require_https);
        assert!(cfg.api_key.is_empty());
    }

    #[test]
    fn test_socket_addr() {
        let cfg = GatewayConfig::default();
        let addr = cfg.socket_addr().unwrap();
        assert_eq!(addr.port(), 8080);
    }

    #[test]
    fn test_size_conversions() {
        let cfg = GatewayConfig::default();
        assert_eq!(cfg.max_body_size(), 100 * 1024 * 1024);
        assert_eq!(cfg.max_file_size(), 25 * 1024 * 1024);
        assert_eq!(cfg.timeout(), Duration::from_secs(300));
        assert_eq!(cfg.conversion_timeout(), Duration::from_secs(60));
    }
}
