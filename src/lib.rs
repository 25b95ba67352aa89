//! webpgate — HTTP gateway for batch image-to-WebP conversion.
//!
//! A single-endpoint service: clients POST a multipart batch of images, the
//! gateway drives each file through the external `cwebp` tool, and the
//! response is a JSON report correlating every input file with its outcome.
//! Per-file metadata supplied by the client ("descriptors") is carried into
//! the matching result records, and conversion parameters are accepted only
//! through a validated whitelist so untrusted input never shapes the
//! subprocess command line.
//!
//! # Request lifecycle
//!
//! 1. Transport checks: HTTPS, API key, route name.
//! 2. Query parameters → [`pipeline::options::ConversionOptions`] (parsed
//!    once per batch, invalid values dropped).
//! 3. `descriptors` field → [`pipeline::descriptor::DescriptorIndex`]
//!    (malformed JSON is request-fatal).
//! 4. Each `images` part → [`pipeline::intake`] → [`pipeline::executor`].
//! 5. [`pipeline::report`] assembles the ordered result records.
//!
//! Every uploaded file produces exactly one result record, failures
//! included, and no temporary file survives the request.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use webpgate::GatewayConfig;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = GatewayConfig::load()?;
//!     webpgate::start_server(config).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod middleware;
pub mod pipeline;
pub mod routes;
pub mod server;
pub mod state;

pub use config::GatewayConfig;
pub use error::{GatewayError, GatewayResult};
pub use server::{build_router, start_server};
pub use state::GatewayState;

/// Service version reported in every response envelope.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
