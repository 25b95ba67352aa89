//! webpgate - batch image-to-WebP conversion gateway.

use webpgate::GatewayConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = GatewayConfig::load()?;

    // Start server
    webpgate::start_server(config).await?;

    Ok(())
}
