//! Gateway entry point.
//!
//! Reads a JSON configuration file (first CLI argument, default
//! `gateway.json` when present) and serves until interrupted.

use meridian_gateway::{Collaborators, GatewayConfig, GatewayService};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => {
            let raw = std::fs::read_to_string(&path)?;
            serde_json::from_str::<GatewayConfig>(&raw)?
        }
        None => GatewayConfig::default(),
    };

    let service = GatewayService::new(config, Collaborators::default())?;
    service.start().await?;
    Ok(())
}
