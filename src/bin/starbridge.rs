//! Proxy entry point: load configuration, install tracing, run the server
//! until CTRL+C.
//!
//! Configuration comes from the file named by `STARBRIDGE_CONFIG` (or the
//! first command-line argument) when present, otherwise from the
//! `STARBRIDGE_*` environment variables over built-in defaults.

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use starbridge::config::ProxyConfig;
use starbridge::error::Result;
use starbridge::service::{AllowAll, ProxyServer};

fn load_config() -> Result<ProxyConfig> {
    let path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("STARBRIDGE_CONFIG").ok());
    match path {
        Some(path) => {
            info!(%path, "loading configuration file");
            ProxyConfig::from_file(path)
        }
        None => ProxyConfig::from_env(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = load_config()?;
    config.validate_strict()?;

    info!(
        bind = %config.server.bind_address,
        upstream = %config.upstream.address,
        "starting starbridge proxy"
    );

    let server = ProxyServer::new(config, Arc::new(AllowAll));
    server.run().await
}
