//! # AAS-AssetSync Server
//!
//! Runs the synchronization engine over a configured store and asset connections.
//!
//! ## Configuration
//!
//! A JSON file (`AASSYNC_CONFIG`, default `./config.json`) with the sections
//! `core`, `persistence` and `assetConnections`, selectively overridden by
//! `AASSYNC_*` environment variables. See [`ServiceConfig`].

use anyhow::Result;
use tracing_subscriber::EnvFilter;

mod config;
mod runtime;

pub use config::ServiceConfig;
pub use runtime::Server;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting AAS-AssetSync server"
    );

    let config = ServiceConfig::from_env()?;
    let server = Server::new(config)?;
    server.run().await?;

    Ok(())
}
