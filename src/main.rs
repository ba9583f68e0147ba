//! Web chat server.
//!
//! Entry point: loads configuration and serves the chat page.

use std::sync::Arc;

use anyhow::Context;
use dotenvy::dotenv;
use mimalloc::MiMalloc;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use webchat::config::AppConfig;

/// Global allocator for improved performance (M-MIMALLOC-APPS).
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env (if present)
    let _ = dotenv();

    // Initialize tracing (M-LOG-STRUCTURED)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .init();

    let config = AppConfig::load().context("Configuration error")?;

    info!(
        name: "config.loaded",
        host = %config.server.host,
        port = config.server.port,
        user_id = %config.user.id,
        "Configuration loaded"
    );

    webchat::server::start_server(Arc::new(config)).await
}
