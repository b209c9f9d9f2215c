//! # ChatMe Server
//!
//! Real-time chat core entry point. Initializes:
//! - Tracing/logging subsystem
//! - Configuration loading
//! - Database connection pool and migrations
//! - Redis presence store
//! - HTTP/WebSocket server

use anyhow::Result;
use tracing::info;

use chatme_server::config::Settings;
use chatme_server::startup::Application;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber for structured logging
    chatme_server::telemetry::init_tracing();

    info!("Starting ChatMe Server...");

    // Load configuration from environment and config files
    let settings = Settings::load()?;
    info!(
        host = %settings.server.host,
        port = %settings.server.port,
        environment = %settings.environment,
        "Configuration loaded"
    );

    // Build and run the application
    let application = Application::build(settings).await?;

    info!("Server ready to accept connections");
    application.run_until_stopped().await?;

    Ok(())
}
