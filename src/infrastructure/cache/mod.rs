//! Cache Module
//!
//! Redis connection management and the presence registry.

mod presence;

pub use presence::{Identity, PresenceRegistry, RedisPresenceRegistry};

#[cfg(test)]
pub use presence::MockPresenceRegistry;

use redis::aio::ConnectionManager;
use redis::Client;
use tracing::{info, instrument};

use crate::config::RedisSettings;

/// Creates a Redis connection manager with automatic reconnection.
///
/// The connection manager handles connection pooling and automatic
/// reconnection when the connection is lost.
#[instrument(skip(settings), fields(url = %settings.url))]
pub async fn create_redis_client(
    settings: &RedisSettings,
) -> Result<ConnectionManager, redis::RedisError> {
    info!("Connecting to Redis...");
    let client = Client::open(settings.url.as_str())?;
    let manager = ConnectionManager::new(client).await?;
    info!("Redis connection established");
    Ok(manager)
}

/// Cache key prefixes.
///
/// Use these constants to ensure consistent key naming across the
/// application (and across server processes sharing the store).
pub mod keys {
    /// Prefix for presence entries (e.g., "presence:user_id")
    pub const PRESENCE: &str = "presence:";
}
