//! Application settings and configuration structures.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Root configuration structure containing all application settings.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Server configuration (host, port)
    pub server: ServerSettings,

    /// Database configuration (PostgreSQL)
    pub database: DatabaseSettings,

    /// Redis configuration (presence store)
    pub redis: RedisSettings,

    /// JWT settings for decoding connection tokens
    pub jwt: JwtSettings,

    /// Snowflake ID generator settings
    pub snowflake: SnowflakeSettings,

    /// Presence registry settings
    pub presence: PresenceSettings,

    /// Chat behaviour settings
    pub chat: ChatSettings,

    /// CORS configuration
    pub cors: CorsSettings,

    /// Current environment (development, staging, production)
    pub environment: String,
}

/// Server binding configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    /// Host address to bind to (e.g., "0.0.0.0")
    pub host: String,

    /// Port number to listen on
    pub port: u16,
}

/// PostgreSQL database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    /// Database connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections to maintain
    pub min_connections: u32,

    /// Connection acquire timeout in seconds
    pub acquire_timeout: u64,
}

/// Redis configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RedisSettings {
    /// Redis connection URL
    pub url: String,
}

/// JWT configuration.
///
/// Tokens are issued by the external identity service; this core only
/// decodes them to learn which user a connection belongs to.
#[derive(Debug, Clone, Deserialize)]
pub struct JwtSettings {
    /// Shared secret for verifying token signatures
    pub secret: String,
}

/// Snowflake ID generator configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SnowflakeSettings {
    /// Machine/worker ID (0-31)
    pub machine_id: u16,
}

/// Presence registry configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PresenceSettings {
    /// Liveness window in seconds; entries expire passively after this
    /// long without activity, covering ungraceful disconnects.
    pub ttl_secs: u64,
}

/// Chat behaviour configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatSettings {
    /// Page size used when a fetch request omits one
    pub default_page_size: i64,

    /// Hard upper bound on page size, clamping client requests
    pub max_page_size: i64,

    /// Maximum message text length in characters
    pub max_text_length: usize,
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CorsSettings {
    /// Allowed origins (comma-separated in env)
    pub allowed_origins: Vec<String>,
}

/// Minimum required length for JWT secret (256 bits = 32 bytes)
pub const MIN_JWT_SECRET_LENGTH: usize = 32;

impl Settings {
    /// Load settings from environment variables and configuration files.
    ///
    /// The loading order is:
    /// 1. config/default.toml (base configuration)
    /// 2. config/{RUN_ENV}.toml (environment-specific overrides)
    /// 3. Environment variables (highest priority)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if configuration cannot be loaded or parsed,
    /// or if the JWT secret is too short.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        // Determine the running environment
        let environment = std::env::var("RUN_ENV").unwrap_or_else(|_| "development".into());

        Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("database.acquire_timeout", 30)?
            .set_default("snowflake.machine_id", 1)?
            .set_default("presence.ttl_secs", 3600_i64)?
            .set_default("chat.default_page_size", 10_i64)?
            .set_default("chat.max_page_size", 100_i64)?
            .set_default("chat.max_text_length", 4000_i64)?
            .set_default("cors.allowed_origins", vec!["http://localhost:3000"])?
            // Load from config files
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Load from environment variables
            // APP__SERVER__PORT=3000 -> server.port = 3000
            .add_source(
                Environment::default()
                    .prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            // Map simple environment variables
            .set_override_option("server.host", std::env::var("SERVER_HOST").ok())?
            .set_override_option("server.port", std::env::var("SERVER_PORT").ok())?
            .set_override_option("database.url", std::env::var("DATABASE_URL").ok())?
            .set_override_option("redis.url", std::env::var("REDIS_URL").ok())?
            .set_override_option("jwt.secret", std::env::var("JWT_SECRET").ok())?
            .set_override_option(
                "snowflake.machine_id",
                std::env::var("SNOWFLAKE_MACHINE_ID").ok(),
            )?
            .build()?
            .try_deserialize()
            .and_then(|settings: Self| {
                if settings.jwt.secret.len() < MIN_JWT_SECRET_LENGTH {
                    return Err(ConfigError::Message(format!(
                        "JWT secret must be at least {} characters. Current length: {}",
                        MIN_JWT_SECRET_LENGTH,
                        settings.jwt.secret.len()
                    )));
                }
                Ok(settings)
            })
    }

    /// Get the full server address as a string.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_addr_joins_configured_host_and_port() {
        let server = ServerSettings {
            host: "127.0.0.1".into(),
            port: 8080,
        };
        let settings = Settings {
            server,
            database: DatabaseSettings {
                url: "postgres://localhost/chatme".into(),
                max_connections: 10,
                min_connections: 2,
                acquire_timeout: 30,
            },
            redis: RedisSettings {
                url: "redis://localhost".into(),
            },
            jwt: JwtSettings {
                secret: "x".repeat(MIN_JWT_SECRET_LENGTH),
            },
            snowflake: SnowflakeSettings { machine_id: 1 },
            presence: PresenceSettings { ttl_secs: 3600 },
            chat: ChatSettings {
                default_page_size: 10,
                max_page_size: 100,
                max_text_length: 4000,
            },
            cors: CorsSettings {
                allowed_origins: vec![],
            },
            environment: "development".into(),
        };

        assert_eq!(settings.server_addr(), "127.0.0.1:8080");
    }
}
