//! Configuration management.

mod settings;

pub use settings::{
    ChatSettings, CorsSettings, DatabaseSettings, JwtSettings, PresenceSettings, RedisSettings,
    ServerSettings, Settings, SnowflakeSettings,
};
