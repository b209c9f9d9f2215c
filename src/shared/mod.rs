//! Shared utilities: error taxonomy and ID generation.

pub mod error;
pub mod snowflake;

pub use error::ChatError;
pub use snowflake::SnowflakeGenerator;
