//! Infrastructure layer: database, cache, and repository implementations.

pub mod cache;
pub mod database;
pub mod repositories;
