//! Domain layer: core business entities and repository traits.

pub mod entities;

pub use entities::*;
