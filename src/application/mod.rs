//! Application layer: services and data transfer objects.

pub mod dto;
pub mod services;
