//! HTTP surface: routes and health handlers.

pub mod handlers;
pub mod routes;
