//! Route Configuration
//!
//! The HTTP surface is deliberately small: the WebSocket gateway plus
//! health probes. Everything conversational happens over the gateway.

use axum::{routing::get, Router};

use super::handlers;
use crate::presentation::websocket::ws_handler;
use crate::startup::AppState;

/// Create the main router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // WebSocket gateway endpoint
        .route("/gateway", get(ws_handler))
        // Health check endpoints
        .route("/health", get(handlers::health_check))
        .route("/health/live", get(handlers::liveness))
        .route("/health/ready", get(handlers::readiness))
        .with_state(state)
}
