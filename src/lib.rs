//! # ChatMe Server Library
//!
//! Real-time chat core providing:
//! - A WebSocket gateway speaking named events with enveloped responses
//! - Direct and multi-party conversations with a canonical direct-pair key
//! - Message persistence with per-side soft delete, edits, and seen state
//! - Redis-backed presence with passive TTL expiry
//! - PostgreSQL for persistent storage
//!
//! ## Architecture
//!
//! The crate follows Clean Architecture principles:
//!
//! - **Domain Layer**: Core business entities and repository traits
//! - **Application Layer**: Business logic services and DTOs
//! - **Infrastructure Layer**: Database and presence store implementations
//! - **Presentation Layer**: WebSocket gateway and health endpoints
//!
//! ## Module Structure
//!
//! ```text
//! chatme_server/
//! +-- config/        Configuration management
//! +-- domain/        Domain entities and repository traits
//! +-- application/   Application services and DTOs
//! +-- infrastructure/ Database and presence store implementations
//! +-- presentation/  WebSocket gateway and HTTP health handlers
//! +-- shared/        Common utilities (errors, snowflake IDs)
//! ```

// Configuration module
pub mod config;

// Domain layer - Core business logic
pub mod domain;

// Application layer - Business services
pub mod application;

// Infrastructure layer - External implementations
pub mod infrastructure;

// Presentation layer - HTTP and WebSocket handlers
pub mod presentation;

// Shared utilities
pub mod shared;

// Application startup and state management
pub mod startup;

// Telemetry and observability
pub mod telemetry;
