//! Application Startup
//!
//! Application building and server initialization.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use redis::aio::ConnectionManager;
use sqlx::PgPool;
use tokio::net::TcpListener;

use crate::application::services::{GroupService, MessageService, NotificationRouter};
use crate::config::Settings;
use crate::infrastructure::cache::{self, RedisPresenceRegistry};
use crate::infrastructure::database;
use crate::infrastructure::repositories::{PgGroupRepository, PgMessageRepository};
use crate::presentation::http::routes;
use crate::presentation::middleware::{cors, logging};
use crate::presentation::websocket::{ConnectionRegistry, EventDispatcher};
use crate::shared::snowflake::SnowflakeGenerator;

/// The dispatcher wired to its production backends.
pub type Dispatcher =
    EventDispatcher<PgGroupRepository, PgMessageRepository, RedisPresenceRegistry, ConnectionRegistry>;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub redis: ConnectionManager,
    pub connections: Arc<ConnectionRegistry>,
    pub presence: Arc<RedisPresenceRegistry>,
    pub dispatcher: Arc<Dispatcher>,
    pub settings: Arc<Settings>,
}

/// Application instance
pub struct Application {
    listener: TcpListener,
    router: Router,
}

impl Application {
    /// Build the application from settings
    pub async fn build(settings: Settings) -> Result<Self> {
        // Create database pool
        let db = database::create_pool(&settings.database).await?;
        tracing::info!("Database connection pool created");

        // Run pending migrations
        database::run_migrations(&db).await?;
        tracing::info!("Database migrations applied");

        // Create Redis client
        let redis = cache::create_redis_client(&settings.redis).await?;
        tracing::info!("Redis connection established");

        // Create snowflake generator
        let snowflake = Arc::new(SnowflakeGenerator::new(
            settings.snowflake.machine_id as u64,
            0u64,
        ));

        // Repositories and registries
        let group_repo = Arc::new(PgGroupRepository::new(db.clone()));
        let message_repo = Arc::new(PgMessageRepository::new(db.clone()));
        let presence = Arc::new(RedisPresenceRegistry::new(
            redis.clone(),
            settings.presence.ttl_secs,
        ));
        let connections = Arc::new(ConnectionRegistry::new());

        // Services and the dispatcher over them
        let dispatcher = Arc::new(EventDispatcher::new(
            GroupService::new(group_repo.clone(), snowflake.clone()),
            MessageService::new(
                message_repo,
                group_repo.clone(),
                snowflake,
                settings.chat.clone(),
            ),
            NotificationRouter::new(presence.clone(), connections.clone(), group_repo),
            presence.clone(),
            settings.chat.clone(),
        ));

        // Create app state
        let state = AppState {
            db,
            redis,
            connections,
            presence,
            dispatcher,
            settings: Arc::new(settings.clone()),
        };

        // Build router with middleware
        let router = routes::create_router(state)
            .layer(logging::create_trace_layer())
            .layer(cors::create_cors_layer(&settings.cors));

        // Bind to the configured host and port
        let listener = TcpListener::bind(settings.server_addr()).await?;
        tracing::info!("Listening on {}", listener.local_addr()?);

        Ok(Self { listener, router })
    }

    /// Run the server until stopped
    pub async fn run_until_stopped(self) -> Result<()> {
        // ConnectInfo is required for the anonymous identity fallback
        axum::serve(
            self.listener,
            self.router
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await?;
        Ok(())
    }

    /// Get the bound address
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}
