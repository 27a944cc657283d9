pub mod cache;
pub mod config;
pub mod controllers;
pub mod error;
pub mod middleware;
pub mod models;
pub mod redis_client;
pub mod services;
pub mod store;

use axum::{routing::get, Router};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

use cache::{CacheBackend, ListingCache};
use services::VenueCatalog;
use store::{PgStore, VenueStore};

const REDIS_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("database connection failed: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migrations failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

// Shared state for the whole application
#[derive(Clone)]
pub struct AppState {
    pub catalog: VenueCatalog,
    pub config: config::Config,
}

impl AppState {
    /// Connects and migrates PostgreSQL (required), then connects Redis (optional).
    pub async fn new(config: config::Config) -> Result<Arc<Self>, StartupError> {
        let store: Arc<dyn VenueStore> = Arc::new(PgStore::connect(&config.database).await?);

        let cache = match tokio::time::timeout(
            REDIS_CONNECT_TIMEOUT,
            redis_client::RedisClient::new(&config.redis.url),
        )
        .await
        {
            Ok(Ok(redis)) => {
                info!("Redis connected");
                ListingCache::new(Arc::new(redis), &config.cache)
            }
            Ok(Err(e)) => {
                warn!("Redis unavailable, listing cache disabled: {}", e);
                ListingCache::disabled(&config.cache)
            }
            Err(_) => {
                warn!("Redis connect timed out, listing cache disabled");
                ListingCache::disabled(&config.cache)
            }
        };

        Ok(Self::from_parts(config, store, cache))
    }

    /// Assembles state from already-built parts; tests use in-memory ones.
    pub fn from_parts(
        config: config::Config,
        store: Arc<dyn VenueStore>,
        cache: ListingCache,
    ) -> Arc<Self> {
        let catalog = VenueCatalog::new(store, cache, config.catalog.clone());
        Arc::new(Self { catalog, config })
    }

    pub fn with_cache_backend(
        config: config::Config,
        store: Arc<dyn VenueStore>,
        backend: Arc<dyn CacheBackend>,
    ) -> Arc<Self> {
        let cache = ListingCache::new(backend, &config.cache);
        Self::from_parts(config, store, cache)
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(|| async { "Venue Catalog API v1.0" }))
        .route("/health", get(|| async { "OK" }))
        .nest("/venue", controllers::routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
