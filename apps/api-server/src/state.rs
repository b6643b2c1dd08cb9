//! Application state - shared across all handlers.

use std::io;
use std::sync::Arc;

use jury_core::ports::{EventDispatcher, RateLimiter, WebhookRepository};
use jury_infra::{InMemoryRateLimiter, InMemoryWebhookRepository, WebhookDispatcher};

#[cfg(feature = "postgres")]
use jury_infra::{DatabaseConnections, PostgresWebhookRepository};

#[cfg(feature = "redis")]
use jury_infra::RedisRateLimiter;

use crate::config::{AppConfig, RateLimitSettings};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub rate_limiter: Arc<dyn RateLimiter>,
    pub dispatcher: Arc<dyn EventDispatcher>,
    pub rate_limits: RateLimitSettings,
}

/// Concrete backends the server keeps hold of for background work and shutdown.
pub struct Backends {
    pub webhooks: WebhookDispatcher,
    /// Set when buckets live in process memory and need periodic sweeping.
    pub memory_limiter: Option<Arc<InMemoryRateLimiter>>,
}

impl AppState {
    /// Build the application state with appropriate implementations.
    ///
    /// Must run inside the main runtime: the webhook dispatcher binds to it so
    /// deliveries outlive the HTTP workers during shutdown.
    pub async fn build(config: &AppConfig) -> io::Result<(Self, Backends)> {
        let repo = webhook_repository(config).await;

        let webhooks = WebhookDispatcher::new(repo, config.dispatcher.clone())
            .map_err(|e| io::Error::other(e.to_string()))?;

        let (rate_limiter, memory_limiter) = rate_limiter(config).await;

        tracing::info!("Application state initialized");

        let state = Self {
            rate_limiter,
            dispatcher: Arc::new(webhooks.clone()),
            rate_limits: config.rate_limits,
        };

        Ok((
            state,
            Backends {
                webhooks,
                memory_limiter,
            },
        ))
    }
}

#[cfg(feature = "postgres")]
async fn webhook_repository(config: &AppConfig) -> Arc<dyn WebhookRepository> {
    let Some(db_config) = config.database.as_ref() else {
        tracing::warn!("DATABASE_URL not set. Using in-memory webhook store.");
        return Arc::new(InMemoryWebhookRepository::new());
    };

    match DatabaseConnections::init(db_config).await {
        Ok(connections) => Arc::new(PostgresWebhookRepository::new(connections.main)),
        Err(e) => {
            tracing::error!(
                "Failed to connect to database: {}. Using in-memory webhook store.",
                e
            );
            Arc::new(InMemoryWebhookRepository::new())
        }
    }
}

#[cfg(not(feature = "postgres"))]
async fn webhook_repository(config: &AppConfig) -> Arc<dyn WebhookRepository> {
    if config.database.is_some() {
        tracing::warn!("DATABASE_URL ignored: built without the postgres feature");
    }
    tracing::info!("Running without postgres feature - using in-memory webhook store");
    Arc::new(InMemoryWebhookRepository::new())
}

type Limiters = (Arc<dyn RateLimiter>, Option<Arc<InMemoryRateLimiter>>);

fn memory_limiter() -> Limiters {
    let limiter = Arc::new(InMemoryRateLimiter::new());
    (limiter.clone(), Some(limiter))
}

#[cfg(feature = "redis")]
async fn rate_limiter(config: &AppConfig) -> Limiters {
    let Some(redis_config) = config.redis.clone() else {
        tracing::info!("REDIS_URL not set. Using in-memory rate limiter.");
        return memory_limiter();
    };

    match RedisRateLimiter::new(redis_config).await {
        Ok(limiter) => {
            tracing::info!("Using Redis rate limiter");
            (Arc::new(limiter), None)
        }
        Err(e) => {
            tracing::error!(
                "Failed to connect to Redis: {}. Using in-memory rate limiter.",
                e
            );
            memory_limiter()
        }
    }
}

#[cfg(not(feature = "redis"))]
async fn rate_limiter(_config: &AppConfig) -> Limiters {
    tracing::info!("Running without redis feature - using in-memory rate limiter");
    memory_limiter()
}
