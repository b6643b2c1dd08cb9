//! Application configuration loaded from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use jury_core::ports::RateLimitConfig;
use jury_infra::{DatabaseConfig, DispatcherConfig};

#[cfg(feature = "redis")]
use jury_infra::RedisRateLimitConfig;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database: Option<DatabaseConfig>,
    #[cfg(feature = "redis")]
    pub redis: Option<RedisRateLimitConfig>,
    pub rate_limits: RateLimitSettings,
    pub dispatcher: DispatcherConfig,
    /// How long shutdown waits for in-flight webhook deliveries.
    pub shutdown_grace: Duration,
}

/// Per-scope bucket sizes and the in-memory sweep cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitSettings {
    /// Budget for `POST /api/events`.
    pub events: RateLimitConfig,
    /// Budget for vote submission, checked through the probe endpoint.
    pub vote: RateLimitConfig,
    /// How often idle buckets are swept.
    pub cleanup_period: Duration,
    /// Buckets untouched for longer than this are evicted.
    pub max_age: Duration,
    /// Key buckets on `Forwarded`/`X-Forwarded-For` instead of the socket peer.
    /// Only safe behind a proxy that overwrites those headers.
    pub trust_forwarded_for: bool,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            events: RateLimitConfig::new(60, Duration::from_secs(60)),
            vote: RateLimitConfig::default(),
            cleanup_period: Duration::from_secs(300),
            max_age: Duration::from_secs(3600),
            trust_forwarded_for: false,
        }
    }
}

impl RateLimitSettings {
    pub const EVENTS_SCOPE: &'static str = "events";
    pub const VOTE_SCOPE: &'static str = "vote";

    /// Bucket configuration for a named scope.
    pub fn scope(&self, name: &str) -> Option<RateLimitConfig> {
        match name {
            Self::EVENTS_SCOPE => Some(self.events),
            Self::VOTE_SCOPE => Some(self.vote),
            _ => None,
        }
    }

    fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            events: scope_from_env("EVENTS", defaults.events),
            vote: scope_from_env("VOTE", defaults.vote),
            cleanup_period: sweep_period(
                parse_env("RATE_LIMIT_CLEANUP_SECS", defaults.cleanup_period.as_secs()),
                defaults.cleanup_period,
            ),
            max_age: Duration::from_secs(parse_env(
                "RATE_LIMIT_MAX_AGE_SECS",
                defaults.max_age.as_secs(),
            )),
            trust_forwarded_for: parse_env("RATE_LIMIT_TRUST_PROXY", defaults.trust_forwarded_for),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: parse_env("PORT", 8080),
            database: DatabaseConfig::from_env(),
            #[cfg(feature = "redis")]
            redis: RedisRateLimitConfig::from_env(),
            rate_limits: RateLimitSettings::from_env(),
            dispatcher: DispatcherConfig::from_env(),
            shutdown_grace: Duration::from_secs(parse_env("SHUTDOWN_GRACE_SECS", 15)),
        }
    }
}

fn parse_env<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// A zero period would reschedule the sweep back to back.
fn sweep_period(secs: u64, default: Duration) -> Duration {
    if secs == 0 {
        tracing::warn!("RATE_LIMIT_CLEANUP_SECS must be positive, using default");
        return default;
    }
    Duration::from_secs(secs)
}

/// Read `RATE_LIMIT_<SCOPE>_MAX_TOKENS` and `RATE_LIMIT_<SCOPE>_INTERVAL_SECS`.
/// Zero values fall back to the default since they could never admit a request.
fn scope_from_env(scope: &str, default: RateLimitConfig) -> RateLimitConfig {
    let max_tokens = parse_env(&format!("RATE_LIMIT_{scope}_MAX_TOKENS"), default.max_tokens);
    let interval_secs = parse_env(
        &format!("RATE_LIMIT_{scope}_INTERVAL_SECS"),
        default.interval.as_secs(),
    );

    let config = RateLimitConfig::new(max_tokens, Duration::from_secs(interval_secs));
    if config.validate().is_err() {
        tracing::warn!(scope, "Invalid rate limit settings, using defaults");
        return default;
    }
    config
}
