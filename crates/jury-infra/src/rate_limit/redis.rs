//! Redis token-bucket rate limiter for multi-instance deployments.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{Client, Script};

use jury_core::ports::{RateLimitConfig, RateLimitError, RateLimitResult, RateLimiter};

/// Token bucket over a Redis hash (`tokens`, `last_refill` in epoch millis).
///
/// Mirrors the in-memory algorithm: the first request creates the bucket with one
/// token already spent, refill adds whole tokens only and restarts the refill
/// clock, and a rejected request leaves the bucket untouched.
/// Returns: [allowed (0|1), remaining]
const TOKEN_BUCKET_SCRIPT: &str = r#"
local key = KEYS[1]
local max_tokens = tonumber(ARGV[1])
local interval_ms = tonumber(ARGV[2])
local now_ms = tonumber(ARGV[3])
local ttl_ms = tonumber(ARGV[4])

local state = redis.call('HMGET', key, 'tokens', 'last_refill')
local tokens = tonumber(state[1])
local last_refill = tonumber(state[2])

if tokens == nil or last_refill == nil then
    tokens = max_tokens - 1
    redis.call('HSET', key, 'tokens', tokens, 'last_refill', now_ms)
    redis.call('PEXPIRE', key, ttl_ms)
    return {1, tokens}
end

local elapsed = math.max(0, now_ms - last_refill)
local to_add = math.floor((elapsed / interval_ms) * max_tokens)
if to_add > 0 then
    tokens = math.min(max_tokens, tokens + to_add)
    last_refill = now_ms
end

local allowed = 0
if tokens > 0 then
    tokens = tokens - 1
    allowed = 1
end

redis.call('HSET', key, 'tokens', tokens, 'last_refill', last_refill)
redis.call('PEXPIRE', key, ttl_ms)
return {allowed, tokens}
"#;

/// Redis rate limiter configuration.
#[derive(Debug, Clone)]
pub struct RedisRateLimitConfig {
    /// Redis connection URL
    pub url: String,
    /// Give up connecting after this long
    pub connect_timeout: Duration,
    /// Key prefix for rate limit keys
    pub key_prefix: String,
    /// Idle buckets expire after this long
    pub idle_ttl: Duration,
}

impl Default for RedisRateLimitConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            connect_timeout: Duration::from_secs(5),
            key_prefix: "ratelimit".to_string(),
            idle_ttl: Duration::from_secs(3600),
        }
    }
}

impl RedisRateLimitConfig {
    /// Build from environment. Returns `None` when `REDIS_URL` is unset.
    pub fn from_env() -> Option<Self> {
        let url = std::env::var("REDIS_URL").ok()?;
        Some(Self {
            url,
            connect_timeout: Duration::from_secs(
                std::env::var("REDIS_CONNECT_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5),
            ),
            key_prefix: std::env::var("RATE_LIMIT_KEY_PREFIX")
                .unwrap_or_else(|_| "ratelimit".to_string()),
            idle_ttl: Duration::from_secs(
                std::env::var("RATE_LIMIT_MAX_AGE_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(3600),
            ),
        })
    }
}

/// Redis-backed token bucket shared by every instance pointing at the same server.
///
/// Each check runs as one Lua script, so the read-modify-write is atomic across
/// processes. Buckets expire on their own after `idle_ttl`, which takes the place
/// of the in-memory sweep.
pub struct RedisRateLimiter {
    conn: ConnectionManager,
    config: RedisRateLimitConfig,
    script: Script,
}

impl RedisRateLimiter {
    pub async fn new(config: RedisRateLimitConfig) -> Result<Self, RateLimitError> {
        let client = Client::open(config.url.as_str())
            .map_err(|e| RateLimitError::Backend(e.to_string()))?;

        // Use timeout to prevent hanging if Redis is unreachable
        let conn = tokio::time::timeout(config.connect_timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| RateLimitError::Backend("Connection timed out".to_string()))?
            .map_err(|e| RateLimitError::Backend(e.to_string()))?;

        tracing::info!(prefix = %config.key_prefix, "Connected to Redis rate limiter");

        Ok(Self {
            conn,
            config,
            script: Script::new(TOKEN_BUCKET_SCRIPT),
        })
    }

    fn make_key(&self, key: &str) -> String {
        format!("{}:{}", self.config.key_prefix, key)
    }
}

#[async_trait]
impl RateLimiter for RedisRateLimiter {
    async fn check(
        &self,
        key: &str,
        config: &RateLimitConfig,
    ) -> Result<RateLimitResult, RateLimitError> {
        config.validate()?;

        let redis_key = self.make_key(key);
        let mut conn = self.conn.clone();
        let now_ms = chrono::Utc::now().timestamp_millis();

        let result: Vec<i64> = self
            .script
            .key(&redis_key)
            .arg(config.max_tokens)
            .arg(config.interval.as_millis() as u64)
            .arg(now_ms)
            .arg(self.config.idle_ttl.as_millis().max(1) as u64)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| RateLimitError::Backend(e.to_string()))?;

        let allowed = result.first().copied().unwrap_or(0) == 1;
        let remaining = result.get(1).copied().unwrap_or(0).max(0) as u32;

        if allowed {
            Ok(RateLimitResult::allowed(remaining))
        } else {
            Ok(RateLimitResult::limited())
        }
    }
}
