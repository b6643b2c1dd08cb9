//! Rate limiting port.

use async_trait::async_trait;
use std::time::Duration;

/// Rate limiter trait - abstraction over token-bucket backends.
///
/// The key identifies the caller/resource pair (for example `"vote:203.0.113.7"`).
/// Keys are opaque: two callers that build the same key share one budget.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Consume one token for `key` if one is available.
    async fn check(
        &self,
        key: &str,
        config: &RateLimitConfig,
    ) -> Result<RateLimitResult, RateLimitError>;
}

/// Bucket capacity and refill window for one call site.
///
/// `max_tokens` tokens are restored over each `interval`, so the refill rate is
/// `max_tokens / interval` tokens per second.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Bucket capacity.
    pub max_tokens: u32,
    /// Window over which a full bucket is restored.
    pub interval: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_tokens: 10,
            interval: Duration::from_secs(60),
        }
    }
}

impl RateLimitConfig {
    pub fn new(max_tokens: u32, interval: Duration) -> Self {
        Self {
            max_tokens,
            interval,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Reject configurations that would never refill or never admit a request.
    pub fn validate(&self) -> Result<(), RateLimitError> {
        if self.max_tokens == 0 {
            return Err(RateLimitError::InvalidConfig(
                "max_tokens must be greater than zero".to_string(),
            ));
        }
        if self.interval.is_zero() {
            return Err(RateLimitError::InvalidConfig(
                "interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Time for a single token to be restored.
    pub fn token_period(&self) -> Duration {
        self.interval / self.max_tokens.max(1)
    }
}

/// Result of a rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitResult {
    pub success: bool,
    pub remaining: u32,
}

impl RateLimitResult {
    pub fn allowed(remaining: u32) -> Self {
        Self {
            success: true,
            remaining,
        }
    }

    pub fn limited() -> Self {
        Self {
            success: false,
            remaining: 0,
        }
    }
}

/// Rate limit errors.
#[derive(Debug, thiserror::Error)]
pub enum RateLimitError {
    #[error("Invalid rate limit config: {0}")]
    InvalidConfig(String),

    #[error("Backend error: {0}")]
    Backend(String),
}
