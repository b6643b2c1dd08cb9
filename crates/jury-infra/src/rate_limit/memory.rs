//! In-memory token-bucket rate limiter.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;

use jury_core::ports::{RateLimitConfig, RateLimitError, RateLimitResult, RateLimiter};

/// Bucket state for one key.
#[derive(Debug, Clone, Copy)]
struct RateLimitEntry {
    tokens: u32,
    last_refill: Instant,
}

/// Per-key token-bucket rate limiter backed by a process-wide map.
///
/// Buckets refill lazily on access; no timer runs per key. Idle buckets are
/// only reclaimed by [`InMemoryRateLimiter::sweep`], which the server runs on a
/// schedule. Limits are per-process: a restart resets every bucket and separate
/// instances do not share budgets (use the Redis limiter for that).
pub struct InMemoryRateLimiter {
    store: Mutex<HashMap<String, RateLimitEntry>>,
}

impl InMemoryRateLimiter {
    pub fn new() -> Self {
        Self {
            store: Mutex::new(HashMap::new()),
        }
    }

    /// Evict buckets whose last refill is older than `max_age`.
    ///
    /// Returns the number of evicted keys.
    pub async fn sweep(&self, max_age: Duration) -> usize {
        let now = Instant::now();
        let mut store = self.store.lock().await;
        let before = store.len();

        store.retain(|_, entry| now.saturating_duration_since(entry.last_refill) <= max_age);

        let evicted = before - store.len();
        tracing::debug!(
            evicted,
            tracked = store.len(),
            "Rate limit sweep completed"
        );
        evicted
    }

    /// Number of keys currently tracked.
    pub async fn len(&self) -> usize {
        self.store.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for InMemoryRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

/// Whole tokens restored after `elapsed`. Partial progress toward the next token is dropped.
fn tokens_to_add(elapsed: Duration, config: &RateLimitConfig) -> u64 {
    let refilled =
        elapsed.as_secs_f64() / config.interval.as_secs_f64() * f64::from(config.max_tokens);
    refilled.floor() as u64
}

#[async_trait]
impl RateLimiter for InMemoryRateLimiter {
    async fn check(
        &self,
        key: &str,
        config: &RateLimitConfig,
    ) -> Result<RateLimitResult, RateLimitError> {
        config.validate()?;

        let now = Instant::now();
        // The whole read-modify-write happens under the lock, so concurrent
        // requests for one key are counted exactly.
        let mut store = self.store.lock().await;

        let Some(entry) = store.get_mut(key) else {
            let remaining = config.max_tokens - 1;
            store.insert(
                key.to_string(),
                RateLimitEntry {
                    tokens: remaining,
                    last_refill: now,
                },
            );
            return Ok(RateLimitResult::allowed(remaining));
        };

        let added = tokens_to_add(now.saturating_duration_since(entry.last_refill), config);
        if added > 0 {
            let refilled = (u64::from(entry.tokens) + added).min(u64::from(config.max_tokens));
            entry.tokens = refilled as u32;
            entry.last_refill = now;
        }

        if entry.tokens == 0 {
            tracing::debug!(key = %key, "Rate limit exhausted");
            return Ok(RateLimitResult::limited());
        }

        entry.tokens -= 1;
        Ok(RateLimitResult::allowed(entry.tokens))
    }
}
