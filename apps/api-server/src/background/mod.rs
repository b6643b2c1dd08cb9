//! Background jobs.

mod scheduler;

use std::sync::Arc;
use std::time::Duration;

use jury_infra::InMemoryRateLimiter;
use tokio_cron_scheduler::JobSchedulerError;

pub use scheduler::{Scheduler, SchedulerConfig};

/// Register the periodic sweep of idle in-memory buckets.
pub async fn register_rate_limit_sweep(
    scheduler: &Scheduler,
    limiter: Arc<InMemoryRateLimiter>,
    period: Duration,
    max_age: Duration,
) -> Result<uuid::Uuid, JobSchedulerError> {
    scheduler
        .add_repeated(period, move || {
            let limiter = limiter.clone();
            async move {
                let evicted = limiter.sweep(max_age).await;
                if evicted > 0 {
                    tracing::info!(evicted, "Swept idle rate limit buckets");
                }
            }
        })
        .await
}
