//! Fire-and-forget webhook dispatcher.
//!
//! One dispatch loads the user's active webhooks, keeps the ones subscribed to
//! the event, and POSTs the same signed body to each of them concurrently.
//! Every failure is logged and swallowed. There is no retry: a failed delivery
//! is lost apart from its log line and the `last_triggered_at` stamp.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::FutureExt;
use futures::future::join_all;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Url};
use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tokio_util::task::TaskTracker;
use tracing::Instrument;
use uuid::Uuid;

use jury_core::domain::{EventPayload, Webhook, WebhookEvent, WebhookEventKind};
use jury_core::ports::{EventDispatcher, WebhookRepository};

use super::error::{DeliveryError, DispatchError};
use super::signing::{EVENT_HEADER, SIGNATURE_HEADER, sign_payload};

/// Dispatcher configuration.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Per-delivery timeout; the attempt is abandoned as failed afterwards.
    pub timeout: Duration,
    /// Maximum deliveries in flight across all dispatches.
    pub max_in_flight: usize,
    /// User agent sent with every delivery.
    pub user_agent: String,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            max_in_flight: 64,
            user_agent: "TheJury-Webhooks/1.0".to_string(),
        }
    }
}

impl DispatcherConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            timeout: std::env::var("WEBHOOK_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            max_in_flight: std::env::var("WEBHOOK_MAX_IN_FLIGHT")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.max_in_flight),
            user_agent: defaults.user_agent,
        }
    }
}

/// Outcome counts of one dispatch. Only used for logs and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    /// Active webhooks subscribed to the event.
    pub matched: usize,
    /// Deliveries answered with a 2xx status.
    pub delivered: usize,
    /// Deliveries that got a non-2xx status, timed out, or hit a network error.
    pub failed: usize,
    /// Webhooks whose request could not be built; nothing was sent.
    pub skipped: usize,
}

enum DeliveryOutcome {
    Delivered,
    Failed,
    Skipped,
}

/// Webhook dispatcher backed by a shared HTTP client.
///
/// Dispatches run on a [`TaskTracker`] so shutdown can wait for them with
/// [`WebhookDispatcher::drain`]; a semaphore bounds concurrent deliveries.
/// Tasks are spawned on the runtime the dispatcher was created on, not on the
/// caller's, so they outlive short-lived worker runtimes until drained.
#[derive(Clone)]
pub struct WebhookDispatcher {
    repo: Arc<dyn WebhookRepository>,
    client: Client,
    timeout: Duration,
    permits: Arc<Semaphore>,
    tracker: TaskTracker,
    runtime: Handle,
}

impl WebhookDispatcher {
    /// Create a dispatcher reading subscribers from `repo`.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `DispatchError::Client` if the HTTP client cannot be built and
    /// `DispatchError::NoRuntime` outside a runtime.
    pub fn new(
        repo: Arc<dyn WebhookRepository>,
        config: DispatcherConfig,
    ) -> Result<Self, DispatchError> {
        let runtime = Handle::try_current().map_err(|e| DispatchError::NoRuntime(e.to_string()))?;

        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| DispatchError::Client(e.to_string()))?;

        Ok(Self {
            repo,
            client,
            timeout: config.timeout,
            permits: Arc::new(Semaphore::new(config.max_in_flight.max(1))),
            tracker: TaskTracker::new(),
            runtime,
        })
    }

    /// Run one dispatch to completion.
    ///
    /// [`EventDispatcher::dispatch`] spawns this and discards the result.
    ///
    /// # Errors
    ///
    /// Fails only before fan-out starts: the subscriber store could not be read
    /// or the event could not be serialized. Per-webhook failures are counted in
    /// the summary instead.
    pub async fn deliver(
        &self,
        user_id: Uuid,
        event: &WebhookEvent,
    ) -> Result<DispatchSummary, DispatchError> {
        let webhooks = self.repo.find_active_by_user(user_id).await?;

        let targets: Vec<Webhook> = webhooks
            .into_iter()
            .filter(|webhook| webhook.is_subscribed_to(event.event))
            .collect();

        if targets.is_empty() {
            tracing::debug!(%user_id, event = %event.event, "No webhooks subscribed to event");
            return Ok(DispatchSummary::default());
        }

        // Serialized once: every recipient gets identical bytes and timestamp.
        let body = event.to_body()?;

        tracing::info!(
            %user_id,
            event = %event.event,
            webhook_count = targets.len(),
            "Dispatching event to webhooks"
        );

        let outcomes = join_all(targets.iter().map(|webhook| {
            let delivery =
                AssertUnwindSafe(self.deliver_to_webhook(webhook, event.event, &body))
                    .catch_unwind();
            async move {
                delivery.await.unwrap_or_else(|_| {
                    tracing::error!(webhook_id = %webhook.id, "Webhook delivery panicked");
                    DeliveryOutcome::Failed
                })
            }
        }))
        .await;

        let mut summary = DispatchSummary {
            matched: targets.len(),
            ..Default::default()
        };
        for outcome in outcomes {
            match outcome {
                DeliveryOutcome::Delivered => summary.delivered += 1,
                DeliveryOutcome::Failed => summary.failed += 1,
                DeliveryOutcome::Skipped => summary.skipped += 1,
            }
        }
        Ok(summary)
    }

    async fn deliver_to_webhook(
        &self,
        webhook: &Webhook,
        event: WebhookEventKind,
        body: &[u8],
    ) -> DeliveryOutcome {
        let span = tracing::info_span!("webhook_delivery", webhook_id = %webhook.id, event = %event);

        async move {
            // The semaphore is never closed, so acquire only fails if it is dropped.
            let Ok(_permit) = self.permits.acquire().await else {
                return DeliveryOutcome::Skipped;
            };

            let outcome = match self.send(webhook, event, body).await {
                Ok(status) if (200..300).contains(&status) => {
                    tracing::debug!(status, "Webhook delivered");
                    DeliveryOutcome::Delivered
                }
                Ok(status) => {
                    tracing::warn!(status, "Webhook endpoint returned error status");
                    DeliveryOutcome::Failed
                }
                Err(e) if e.was_attempted() => {
                    tracing::warn!(error = %e, "Webhook delivery failed");
                    DeliveryOutcome::Failed
                }
                Err(e) => {
                    tracing::error!(error = %e, "Webhook request could not be built");
                    return DeliveryOutcome::Skipped;
                }
            };

            // Marks the attempt, not its success.
            if let Err(e) = self.repo.touch_last_triggered(webhook.id, Utc::now()).await {
                tracing::error!(error = %e, "Failed to update last_triggered_at");
            }

            outcome
        }
        .instrument(span)
        .await
    }

    async fn send(
        &self,
        webhook: &Webhook,
        event: WebhookEventKind,
        body: &[u8],
    ) -> Result<u16, DeliveryError> {
        let url = Url::parse(&webhook.url).map_err(|e| DeliveryError::InvalidUrl(e.to_string()))?;
        if !matches!(url.scheme(), "https" | "http") {
            return Err(DeliveryError::InvalidUrl(format!(
                "unsupported scheme: {}",
                url.scheme()
            )));
        }

        let signature = sign_payload(&webhook.secret, body)?;

        let start = Instant::now();
        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .header(SIGNATURE_HEADER, signature)
            .header(EVENT_HEADER, event.as_str())
            .body(body.to_vec())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DeliveryError::Timeout(self.timeout.as_secs())
                } else if e.is_builder() {
                    DeliveryError::InvalidUrl(e.to_string())
                } else {
                    DeliveryError::Network(e.to_string())
                }
            })?;

        tracing::debug!(
            status = response.status().as_u16(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Received webhook response"
        );

        Ok(response.status().as_u16())
    }

    /// Number of dispatches still running.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Close the task group and wait for in-flight dispatches.
    ///
    /// Returns `true` if everything finished within `grace`. Deliveries still
    /// running afterwards are abandoned when the runtime shuts down.
    pub async fn drain(&self, grace: Duration) -> bool {
        self.tracker.close();

        let finished = tokio::time::timeout(grace, self.tracker.wait())
            .await
            .is_ok();

        if finished {
            tracing::info!("Webhook dispatcher drained");
        } else {
            tracing::warn!(
                in_flight = self.tracker.len(),
                grace_secs = grace.as_secs(),
                "Abandoning in-flight webhook deliveries"
            );
        }
        finished
    }
}

impl EventDispatcher for WebhookDispatcher {
    fn dispatch(&self, user_id: Uuid, event: WebhookEventKind, payload: EventPayload) {
        let event = WebhookEvent::new(event, payload);
        let dispatcher = self.clone();

        let task = async move {
            let result = AssertUnwindSafe(dispatcher.deliver(user_id, &event))
                .catch_unwind()
                .await;

            match result {
                Ok(Ok(summary)) => tracing::info!(
                    %user_id,
                    event = %event.event,
                    matched = summary.matched,
                    delivered = summary.delivered,
                    failed = summary.failed,
                    skipped = summary.skipped,
                    "Webhook dispatch finished"
                ),
                Ok(Err(e)) => tracing::error!(
                    %user_id,
                    event = %event.event,
                    error = %e,
                    "Webhook dispatch aborted"
                ),
                Err(_) => tracing::error!(
                    %user_id,
                    event = %event.event,
                    "Webhook dispatch panicked"
                ),
            }
        };

        self.tracker.spawn_on(task, &self.runtime);
    }
}
