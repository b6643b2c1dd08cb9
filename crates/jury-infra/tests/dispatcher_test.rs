//! Integration tests for webhook fan-out against mock endpoints.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use jury_core::domain::{EventPayload, Webhook, WebhookEvent, WebhookEventKind};
use jury_core::error::RepoError;
use jury_core::ports::{BaseRepository, EventDispatcher, WebhookRepository};
use jury_infra::webhooks::{DispatchError, DispatchSummary, sign_payload, verify_signature};
use jury_infra::{DispatcherConfig, InMemoryWebhookRepository, WebhookDispatcher};

const SECRET_A: &str = "whsec_alpha";
const SECRET_B: &str = "whsec_bravo";

fn webhook(user_id: Uuid, url: String, secret: &str, events: &[&str]) -> Webhook {
    Webhook::new(
        user_id,
        url,
        secret.to_string(),
        events.iter().map(|e| e.to_string()).collect(),
    )
}

fn vote_payload() -> EventPayload {
    let mut payload = EventPayload::new();
    payload.insert("poll_id".to_string(), json!("d3f1c2"));
    payload.insert("option_ids".to_string(), json!([2]));
    payload
}

fn dispatcher(repo: Arc<InMemoryWebhookRepository>) -> WebhookDispatcher {
    WebhookDispatcher::new(repo, DispatcherConfig::default()).unwrap()
}

async fn mount_ok(server: &MockServer, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(200))
        .expect(expected_calls)
        .mount(server)
        .await;
}

#[tokio::test]
async fn no_matching_webhooks_makes_no_calls() {
    let server = MockServer::start().await;
    mount_ok(&server, 0).await;

    let user_id = Uuid::new_v4();
    let repo = Arc::new(InMemoryWebhookRepository::with_webhooks([webhook(
        user_id,
        format!("{}/hook", server.uri()),
        SECRET_A,
        &["poll.deleted"],
    )]));

    let event = WebhookEvent::new(WebhookEventKind::VoteCreated, vote_payload());
    let summary = dispatcher(repo).deliver(user_id, &event).await.unwrap();

    assert_eq!(summary, DispatchSummary::default());
}

#[tokio::test]
async fn unsubscribed_webhook_never_receives_event() {
    let subscribed = MockServer::start().await;
    let unsubscribed = MockServer::start().await;
    mount_ok(&subscribed, 1).await;
    mount_ok(&unsubscribed, 0).await;

    let user_id = Uuid::new_v4();
    let repo = Arc::new(InMemoryWebhookRepository::with_webhooks([
        webhook(
            user_id,
            format!("{}/hook", subscribed.uri()),
            SECRET_A,
            &["poll.created"],
        ),
        webhook(
            user_id,
            format!("{}/hook", unsubscribed.uri()),
            SECRET_B,
            &["vote.created", "poll.updated"],
        ),
    ]));

    let event = WebhookEvent::new(WebhookEventKind::PollCreated, EventPayload::new());
    let summary = dispatcher(repo).deliver(user_id, &event).await.unwrap();

    assert_eq!(summary.matched, 1);
    assert_eq!(summary.delivered, 1);
}

#[tokio::test]
async fn inactive_and_foreign_webhooks_are_ignored() {
    let server = MockServer::start().await;
    mount_ok(&server, 0).await;

    let user_id = Uuid::new_v4();
    let url = format!("{}/hook", server.uri());
    let mut inactive = webhook(user_id, url.clone(), SECRET_A, &["vote.created"]);
    inactive.is_active = false;
    let foreign = webhook(Uuid::new_v4(), url, SECRET_A, &["vote.created"]);

    let repo = Arc::new(InMemoryWebhookRepository::with_webhooks([
        inactive.clone(),
        foreign.clone(),
    ]));

    let event = WebhookEvent::new(WebhookEventKind::VoteCreated, vote_payload());
    let summary = dispatcher(repo.clone()).deliver(user_id, &event).await.unwrap();

    assert_eq!(summary.matched, 0);
    let stored = repo.find_by_id(inactive.id).await.unwrap().unwrap();
    assert!(stored.last_triggered_at.is_none());
}

#[tokio::test]
async fn failing_endpoint_does_not_affect_sibling() {
    let failing = MockServer::start().await;
    let healthy = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&failing)
        .await;
    mount_ok(&healthy, 1).await;

    let user_id = Uuid::new_v4();
    let failing_hook = webhook(
        user_id,
        format!("{}/hook", failing.uri()),
        SECRET_A,
        &["vote.created"],
    );
    let healthy_hook = webhook(
        user_id,
        format!("{}/hook", healthy.uri()),
        SECRET_B,
        &["vote.created"],
    );
    let repo = Arc::new(InMemoryWebhookRepository::with_webhooks([
        failing_hook.clone(),
        healthy_hook.clone(),
    ]));

    let before = Utc::now();
    let event = WebhookEvent::new(WebhookEventKind::VoteCreated, vote_payload());
    let summary = dispatcher(repo.clone()).deliver(user_id, &event).await.unwrap();

    assert_eq!(
        summary,
        DispatchSummary {
            matched: 2,
            delivered: 1,
            failed: 1,
            skipped: 0,
        }
    );

    // Both attempts are stamped, whatever the status code.
    for id in [failing_hook.id, healthy_hook.id] {
        let stored = repo.find_by_id(id).await.unwrap().unwrap();
        let touched = stored.last_triggered_at.expect("last_triggered_at should be set");
        assert!(touched >= before);
    }
}

#[tokio::test]
async fn signature_matches_raw_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .and(header("content-type", "application/json"))
        .and(header("x-webhook-event", "vote.created"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let user_id = Uuid::new_v4();
    let repo = Arc::new(InMemoryWebhookRepository::with_webhooks([webhook(
        user_id,
        format!("{}/hook", server.uri()),
        SECRET_A,
        &["vote.created"],
    )]));

    let event = WebhookEvent::new(WebhookEventKind::VoteCreated, vote_payload());
    let summary = dispatcher(repo).deliver(user_id, &event).await.unwrap();
    assert_eq!(summary.delivered, 1);

    let requests = server.received_requests().await.unwrap();
    let request = &requests[0];
    let signature = request
        .headers
        .get("x-webhook-signature")
        .and_then(|v| v.to_str().ok())
        .expect("signature header");

    assert_eq!(signature, sign_payload(SECRET_A, &request.body).unwrap());
    assert!(verify_signature(SECRET_A, &request.body, signature));
    assert!(!verify_signature(SECRET_B, &request.body, signature));

    let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
    assert_eq!(body["event"], "vote.created");
    assert_eq!(body["payload"]["poll_id"], "d3f1c2");
    let timestamp = body["timestamp"].as_str().unwrap();
    assert!(timestamp.ends_with('Z'));
    assert!(timestamp.parse::<DateTime<Utc>>().is_ok());
}

#[tokio::test]
async fn all_recipients_share_body_but_not_signature() {
    let first = MockServer::start().await;
    let second = MockServer::start().await;
    mount_ok(&first, 1).await;
    mount_ok(&second, 1).await;

    let user_id = Uuid::new_v4();
    let repo = Arc::new(InMemoryWebhookRepository::with_webhooks([
        webhook(
            user_id,
            format!("{}/hook", first.uri()),
            SECRET_A,
            &["poll.updated"],
        ),
        webhook(
            user_id,
            format!("{}/hook", second.uri()),
            SECRET_B,
            &["poll.updated"],
        ),
    ]));

    let event = WebhookEvent::new(WebhookEventKind::PollUpdated, EventPayload::new());
    dispatcher(repo).deliver(user_id, &event).await.unwrap();

    let a = &first.received_requests().await.unwrap()[0];
    let b = &second.received_requests().await.unwrap()[0];
    assert_eq!(a.body, b.body);
    assert_ne!(
        a.headers.get("x-webhook-signature"),
        b.headers.get("x-webhook-signature")
    );
}

#[tokio::test]
async fn invalid_url_is_skipped_without_touch() {
    let server = MockServer::start().await;
    mount_ok(&server, 1).await;

    let user_id = Uuid::new_v4();
    let broken = webhook(user_id, "not a url".to_string(), SECRET_A, &["vote.created"]);
    let ftp = webhook(
        user_id,
        "ftp://files.example.com/hook".to_string(),
        SECRET_A,
        &["vote.created"],
    );
    let good = webhook(
        user_id,
        format!("{}/hook", server.uri()),
        SECRET_B,
        &["vote.created"],
    );
    let repo = Arc::new(InMemoryWebhookRepository::with_webhooks([
        broken.clone(),
        ftp.clone(),
        good.clone(),
    ]));

    let event = WebhookEvent::new(WebhookEventKind::VoteCreated, vote_payload());
    let summary = dispatcher(repo.clone()).deliver(user_id, &event).await.unwrap();

    assert_eq!(summary.matched, 3);
    assert_eq!(summary.delivered, 1);
    assert_eq!(summary.skipped, 2);

    for id in [broken.id, ftp.id] {
        let stored = repo.find_by_id(id).await.unwrap().unwrap();
        assert!(stored.last_triggered_at.is_none());
    }
    let stored = repo.find_by_id(good.id).await.unwrap().unwrap();
    assert!(stored.last_triggered_at.is_some());
}

#[tokio::test]
async fn slow_endpoint_times_out_and_is_still_touched() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let user_id = Uuid::new_v4();
    let slow = webhook(
        user_id,
        format!("{}/hook", server.uri()),
        SECRET_A,
        &["poll.deleted"],
    );
    let repo = Arc::new(InMemoryWebhookRepository::with_webhooks([slow.clone()]));

    let config = DispatcherConfig {
        timeout: Duration::from_millis(200),
        ..Default::default()
    };
    let dispatcher = WebhookDispatcher::new(repo.clone(), config).unwrap();

    let event = WebhookEvent::new(WebhookEventKind::PollDeleted, EventPayload::new());
    let summary = dispatcher.deliver(user_id, &event).await.unwrap();

    assert_eq!(summary.failed, 1);
    let stored = repo.find_by_id(slow.id).await.unwrap().unwrap();
    assert!(stored.last_triggered_at.is_some());
}

#[tokio::test]
async fn unreachable_endpoint_counts_as_failed() {
    let user_id = Uuid::new_v4();
    // Port 9 (discard) on localhost is expected to refuse connections.
    let hook = webhook(
        user_id,
        "http://127.0.0.1:9/hook".to_string(),
        SECRET_A,
        &["vote.created"],
    );
    let repo = Arc::new(InMemoryWebhookRepository::with_webhooks([hook.clone()]));

    let event = WebhookEvent::new(WebhookEventKind::VoteCreated, vote_payload());
    let summary = dispatcher(repo.clone()).deliver(user_id, &event).await.unwrap();

    assert_eq!(summary.failed, 1);
    let stored = repo.find_by_id(hook.id).await.unwrap().unwrap();
    assert!(stored.last_triggered_at.is_some());
}

struct UnavailableStore;

#[async_trait]
impl BaseRepository<Webhook, Uuid> for UnavailableStore {
    async fn find_by_id(&self, _id: Uuid) -> Result<Option<Webhook>, RepoError> {
        Err(RepoError::Connection("connection refused".to_string()))
    }

    async fn save(&self, _entity: Webhook) -> Result<Webhook, RepoError> {
        Err(RepoError::Connection("connection refused".to_string()))
    }

    async fn delete(&self, _id: Uuid) -> Result<(), RepoError> {
        Err(RepoError::Connection("connection refused".to_string()))
    }
}

#[async_trait]
impl WebhookRepository for UnavailableStore {
    async fn find_active_by_user(&self, _user_id: Uuid) -> Result<Vec<Webhook>, RepoError> {
        Err(RepoError::Connection("connection refused".to_string()))
    }

    async fn touch_last_triggered(&self, _id: Uuid, _at: DateTime<Utc>) -> Result<(), RepoError> {
        Err(RepoError::Connection("connection refused".to_string()))
    }
}

#[tokio::test]
async fn store_failure_aborts_dispatch() {
    let dispatcher =
        WebhookDispatcher::new(Arc::new(UnavailableStore), DispatcherConfig::default()).unwrap();

    let event = WebhookEvent::new(WebhookEventKind::VoteCreated, vote_payload());
    let result = dispatcher.deliver(Uuid::new_v4(), &event).await;
    assert!(matches!(result, Err(DispatchError::Store(_))));

    // The fire-and-forget path swallows the same failure.
    dispatcher.dispatch(Uuid::new_v4(), WebhookEventKind::VoteCreated, vote_payload());
    assert!(dispatcher.drain(Duration::from_secs(5)).await);
}

#[tokio::test]
async fn dispatch_returns_before_delivery_and_drain_waits() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(300)))
        .expect(1)
        .mount(&server)
        .await;

    let user_id = Uuid::new_v4();
    let hook = webhook(
        user_id,
        format!("{}/hook", server.uri()),
        SECRET_A,
        &["vote.created"],
    );
    let repo = Arc::new(InMemoryWebhookRepository::with_webhooks([hook.clone()]));
    let dispatcher = dispatcher(repo.clone());

    dispatcher.dispatch(user_id, WebhookEventKind::VoteCreated, vote_payload());
    assert_eq!(dispatcher.in_flight(), 1);

    assert!(dispatcher.drain(Duration::from_secs(5)).await);
    assert_eq!(dispatcher.in_flight(), 0);

    let stored = repo.find_by_id(hook.id).await.unwrap().unwrap();
    assert!(stored.last_triggered_at.is_some());
}

#[tokio::test]
async fn drain_gives_up_after_grace_period() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let user_id = Uuid::new_v4();
    let repo = Arc::new(InMemoryWebhookRepository::with_webhooks([webhook(
        user_id,
        format!("{}/hook", server.uri()),
        SECRET_A,
        &["vote.created"],
    )]));
    let dispatcher = dispatcher(repo);

    dispatcher.dispatch(user_id, WebhookEventKind::VoteCreated, vote_payload());
    assert!(!dispatcher.drain(Duration::from_millis(100)).await);
}

/// Delegates to an in-memory store but panics when touching one webhook.
struct PanickingTouch {
    inner: InMemoryWebhookRepository,
    panic_on: Uuid,
}

#[async_trait]
impl BaseRepository<Webhook, Uuid> for PanickingTouch {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Webhook>, RepoError> {
        self.inner.find_by_id(id).await
    }

    async fn save(&self, entity: Webhook) -> Result<Webhook, RepoError> {
        self.inner.save(entity).await
    }

    async fn delete(&self, id: Uuid) -> Result<(), RepoError> {
        self.inner.delete(id).await
    }
}

#[async_trait]
impl WebhookRepository for PanickingTouch {
    async fn find_active_by_user(&self, user_id: Uuid) -> Result<Vec<Webhook>, RepoError> {
        self.inner.find_active_by_user(user_id).await
    }

    async fn touch_last_triggered(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), RepoError> {
        if id == self.panic_on {
            panic!("touch failed for {id}");
        }
        self.inner.touch_last_triggered(id, at).await
    }
}

#[tokio::test]
async fn panicking_delivery_does_not_cancel_sibling() {
    let fast = MockServer::start().await;
    let slow = MockServer::start().await;
    mount_ok(&fast, 2).await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(400)))
        .expect(2)
        .mount(&slow)
        .await;

    let user_id = Uuid::new_v4();
    let doomed = webhook(user_id, format!("{}/hook", fast.uri()), SECRET_A, &["vote.created"]);
    let sibling = webhook(user_id, format!("{}/hook", slow.uri()), SECRET_B, &["vote.created"]);
    let repo = Arc::new(PanickingTouch {
        inner: InMemoryWebhookRepository::with_webhooks([doomed.clone(), sibling.clone()]),
        panic_on: doomed.id,
    });
    let dispatcher = WebhookDispatcher::new(repo.clone(), DispatcherConfig::default()).unwrap();

    let event = WebhookEvent::new(WebhookEventKind::VoteCreated, vote_payload());
    let summary = dispatcher.deliver(user_id, &event).await.unwrap();

    assert_eq!(summary.matched, 2);
    assert_eq!(summary.delivered, 1);
    assert_eq!(summary.failed, 1);
    let stored = repo.find_by_id(sibling.id).await.unwrap().unwrap();
    assert!(stored.last_triggered_at.is_some());

    // Same through the fire-and-forget path.
    dispatcher.dispatch(user_id, WebhookEventKind::VoteCreated, vote_payload());
    assert!(dispatcher.drain(Duration::from_secs(5)).await);
}
