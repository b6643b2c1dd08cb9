use std::fmt;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::WebhookEventKind;

/// Webhook entity - an endpoint a user registered to receive event notifications.
///
/// Webhooks are managed elsewhere in the application; the notification core only
/// reads them and stamps `last_triggered_at`. The secret keys the payload signature
/// and never leaves the process: the type is not `Serialize` and `Debug` redacts it.
#[derive(Clone, PartialEq, Eq)]
pub struct Webhook {
    pub id: Uuid,
    pub user_id: Uuid,
    pub url: String,
    pub secret: String,
    pub events: Vec<String>,
    pub is_active: bool,
    pub last_triggered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Webhook {
    /// Create an active webhook with a generated ID.
    pub fn new(user_id: Uuid, url: String, secret: String, events: Vec<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            url,
            secret,
            events,
            is_active: true,
            last_triggered_at: None,
            created_at: Utc::now(),
        }
    }

    /// Whether this webhook's subscription list names the given event.
    pub fn is_subscribed_to(&self, event: WebhookEventKind) -> bool {
        self.events.iter().any(|name| name == event.as_str())
    }
}

impl fmt::Debug for Webhook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Webhook")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("url", &self.url)
            .field("secret", &"[redacted]")
            .field("events", &self.events)
            .field("is_active", &self.is_active)
            .field("last_triggered_at", &self.last_triggered_at)
            .field("created_at", &self.created_at)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn webhook(events: &[&str]) -> Webhook {
        Webhook::new(
            Uuid::new_v4(),
            "https://hooks.example.com/jury".to_string(),
            "whsec_top_secret".to_string(),
            events.iter().map(|e| e.to_string()).collect(),
        )
    }

    #[test]
    fn test_subscription_is_exact_match() {
        let hook = webhook(&["vote.created", "poll.updated"]);
        assert!(hook.is_subscribed_to(WebhookEventKind::VoteCreated));
        assert!(hook.is_subscribed_to(WebhookEventKind::PollUpdated));
        assert!(!hook.is_subscribed_to(WebhookEventKind::PollCreated));

        let prefixed = webhook(&["poll.*", "Poll.Created"]);
        assert!(!prefixed.is_subscribed_to(WebhookEventKind::PollCreated));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let hook = webhook(&["vote.created"]);
        let rendered = format!("{:?}", hook);
        assert!(!rendered.contains("whsec_top_secret"));
        assert!(rendered.contains("[redacted]"));
    }
}
