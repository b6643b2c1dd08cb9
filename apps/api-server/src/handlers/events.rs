//! Event intake.

use actix_web::{HttpResponse, web};
use jury_core::domain::WebhookEventKind;
use jury_shared::dto::{DispatchAccepted, DispatchEventRequest};

use crate::middleware::error::AppResult;
use crate::state::AppState;

/// Queue an event for delivery to the user's webhooks.
///
/// POST /api/events
pub async fn dispatch_event(
    state: web::Data<AppState>,
    body: web::Json<DispatchEventRequest>,
) -> AppResult<HttpResponse> {
    let DispatchEventRequest {
        user_id,
        event,
        payload,
    } = body.into_inner();

    let kind: WebhookEventKind = event.parse()?;

    tracing::debug!(user_id = %user_id, event = %kind, "Dispatching event");
    state.dispatcher.dispatch(user_id, kind, payload);

    Ok(HttpResponse::Accepted().json(DispatchAccepted {
        accepted: true,
        event: kind.to_string(),
    }))
}
