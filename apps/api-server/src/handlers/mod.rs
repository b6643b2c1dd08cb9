//! HTTP handlers and route configuration.

mod events;
mod health;
mod rate_limit;

use actix_web::web;

use crate::config::RateLimitSettings;
use crate::middleware::rate_limit::RateLimitMiddleware;
use crate::state::AppState;

/// Configure all application routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig, state: &AppState) {
    cfg.service(
        web::scope("/api")
            // Public routes
            .route("/health", web::get().to(health::health_check))
            // Rate limited routes
            .service(
                web::resource("/events")
                    .wrap(RateLimitMiddleware::new(
                        state.rate_limiter.clone(),
                        RateLimitSettings::EVENTS_SCOPE,
                        state.rate_limits.events,
                    )
                    .trust_forwarded_for(state.rate_limits.trust_forwarded_for))
                    .route(web::post().to(events::dispatch_event)),
            )
            .route("/rate-limit/{scope}", web::get().to(rate_limit::check_scope)),
    );
}
