//! Rate limit probe.

use actix_web::{HttpRequest, HttpResponse, web};
use jury_shared::dto::RateLimitStatus;

use crate::middleware::error::{AppError, AppResult};
use crate::middleware::rate_limit::{bucket_key, client_ip, retry_after_secs};
use crate::state::AppState;

/// Spend one token from the caller's bucket for `scope`.
///
/// GET /api/rate-limit/{scope}
pub async fn check_scope(
    state: web::Data<AppState>,
    req: HttpRequest,
    scope: web::Path<String>,
) -> AppResult<HttpResponse> {
    let scope = scope.into_inner();
    let config = state
        .rate_limits
        .scope(&scope)
        .ok_or_else(|| AppError::NotFound(format!("Unknown rate limit scope: {}", scope)))?;

    let key = bucket_key(&scope, &client_ip(&req, state.rate_limits.trust_forwarded_for));
    let result = state.rate_limiter.check(&key, &config).await?;

    if !result.success {
        tracing::warn!(key = %key, "Rate limit exceeded");
        return Err(AppError::TooManyRequests {
            retry_after_secs: retry_after_secs(&config),
        });
    }

    Ok(HttpResponse::Ok()
        .insert_header(("X-RateLimit-Remaining", result.remaining.to_string()))
        .json(RateLimitStatus {
            success: result.success,
            remaining: result.remaining,
        }))
}
