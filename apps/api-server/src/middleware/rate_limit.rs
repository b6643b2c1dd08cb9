//! Rate limiting middleware.

use actix_web::{
    Error, ResponseError,
    body::EitherBody,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
    http::header::{HeaderName, HeaderValue},
};
use std::future::{Future, Ready, ready};
use std::pin::Pin;
use std::rc::Rc;
use std::sync::Arc;

use jury_core::ports::{RateLimitConfig, RateLimiter};

use super::error::AppError;

const REMAINING_HEADER: &str = "x-ratelimit-remaining";

/// Seconds until one token is back in the bucket, rounded up.
pub fn retry_after_secs(config: &RateLimitConfig) -> u64 {
    let period = config.token_period();
    let secs = period.as_secs() + u64::from(period.subsec_nanos() > 0);
    secs.max(1)
}

/// Client address used to key buckets.
///
/// Forwarding headers are client-controlled, so they are only read when
/// `trust_forwarded_for` is set. Otherwise the socket peer is used.
pub fn client_ip(req: &actix_web::HttpRequest, trust_forwarded_for: bool) -> String {
    if trust_forwarded_for {
        if let Some(ip) = req.connection_info().realip_remote_addr() {
            return ip.to_string();
        }
    }
    req.peer_addr()
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Bucket key for a scope and client.
pub fn bucket_key(scope: &str, ip: &str) -> String {
    format!("{scope}:{ip}")
}

/// Rate limiting middleware factory.
///
/// Each client IP gets its own bucket under `scope`. Limiter failures let the
/// request through.
pub struct RateLimitMiddleware {
    limiter: Arc<dyn RateLimiter>,
    scope: Rc<str>,
    config: RateLimitConfig,
    trust_forwarded_for: bool,
}

impl RateLimitMiddleware {
    pub fn new(limiter: Arc<dyn RateLimiter>, scope: &str, config: RateLimitConfig) -> Self {
        Self {
            limiter,
            scope: Rc::from(scope),
            config,
            trust_forwarded_for: false,
        }
    }

    /// Key on the forwarded client address. See [`client_ip`].
    pub fn trust_forwarded_for(mut self, trust: bool) -> Self {
        self.trust_forwarded_for = trust;
        self
    }
}

impl<S, B> Transform<S, ServiceRequest> for RateLimitMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = RateLimitMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RateLimitMiddlewareService {
            service: Rc::new(service),
            limiter: self.limiter.clone(),
            scope: self.scope.clone(),
            config: self.config,
            trust_forwarded_for: self.trust_forwarded_for,
        }))
    }
}

pub struct RateLimitMiddlewareService<S> {
    service: Rc<S>,
    limiter: Arc<dyn RateLimiter>,
    scope: Rc<str>,
    config: RateLimitConfig,
    trust_forwarded_for: bool,
}

impl<S, B> Service<ServiceRequest> for RateLimitMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let limiter = self.limiter.clone();
        let config = self.config;
        let key = bucket_key(&self.scope, &client_ip(req.request(), self.trust_forwarded_for));

        Box::pin(async move {
            let remaining = match limiter.check(&key, &config).await {
                Ok(result) if !result.success => {
                    tracing::warn!(key = %key, "Rate limit exceeded");

                    let response = AppError::TooManyRequests {
                        retry_after_secs: retry_after_secs(&config),
                    }
                    .error_response();

                    return Ok(req.into_response(response).map_into_right_body());
                }
                Ok(result) => Some(result.remaining),
                Err(e) => {
                    tracing::error!(key = %key, error = %e, "Rate limiter error, failing open");
                    None
                }
            };

            let mut res = service.call(req).await?;
            if let Some(remaining) = remaining {
                res.headers_mut().insert(
                    HeaderName::from_static(REMAINING_HEADER),
                    HeaderValue::from(remaining),
                );
            }
            Ok(res.map_into_left_body())
        })
    }
}
