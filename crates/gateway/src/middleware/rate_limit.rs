//! Per-actor rate limiting using the token bucket algorithm

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use reviewforge_common::{
    auth::{TokenVerifier, ACTOR_ID_HEADER},
    errors::{AppError, Result},
};
use std::num::NonZeroU32;
use std::sync::Arc;

use crate::AppState;

/// Rate limiter keyed by caller identity
pub type ActorRateLimiter = DefaultKeyedRateLimiter<String>;

/// Create a new rate limiter
pub fn create_rate_limiter(requests_per_second: u32, burst: u32) -> Result<Arc<ActorRateLimiter>> {
    let non_zero = |value: u32, name: &str| {
        NonZeroU32::new(value).ok_or_else(|| AppError::Configuration {
            message: format!("rate_limit.{} must be non-zero", name),
        })
    };

    let quota = Quota::per_second(non_zero(requests_per_second, "requests_per_second")?)
        .allow_burst(non_zero(burst, "burst")?);

    Ok(Arc::new(RateLimiter::keyed(quota)))
}

/// Bucket key for the caller.
///
/// With a `TokenVerifier` installed the identity headers are ignored by
/// authentication, so the bucket follows the bearer credential instead.
fn rate_limit_key(request: &Request) -> String {
    let headers = request.headers();
    let verified = request.extensions().get::<Arc<TokenVerifier>>().is_some();
    let identity = if verified {
        headers.get("authorization")
    } else {
        headers
            .get(ACTOR_ID_HEADER)
            .or_else(|| headers.get("authorization"))
    };

    identity
        .and_then(|v| v.to_str().ok())
        .unwrap_or("anonymous")
        .to_string()
}

/// Rate limiting middleware
pub async fn rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response> {
    if let Some(limiter) = &state.limiter {
        let key = rate_limit_key(&request);
        if limiter.check_key(&key).is_err() {
            tracing::warn!(key = %key, "Rate limit exceeded");
            return Err(AppError::RateLimited {
                limit: state.config.rate_limit.requests_per_second,
            });
        }
    }

    Ok(next.run(request).await)
}
