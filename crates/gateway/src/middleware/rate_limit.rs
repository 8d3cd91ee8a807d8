//! Rate limiting middleware using token bucket algorithm

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use pitwall_common::errors::{AppError, Result};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Process-wide limiter plus the configured rate for error reporting
#[derive(Clone)]
pub struct RateLimitState {
    limiter: Arc<DefaultDirectRateLimiter>,
    requests_per_second: u32,
}

impl std::fmt::Debug for RateLimitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimitState")
            .field("requests_per_second", &self.requests_per_second)
            .finish_non_exhaustive()
    }
}

/// Create a new rate limiter
pub fn create_rate_limiter(requests_per_second: u32, burst: u32) -> Result<RateLimitState> {
    let rate = NonZeroU32::new(requests_per_second).ok_or_else(|| AppError::Configuration {
        message: "rate_limit.requests_per_second must be positive".to_string(),
    })?;
    let burst = NonZeroU32::new(burst).ok_or_else(|| AppError::Configuration {
        message: "rate_limit.burst must be positive".to_string(),
    })?;

    Ok(RateLimitState {
        limiter: Arc::new(RateLimiter::direct(Quota::per_second(rate).allow_burst(burst))),
        requests_per_second,
    })
}

/// Rate limiting middleware
pub async fn rate_limit_middleware(
    State(state): State<RateLimitState>,
    request: Request,
    next: Next,
) -> Result<Response> {
    match state.limiter.check() {
        Ok(_) => Ok(next.run(request).await),
        Err(_) => {
            tracing::warn!(path = %request.uri().path(), "Rate limit exceeded");
            Err(AppError::RateLimited {
                limit: state.requests_per_second,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limiter_creation() {
        let state = tokio_test::assert_ok!(create_rate_limiter(100, 200));
        assert!(state.limiter.check().is_ok());
    }

    #[test]
    fn test_burst_exhausted() {
        let state = create_rate_limiter(1, 2).unwrap();
        assert!(state.limiter.check().is_ok());
        assert!(state.limiter.check().is_ok());
        assert!(state.limiter.check().is_err());
    }

    #[test]
    fn test_zero_rate_rejected() {
        let err = tokio_test::assert_err!(create_rate_limiter(0, 10));
        assert!(matches!(err, AppError::Configuration { .. }));
    }
}
