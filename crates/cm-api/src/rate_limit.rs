//! Per-client-IP request budget enforced in front of every route.

use std::net::{IpAddr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{State, connect_info::ConnectInfo},
    http::Request,
    middleware::Next,
    response::Response,
};
use governor::{
    Quota, RateLimiter, clock::DefaultClock, middleware::NoOpMiddleware,
    state::keyed::DashMapStateStore,
};

use crate::SharedState;
use crate::error::ApiError;

type KeyedLimiter = RateLimiter<IpAddr, DashMapStateStore<IpAddr>, DefaultClock, NoOpMiddleware>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub per_sec: u32,
    pub burst: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            per_sec: 20,
            burst: 40,
        }
    }
}

impl RateLimitConfig {
    /// `CM_RATE_LIMIT_PER_SEC` / `CM_RATE_LIMIT_BURST`; zero or unparsable values keep the default.
    pub fn from_env() -> Self {
        let positive = |name: &str| {
            std::env::var(name)
                .ok()
                .and_then(|raw| raw.trim().parse::<u32>().ok())
                .filter(|value| *value > 0)
        };
        let defaults = Self::default();

        Self {
            per_sec: positive("CM_RATE_LIMIT_PER_SEC").unwrap_or(defaults.per_sec),
            burst: positive("CM_RATE_LIMIT_BURST").unwrap_or(defaults.burst),
        }
    }

    fn quota(&self) -> Quota {
        let burst = NonZeroU32::new(self.burst).unwrap_or(NonZeroU32::MIN);
        let replenish = Duration::from_secs(1) / self.per_sec.max(1);
        Quota::with_period(replenish)
            .unwrap_or_else(|| Quota::per_second(burst))
            .allow_burst(burst)
    }
}

/// Token bucket keyed by client IP.
#[derive(Clone)]
pub struct ClientRateLimiter {
    inner: Arc<KeyedLimiter>,
}

impl ClientRateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            inner: Arc::new(RateLimiter::keyed(config.quota())),
        }
    }

    pub fn from_env() -> Self {
        Self::new(RateLimitConfig::from_env())
    }

    /// Requests without a known peer address are never throttled.
    pub fn check(&self, client: Option<IpAddr>) -> Result<(), ApiError> {
        match client {
            Some(ip) if self.inner.check_key(&ip).is_err() => {
                Err(ApiError::TooManyRequests(format!("rate limit exceeded for {ip}")))
            }
            _ => Ok(()),
        }
    }
}

fn peer_ip(req: &Request<Body>) -> Option<IpAddr> {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
}

pub(crate) async fn limit_by_client(
    State(state): State<SharedState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    state.rate_limiter.check(peer_ip(&req))?;
    Ok(next.run(req).await)
}
