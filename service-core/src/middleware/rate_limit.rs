//! Per-IP rate limiting on top of governor's keyed limiter.
//!
//! The client address comes from `x-forwarded-for` when a proxy supplied it,
//! falling back to the socket peer. A request with no determinable address is
//! let through rather than collectively throttled under one bucket.

use crate::error::AppError;
use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use governor::{
    clock::{Clock, DefaultClock},
    state::keyed::DashMapStateStore,
    Quota, RateLimiter,
};
use std::{
    net::{IpAddr, SocketAddr},
    num::NonZeroU32,
    sync::Arc,
    time::Duration,
};

pub type IpRateLimiter = Arc<RateLimiter<SocketAddr, DashMapStateStore<SocketAddr>, DefaultClock>>;

/// Build a keyed limiter allowing `attempts` requests per `window_seconds`,
/// with the full burst available up front.
pub fn create_ip_rate_limiter(attempts: u32, window_seconds: u64) -> IpRateLimiter {
    let attempts = NonZeroU32::new(attempts.max(1)).expect("clamped to at least 1");
    let replenish_every = Duration::from_millis(window_seconds * 1000 / u64::from(attempts.get()));

    let quota = Quota::with_period(replenish_every)
        .expect("replenish period is non-zero")
        .allow_burst(attempts);

    Arc::new(RateLimiter::dashmap(quota))
}

fn client_addr(request: &Request) -> Option<SocketAddr> {
    let forwarded = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|list| list.split(',').next())
        .and_then(|ip| ip.trim().parse::<IpAddr>().ok());

    if let Some(ip) = forwarded {
        // Port is irrelevant for limiting; normalize so one client is one key.
        return Some(SocketAddr::new(ip, 0));
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr)
}

pub async fn ip_rate_limit_middleware(
    State(limiter): State<IpRateLimiter>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(addr) = client_addr(&request) else {
        tracing::warn!("Could not determine IP for rate limiting");
        return Ok(next.run(request).await);
    };

    if let Err(denied) = limiter.check_key(&addr) {
        let retry_after = denied.wait_time_from(DefaultClock::default().now());
        return Err(AppError::TooManyRequests(
            "Too many requests from this IP. Please try again later.".to_string(),
            Some(retry_after.as_secs()),
        ));
    }

    Ok(next.run(request).await)
}
