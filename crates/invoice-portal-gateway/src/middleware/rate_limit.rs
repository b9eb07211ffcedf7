//! Per-IP rate limiting using token buckets.
//!
//! Reads (`GET`) and writes (`POST` to the viewed and signature actions) draw
//! from separate buckets, so a burst of document range requests from a PDF
//! viewer cannot starve the action endpoints and vice versa.

use super::client_context::ClientContext;
use super::metrics::GatewayMetrics;
use crate::domain::config::RateLimitConfig;
use crate::domain::PublicActionResponse;
use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{header::RETRY_AFTER, HeaderValue, Method, Request, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use dashmap::DashMap;
use governor::{
    clock::{Clock, DefaultClock},
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower::{Layer, Service};
use tracing::{debug, warn};

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

fn non_zero(value: u32) -> NonZeroU32 {
    NonZeroU32::new(value).unwrap_or(NonZeroU32::MIN)
}

/// Token bucket entry for an IP address
struct TokenBucket {
    read_limiter: DirectLimiter,
    write_limiter: DirectLimiter,
    /// Last access time (for cleanup)
    last_access: Instant,
}

impl TokenBucket {
    fn new(config: &RateLimitConfig) -> Self {
        let read_quota = Quota::per_second(non_zero(config.requests_per_second))
            .allow_burst(non_zero(config.burst_size));

        let write_burst = (config.burst_size / 10).max(config.writes_per_second);
        let write_quota =
            Quota::per_second(non_zero(config.writes_per_second)).allow_burst(non_zero(write_burst));

        Self {
            read_limiter: RateLimiter::direct(read_quota),
            write_limiter: RateLimiter::direct(write_quota),
            last_access: Instant::now(),
        }
    }

    fn check(&mut self, is_write: bool) -> Result<(), Duration> {
        self.last_access = Instant::now();
        let limiter = if is_write {
            &self.write_limiter
        } else {
            &self.read_limiter
        };
        limiter
            .check()
            .map_err(|not_until| not_until.wait_time_from(DefaultClock::default().now()))
    }
}

/// Rate limiter state shared across requests
pub struct RateLimitState {
    /// Per-IP token buckets
    buckets: DashMap<IpAddr, TokenBucket>,
    config: RateLimitConfig,
}

impl RateLimitState {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            buckets: DashMap::new(),
            config,
        }
    }

    /// Check if request should be allowed; `Err` carries the wait time.
    pub fn check(&self, ip: IpAddr, is_write: bool) -> Result<(), Duration> {
        if !self.config.enabled || self.config.whitelist.contains(&ip) {
            return Ok(());
        }

        let mut bucket = self.buckets.entry(ip).or_insert_with(|| {
            debug!(ip = %ip, "Creating new rate limit bucket");
            TokenBucket::new(&self.config)
        });
        bucket.check(is_write)
    }

    /// Clean up buckets idle for longer than `max_age`
    pub fn cleanup(&self, max_age: Duration) {
        let now = Instant::now();
        self.buckets.retain(|ip, bucket| {
            let age = now.duration_since(bucket.last_access);
            if age > max_age {
                debug!(ip = %ip, age_secs = age.as_secs(), "Removing stale rate limit bucket");
                false
            } else {
                true
            }
        });
    }

    /// Get number of tracked IPs
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }
}

/// Rate limit layer
#[derive(Clone)]
pub struct RateLimitLayer {
    state: Arc<RateLimitState>,
    metrics: Arc<GatewayMetrics>,
}

impl RateLimitLayer {
    pub fn new(config: RateLimitConfig, metrics: Arc<GatewayMetrics>) -> Self {
        Self {
            state: Arc::new(RateLimitState::new(config)),
            metrics,
        }
    }

    pub fn state(&self) -> Arc<RateLimitState> {
        Arc::clone(&self.state)
    }
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimitService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimitService {
            inner,
            state: Arc::clone(&self.state),
            metrics: Arc::clone(&self.metrics),
        }
    }
}

/// Rate limit service
#[derive(Clone)]
pub struct RateLimitService<S> {
    inner: S,
    state: Arc<RateLimitState>,
    metrics: Arc<GatewayMetrics>,
}

impl<S> Service<Request<Body>> for RateLimitService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let ip = client_ip(&req);
        let is_write = req.method() == Method::POST;
        let decision = self.state.check(ip, is_write);
        let metrics = Arc::clone(&self.metrics);
        let mut inner = self.inner.clone();

        Box::pin(async move {
            match decision {
                Ok(()) => inner.call(req).await,
                Err(retry_after) => {
                    metrics.record_rate_limited();
                    warn!(
                        ip = %ip,
                        retry_after_ms = retry_after.as_millis() as u64,
                        is_write,
                        "Rate limit exceeded"
                    );
                    Ok(rate_limit_response(retry_after))
                }
            }
        })
    }
}

/// Resolved client IP, falling back to the direct peer
fn client_ip<B>(req: &Request<B>) -> IpAddr {
    if let Some(context) = req.extensions().get::<ClientContext>() {
        return context.ip;
    }
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

/// 429 with `Retry-After` in whole seconds, rounded up
fn rate_limit_response(retry_after: Duration) -> Response {
    let seconds = retry_after.as_millis().div_ceil(1000).max(1);
    let mut response = (
        StatusCode::TOO_MANY_REQUESTS,
        Json(PublicActionResponse::failed("Too many requests")),
    )
        .into_response();
    if let Ok(value) = HeaderValue::from_str(&seconds.to_string()) {
        response.headers_mut().insert(RETRY_AFTER, value);
    }
    response
}

/// Background task to clean up stale rate limit buckets
pub async fn cleanup_task(state: Arc<RateLimitState>, interval: Duration, max_age: Duration) {
    let mut cleanup_interval = tokio::time::interval(interval);
    cleanup_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        cleanup_interval.tick().await;
        state.cleanup(max_age);
    }
}
