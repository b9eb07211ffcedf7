//! Host-imposed handler timeout.
//!
//! A request that outlives `timeouts.request` is answered with
//! `504 Gateway Timeout`. Dropping the handler future drops any upstream call
//! still in flight.

use super::metrics::GatewayMetrics;
use crate::domain::config::TimeoutConfig;
use crate::domain::PublicActionResponse;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tower::{Layer, Service};
use tracing::warn;

/// Timeout layer
#[derive(Clone)]
pub struct TimeoutLayer {
    limit: Duration,
    metrics: Arc<GatewayMetrics>,
}

impl TimeoutLayer {
    pub fn new(config: &TimeoutConfig, metrics: Arc<GatewayMetrics>) -> Self {
        Self {
            limit: config.request,
            metrics,
        }
    }
}

impl<S> Layer<S> for TimeoutLayer {
    type Service = TimeoutService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TimeoutService {
            inner,
            limit: self.limit,
            metrics: Arc::clone(&self.metrics),
        }
    }
}

/// Timeout service
#[derive(Clone)]
pub struct TimeoutService<S> {
    inner: S,
    limit: Duration,
    metrics: Arc<GatewayMetrics>,
}

impl<S> Service<Request<Body>> for TimeoutService<S>
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
        let limit = self.limit;
        let metrics = Arc::clone(&self.metrics);
        let mut inner = self.inner.clone();

        Box::pin(async move {
            match timeout(limit, inner.call(req)).await {
                Ok(result) => result,
                Err(_) => {
                    metrics.record_timeout();
                    warn!(timeout_ms = limit.as_millis() as u64, "Request timed out");
                    Ok(timeout_response())
                }
            }
        })
    }
}

fn timeout_response() -> Response {
    (
        StatusCode::GATEWAY_TIMEOUT,
        Json(PublicActionResponse::failed("Request timed out")),
    )
        .into_response()
}
