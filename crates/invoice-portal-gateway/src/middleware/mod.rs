//! Middleware stack for the invoice portal.
//!
//! Layer order (outermost first): CORS → Tracing → ClientContext → RateLimit
//! → BodyLimit → Timeout → Handler

pub mod client_context;
pub mod cors;
pub mod metrics;
pub mod rate_limit;
pub mod timeout;
pub mod tracing;

pub use client_context::{ClientContext, ClientContextLayer};
pub use cors::create_cors_layer;
pub use metrics::{GatewayMetrics, MetricsSnapshot, RequestTimer};
pub use rate_limit::{cleanup_task, RateLimitLayer, RateLimitState};
pub use timeout::TimeoutLayer;
pub use tracing::TracingLayer;

use crate::domain::config::GatewayConfig;
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;

/// Middleware stack builder
pub struct MiddlewareStack {
    pub cors: CorsLayer,
    pub tracing: TracingLayer,
    pub client_context: ClientContextLayer,
    pub rate_limit: RateLimitLayer,
    pub body_limit: RequestBodyLimitLayer,
    pub timeout: TimeoutLayer,
    pub metrics: Arc<GatewayMetrics>,
}

impl MiddlewareStack {
    /// Create middleware stack from gateway config
    pub fn from_config(config: &GatewayConfig, metrics: Arc<GatewayMetrics>) -> Self {
        Self {
            cors: create_cors_layer(&config.cors),
            tracing: TracingLayer::new(Arc::clone(&metrics)),
            client_context: ClientContextLayer::new(config.security.clone()),
            rate_limit: RateLimitLayer::new(config.rate_limit.clone(), Arc::clone(&metrics)),
            body_limit: RequestBodyLimitLayer::new(config.limits.max_request_size),
            timeout: TimeoutLayer::new(&config.timeouts, Arc::clone(&metrics)),
            metrics,
        }
    }

    /// Get shared metrics
    pub fn metrics(&self) -> Arc<GatewayMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Get rate limit state for cleanup task
    pub fn rate_limit_state(&self) -> Arc<RateLimitState> {
        self.rate_limit.state()
    }

    /// Wrap `router` in the full stack. Layers are added innermost first,
    /// each on its own, so the body limit's request type stays local to it.
    pub fn apply(&self, router: Router) -> Router {
        router
            .layer(self.timeout.clone())
            .layer(self.body_limit.clone())
            .layer(self.rate_limit.clone())
            .layer(self.client_context.clone())
            .layer(self.tracing.clone())
            .layer(self.cors.clone())
    }
}
