//! Request span and correlation id.
//!
//! Every request runs inside a `portal_request` span carrying the method,
//! the path with its token segment redacted, and the correlation id. The id
//! is stored as a request extension and echoed as `x-request-id`.

use super::metrics::{GatewayMetrics, RequestTimer};
use crate::domain::correlation::{CorrelationId, REQUEST_ID_HEADER};
use axum::{
    body::Body,
    http::{HeaderValue, Request},
    response::Response,
};
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};
use tracing::{info, info_span, warn, Instrument, Span};

const PUBLIC_PREFIX: &str = "/public/invoices/";
const REDACTED: &str = "<token>";

/// Tracing layer that creates spans for each request
#[derive(Clone)]
pub struct TracingLayer {
    metrics: Arc<GatewayMetrics>,
}

impl TracingLayer {
    pub fn new(metrics: Arc<GatewayMetrics>) -> Self {
        Self { metrics }
    }
}

impl<S> Layer<S> for TracingLayer {
    type Service = TracingService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TracingService {
            inner,
            metrics: Arc::clone(&self.metrics),
        }
    }
}

/// Tracing service
#[derive(Clone)]
pub struct TracingService<S> {
    inner: S,
    metrics: Arc<GatewayMetrics>,
}

impl<S> Service<Request<Body>> for TracingService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        let mut inner = self.inner.clone();
        let metrics = Arc::clone(&self.metrics);

        let correlation_id = CorrelationId::from_header(
            req.headers()
                .get(REQUEST_ID_HEADER)
                .and_then(|v| v.to_str().ok()),
        );
        req.extensions_mut().insert(correlation_id);

        let span = info_span!(
            "portal_request",
            http.method = %req.method(),
            http.target = %redact_path(req.uri().path()),
            correlation_id = %correlation_id,
            http.status_code = tracing::field::Empty,
        );

        Box::pin(
            async move {
                let timer = RequestTimer::start();
                let mut result = inner.call(req).await;
                let latency_ms = timer.elapsed_ms();

                match &mut result {
                    Ok(response) => {
                        let status = response.status();
                        Span::current().record("http.status_code", status.as_u16());
                        metrics.record_request(!status.is_server_error(), latency_ms);

                        if let Ok(value) = HeaderValue::from_str(&correlation_id.to_string()) {
                            response.headers_mut().insert(REQUEST_ID_HEADER, value);
                        }
                        if status.is_server_error() {
                            warn!(status = status.as_u16(), latency_ms, "Request failed");
                        } else {
                            info!(status = status.as_u16(), latency_ms, "Request completed");
                        }
                    }
                    Err(_) => {
                        metrics.record_request(false, latency_ms);
                        warn!(latency_ms, "Request errored");
                    }
                }

                result
            }
            .instrument(span),
        )
    }
}

/// Replace the token segment of a portal path so it never reaches the logs.
pub fn redact_path(path: &str) -> String {
    let Some(rest) = path.strip_prefix(PUBLIC_PREFIX) else {
        return path.to_string();
    };
    let mut segments = rest.splitn(3, '/');
    let invoice_id = segments.next().unwrap_or_default();
    match (segments.next(), segments.next()) {
        (Some(_token), Some(tail)) => format!("{PUBLIC_PREFIX}{invoice_id}/{REDACTED}/{tail}"),
        (Some(_token), None) => format!("{PUBLIC_PREFIX}{invoice_id}/{REDACTED}"),
        _ => path.to_string(),
    }
}
