//! Gateway counters, reported by `GET /health`.

use crate::domain::{ArtifactResolution, PortalError};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Invoice portal metrics
#[derive(Debug, Default)]
pub struct GatewayMetrics {
    // Request counters
    pub requests_total: AtomicU64,
    pub requests_success: AtomicU64,
    pub requests_error: AtomicU64,

    // Rejections by outcome
    pub invalid_tokens: AtomicU64,
    pub invoice_mismatches: AtomicU64,
    pub payload_rejections: AtomicU64,
    pub range_rejections: AtomicU64,
    pub upstream_failures: AtomicU64,
    pub rate_limited: AtomicU64,
    pub timeouts: AtomicU64,

    // Document path
    pub documents_streamed: AtomicU64,
    pub partial_responses: AtomicU64,
    pub artifact_fallbacks: AtomicU64,
    pub artifact_regenerations: AtomicU64,
    pub artifacts_missing: AtomicU64,

    // Latency tracking (simplified - no histograms)
    pub total_latency_ms: AtomicU64,
}

impl GatewayMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed request
    pub fn record_request(&self, success: bool, latency_ms: u64) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        if success {
            self.requests_success.fetch_add(1, Ordering::Relaxed);
        } else {
            self.requests_error.fetch_add(1, Ordering::Relaxed);
        }
        self.total_latency_ms.fetch_add(latency_ms, Ordering::Relaxed);
    }

    /// Record a rejected portal request
    pub fn record_rejection(&self, error: &PortalError) {
        let counter = match error {
            PortalError::InvalidToken { .. } => &self.invalid_tokens,
            PortalError::InvoiceMismatch => &self.invoice_mismatches,
            PortalError::ValidationPayload(_) => &self.payload_rejections,
            PortalError::RangeNotSatisfiable { .. } => &self.range_rejections,
            PortalError::ArtifactUnavailable => &self.artifacts_missing,
            PortalError::UpstreamUnavailable(_) | PortalError::Internal(_) => {
                &self.upstream_failures
            }
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Record how the document artifact was resolved
    pub fn record_artifact(&self, resolution: &ArtifactResolution) {
        match resolution {
            ArtifactResolution::Regenerated(_) => {
                self.artifact_regenerations.fetch_add(1, Ordering::Relaxed);
            }
            ArtifactResolution::FellBackTo(_) => {
                self.artifact_fallbacks.fetch_add(1, Ordering::Relaxed);
            }
            ArtifactResolution::Current(_) | ArtifactResolution::NoArtifact => {}
        }
    }

    pub fn record_document(&self, partial: bool) {
        self.documents_streamed.fetch_add(1, Ordering::Relaxed);
        if partial {
            self.partial_responses.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_rate_limited(&self) {
        self.rate_limited.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_timeout(&self) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
    }

    /// Get average latency in ms
    pub fn average_latency_ms(&self) -> f64 {
        let total = self.total_latency_ms.load(Ordering::Relaxed);
        let count = self.requests_total.load(Ordering::Relaxed);
        if count == 0 {
            0.0
        } else {
            total as f64 / count as f64
        }
    }

    /// Point-in-time copy of every counter
    pub fn snapshot(&self) -> MetricsSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        MetricsSnapshot {
            requests_total: load(&self.requests_total),
            requests_success: load(&self.requests_success),
            requests_error: load(&self.requests_error),
            invalid_tokens: load(&self.invalid_tokens),
            invoice_mismatches: load(&self.invoice_mismatches),
            payload_rejections: load(&self.payload_rejections),
            range_rejections: load(&self.range_rejections),
            upstream_failures: load(&self.upstream_failures),
            rate_limited: load(&self.rate_limited),
            timeouts: load(&self.timeouts),
            documents_streamed: load(&self.documents_streamed),
            partial_responses: load(&self.partial_responses),
            artifact_fallbacks: load(&self.artifact_fallbacks),
            artifact_regenerations: load(&self.artifact_regenerations),
            artifacts_missing: load(&self.artifacts_missing),
            average_latency_ms: self.average_latency_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub requests_total: u64,
    pub requests_success: u64,
    pub requests_error: u64,
    pub invalid_tokens: u64,
    pub invoice_mismatches: u64,
    pub payload_rejections: u64,
    pub range_rejections: u64,
    pub upstream_failures: u64,
    pub rate_limited: u64,
    pub timeouts: u64,
    pub documents_streamed: u64,
    pub partial_responses: u64,
    pub artifact_fallbacks: u64,
    pub artifact_regenerations: u64,
    pub artifacts_missing: u64,
    pub average_latency_ms: f64,
}

/// Request timer for latency tracking
pub struct RequestTimer {
    start: Instant,
}

impl RequestTimer {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}
