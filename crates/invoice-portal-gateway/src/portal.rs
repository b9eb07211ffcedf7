//! The four public invoice operations.
//!
//! Every operation runs the same prelude: parse the path, validate the token
//! upstream, then pass the gate. Only an [`AuthorizedAccess`] reaches the
//! freshness resolver, the streamer or the relay, so no data-returning or
//! mutating call is made before the token has been bound to the path's
//! invoice.

use crate::access::{
    authorize, ActionRelay, AuthorizedAccess, DocumentStream, DocumentStreamer,
    FreshnessResolver, StreamError, TokenValidator,
};
use crate::domain::config::LimitsConfig;
use crate::domain::{
    AccessToken, ByteRange, CorrelationId, InvoiceId, PortalError, PortalResult,
    PublicActionResponse, PublicInvoiceResponse, SignaturePath, UpstreamOperation,
};
use crate::middleware::{ClientContext, GatewayMetrics};
use crate::ports::{DocumentStorage, InvoiceAuthority};
use std::sync::Arc;
use tracing::{info, warn};

/// Who is asking, for the logs.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub correlation_id: CorrelationId,
    pub client: ClientContext,
}

/// Application service behind the public routes.
#[derive(Clone)]
pub struct PortalService {
    validator: TokenValidator,
    freshness: FreshnessResolver,
    streamer: DocumentStreamer,
    relay: ActionRelay,
    metrics: Arc<GatewayMetrics>,
    max_signature_length: usize,
}

impl PortalService {
    pub fn new(
        authority: Arc<dyn InvoiceAuthority>,
        storage: Arc<dyn DocumentStorage>,
        limits: &LimitsConfig,
        metrics: Arc<GatewayMetrics>,
    ) -> Self {
        Self {
            validator: TokenValidator::new(Arc::clone(&authority)),
            freshness: FreshnessResolver::new(Arc::clone(&authority)),
            streamer: DocumentStreamer::new(storage),
            relay: ActionRelay::new(authority),
            metrics,
            max_signature_length: limits.max_signature_length,
        }
    }

    pub fn metrics(&self) -> Arc<GatewayMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Invoice metadata. Read-only: never marks the invoice as viewed.
    pub async fn invoice_details(
        &self,
        ctx: &RequestContext,
        invoice_id: &str,
        token: &str,
    ) -> PortalResult<PublicInvoiceResponse> {
        let access = self.authorize(ctx, invoice_id, token).await?;

        if access.snapshot().pdf_storage_key.is_none() {
            return Err(self.reject(ctx, invoice_id, PortalError::ArtifactUnavailable));
        }

        info!(
            invoice_id = %access.invoice_id(),
            correlation_id = %ctx.correlation_id,
            "Invoice details served"
        );
        Ok(PublicInvoiceResponse::from_validated(access.invoice()))
    }

    /// Open the invoice PDF, honouring a single byte range.
    pub async fn invoice_document(
        &self,
        ctx: &RequestContext,
        invoice_id: &str,
        token: &str,
        range: Option<ByteRange>,
    ) -> PortalResult<DocumentStream> {
        let access = self.authorize(ctx, invoice_id, token).await?;

        let resolution = self.freshness.ensure_fresh(&access).await;
        self.metrics.record_artifact(&resolution);
        let Some(artifact) = resolution.reference() else {
            return Err(self.reject(ctx, invoice_id, PortalError::ArtifactUnavailable));
        };

        let stream = self
            .streamer
            .stream(&access, &artifact, range)
            .await
            .map_err(|e| {
                let error = match e {
                    StreamError::RangeNotSatisfiable { total } => {
                        PortalError::RangeNotSatisfiable { total }
                    }
                    StreamError::TemporarilyUnavailable(_) => {
                        PortalError::UpstreamUnavailable(UpstreamOperation::StreamDocument)
                    }
                };
                self.reject(ctx, invoice_id, error)
            })?;

        self.metrics.record_document(stream.is_partial());
        info!(
            invoice_id = %access.invoice_id(),
            correlation_id = %ctx.correlation_id,
            artifact = resolution.label(),
            partial = stream.is_partial(),
            "Invoice PDF streaming"
        );
        Ok(stream)
    }

    pub async fn mark_viewed(
        &self,
        ctx: &RequestContext,
        invoice_id: &str,
        token: &str,
    ) -> PortalResult<PublicActionResponse> {
        let access = self.authorize(ctx, invoice_id, token).await?;

        if !self.relay.mark_viewed(&access).await {
            return Err(self.reject(
                ctx,
                invoice_id,
                PortalError::UpstreamUnavailable(UpstreamOperation::MarkViewed),
            ));
        }
        Ok(PublicActionResponse::ok("Invoice marked as viewed"))
    }

    /// Attach a signature. The payload is checked before the token, so an
    /// oversized or empty payload never causes an upstream call.
    pub async fn submit_signature(
        &self,
        ctx: &RequestContext,
        invoice_id: &str,
        token: &str,
        signature_path: Option<&str>,
    ) -> PortalResult<PublicActionResponse> {
        let signature =
            SignaturePath::parse(signature_path.unwrap_or_default(), self.max_signature_length)
                .map_err(|e| {
                    self.reject(ctx, invoice_id, PortalError::ValidationPayload(e.to_string()))
                })?;

        let access = self.authorize(ctx, invoice_id, token).await?;

        if !self.relay.submit_signature(&access, &signature).await {
            return Err(self.reject(
                ctx,
                invoice_id,
                PortalError::UpstreamUnavailable(UpstreamOperation::SubmitSignature),
            ));
        }
        Ok(PublicActionResponse::ok("Signature submitted successfully"))
    }

    /// Parse the path, validate the token and bind it to the path's invoice.
    async fn authorize(
        &self,
        ctx: &RequestContext,
        raw_invoice_id: &str,
        raw_token: &str,
    ) -> PortalResult<AuthorizedAccess> {
        let invoice_id: InvoiceId = raw_invoice_id.parse().map_err(|_| {
            self.reject(
                ctx,
                raw_invoice_id,
                PortalError::ValidationPayload("invoice id is not a UUID".into()),
            )
        })?;

        // Structurally impossible tokens never reach the authority
        let Some(token) = AccessToken::parse(raw_token) else {
            return Err(self.reject(
                ctx,
                raw_invoice_id,
                PortalError::InvalidToken { reason: None },
            ));
        };

        let validation = self.validator.validate(&token).await.map_err(|_| {
            self.reject(
                ctx,
                raw_invoice_id,
                PortalError::UpstreamUnavailable(UpstreamOperation::ValidateToken),
            )
        })?;

        authorize(invoice_id, token, validation)
            .map_err(|rejection| self.reject(ctx, raw_invoice_id, rejection.into()))
    }

    /// Log and count a rejection, then hand it back.
    pub(crate) fn reject(
        &self,
        ctx: &RequestContext,
        invoice_id: &str,
        error: PortalError,
    ) -> PortalError {
        self.metrics.record_rejection(&error);
        if error.is_server_error() {
            warn!(
                invoice_id,
                correlation_id = %ctx.correlation_id,
                client_ip = %ctx.client.ip,
                user_agent = %ctx.client.user_agent,
                kind = error.kind(),
                error = %error,
                "Portal request failed"
            );
        } else {
            info!(
                invoice_id,
                correlation_id = %ctx.correlation_id,
                client_ip = %ctx.client.ip,
                user_agent = %ctx.client.user_agent,
                kind = error.kind(),
                "Portal request rejected"
            );
        }
        error
    }
}
