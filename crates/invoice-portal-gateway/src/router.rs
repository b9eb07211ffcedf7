//! HTTP routes of the public invoice portal.

use crate::domain::{
    ByteRange, CorrelationId, PortalError, PortalResult, PublicActionResponse,
    PublicInvoiceResponse,
};
use crate::middleware::{ClientContext, GatewayMetrics};
use crate::portal::{PortalService, RequestContext};
use axum::{
    async_trait,
    body::Body,
    extract::{rejection::JsonRejection, FromRequestParts, Path, State},
    http::{
        header::{ACCEPT_RANGES, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, RANGE},
        request::Parts,
        HeaderMap, StatusCode,
    },
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::convert::Infallible;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub portal: PortalService,
    pub metrics: Arc<GatewayMetrics>,
}

/// Build the portal routes. Middleware is applied by the caller.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/public/invoices/:invoice_id/:token", get(get_invoice))
        .route("/public/invoices/:invoice_id/:token/file", get(get_invoice_file))
        .route("/public/invoices/:invoice_id/:token/viewed", post(post_viewed))
        .route(
            "/public/invoices/:invoice_id/:token/signature",
            post(post_signature),
        )
        .route("/health", get(health_check))
        .with_state(state)
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for RequestContext {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self {
            correlation_id: parts
                .extensions
                .get::<CorrelationId>()
                .copied()
                .unwrap_or_default(),
            client: parts
                .extensions
                .get::<ClientContext>()
                .cloned()
                .unwrap_or_default(),
        })
    }
}

/// Body of the signature action.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SignatureRequest {
    pub signature_path: Option<String>,
}

async fn get_invoice(
    State(state): State<AppState>,
    Path((invoice_id, token)): Path<(String, String)>,
    ctx: RequestContext,
) -> PortalResult<Json<PublicInvoiceResponse>> {
    state
        .portal
        .invoice_details(&ctx, &invoice_id, &token)
        .await
        .map(Json)
}

async fn get_invoice_file(
    State(state): State<AppState>,
    Path((invoice_id, token)): Path<(String, String)>,
    ctx: RequestContext,
    headers: HeaderMap,
) -> PortalResult<Response> {
    let range = headers
        .get(RANGE)
        .and_then(|v| v.to_str().ok())
        .and_then(ByteRange::parse);

    let stream = state
        .portal
        .invoice_document(&ctx, &invoice_id, &token, range)
        .await?;

    let status = if stream.is_partial() {
        StatusCode::PARTIAL_CONTENT
    } else {
        StatusCode::OK
    };
    let mut builder = Response::builder()
        .status(status)
        .header(CONTENT_TYPE, stream.content_type)
        .header(ACCEPT_RANGES, "bytes");
    if let Some(length) = stream.content_length {
        builder = builder.header(CONTENT_LENGTH, length);
    }
    if let Some(content_range) = stream.content_range {
        builder = builder.header(CONTENT_RANGE, content_range.to_string());
    }

    builder
        .body(Body::from_stream(stream.body))
        .map_err(|e| PortalError::Internal(e.to_string()))
}

async fn post_viewed(
    State(state): State<AppState>,
    Path((invoice_id, token)): Path<(String, String)>,
    ctx: RequestContext,
) -> PortalResult<Json<PublicActionResponse>> {
    state
        .portal
        .mark_viewed(&ctx, &invoice_id, &token)
        .await
        .map(Json)
}

async fn post_signature(
    State(state): State<AppState>,
    Path((invoice_id, token)): Path<(String, String)>,
    ctx: RequestContext,
    payload: Result<Json<SignatureRequest>, JsonRejection>,
) -> PortalResult<Json<PublicActionResponse>> {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            return Err(state.portal.reject(
                &ctx,
                &invoice_id,
                PortalError::ValidationPayload(rejection.body_text()),
            ));
        }
    };

    state
        .portal
        .submit_signature(&ctx, &invoice_id, &token, request.signature_path.as_deref())
        .await
        .map(Json)
}

async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "invoice-portal-gateway",
        "version": env!("CARGO_PKG_VERSION"),
        "metrics": state.metrics.snapshot(),
    }))
}
