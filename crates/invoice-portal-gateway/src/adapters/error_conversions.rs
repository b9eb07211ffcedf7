//! HTTP rendering of portal errors.
//!
//! This is the single boundary where a [`PortalError`] becomes a response.
//! Bodies carry only the public message, never internal detail.

use crate::domain::{ContentRange, PortalError, PublicActionResponse};
use axum::http::header::{HeaderValue, CONTENT_RANGE};
use axum::response::{IntoResponse, Response};
use axum::Json;

impl IntoResponse for PortalError {
    fn into_response(self) -> Response {
        let body = PublicActionResponse::failed(self.public_message());
        let mut response = (self.status(), Json(body)).into_response();

        if let PortalError::RangeNotSatisfiable { total: Some(total) } = self {
            if let Ok(value) = HeaderValue::from_str(&ContentRange::unsatisfied(total)) {
                response.headers_mut().insert(CONTENT_RANGE, value);
            }
        }
        response
    }
}
