//! Portal error taxonomy and HTTP status mapping.
//!
//! Every entry point returns `Result<_, PortalError>`. The public message of
//! each variant is fixed; detail carried inside a variant is for logs only.

use axum::http::StatusCode;
use std::fmt;

/// Upstream operation that failed, used to pick the public message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamOperation {
    ValidateToken,
    StreamDocument,
    MarkViewed,
    SubmitSignature,
}

impl UpstreamOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ValidateToken => "validate_token",
            Self::StreamDocument => "stream_document",
            Self::MarkViewed => "mark_viewed",
            Self::SubmitSignature => "submit_signature",
        }
    }

    fn public_message(&self) -> &'static str {
        match self {
            Self::ValidateToken => "Token validation unavailable",
            Self::StreamDocument => "PDF temporarily unavailable",
            Self::MarkViewed => "Failed to mark as viewed",
            Self::SubmitSignature => "Failed to save signature",
        }
    }
}

impl fmt::Display for UpstreamOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request-level failure returned by every public entry point.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortalError {
    /// Token unknown, expired, revoked, or structurally impossible.
    #[error("invalid token")]
    InvalidToken { reason: Option<String> },

    /// Valid token presented against another invoice's URL.
    #[error("token does not match invoice")]
    InvoiceMismatch,

    /// Local input constraint violated; nothing was sent upstream.
    #[error("invalid payload: {0}")]
    ValidationPayload(String),

    /// The requested byte range lies outside the document.
    #[error("range not satisfiable")]
    RangeNotSatisfiable { total: Option<u64> },

    /// No document exists for the invoice, even after fallback.
    #[error("no artifact available")]
    ArtifactUnavailable,

    /// An upstream authority failed or could not be reached.
    #[error("upstream unavailable during {0}")]
    UpstreamUnavailable(UpstreamOperation),

    /// Anything not modeled above.
    #[error("internal error: {0}")]
    Internal(String),
}

impl PortalError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidToken { .. } => StatusCode::UNAUTHORIZED,
            Self::InvoiceMismatch | Self::ValidationPayload(_) => StatusCode::BAD_REQUEST,
            Self::RangeNotSatisfiable { .. } => StatusCode::RANGE_NOT_SATISFIABLE,
            Self::ArtifactUnavailable | Self::UpstreamUnavailable(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message safe to show a public caller.
    pub fn public_message(&self) -> String {
        match self {
            Self::InvalidToken { reason } => reason
                .clone()
                .filter(|r| !r.trim().is_empty())
                .unwrap_or_else(|| "Invalid token".to_string()),
            Self::InvoiceMismatch => "Token does not match invoice".to_string(),
            Self::ValidationPayload(_) => "Invalid request data".to_string(),
            Self::RangeNotSatisfiable { .. } => "Requested range not satisfiable".to_string(),
            Self::ArtifactUnavailable => "PDF not available".to_string(),
            Self::UpstreamUnavailable(op) => op.public_message().to_string(),
            Self::Internal(_) => "Internal server error".to_string(),
        }
    }

    /// Stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidToken { .. } => "invalid_token",
            Self::InvoiceMismatch => "invoice_mismatch",
            Self::ValidationPayload(_) => "validation_payload",
            Self::RangeNotSatisfiable { .. } => "range_not_satisfiable",
            Self::ArtifactUnavailable => "artifact_unavailable",
            Self::UpstreamUnavailable(_) => "upstream_unavailable",
            Self::Internal(_) => "internal",
        }
    }

    pub fn is_server_error(&self) -> bool {
        self.status().is_server_error()
    }
}

/// Result type for portal operations
pub type PortalResult<T> = Result<T, PortalError>;

/// Startup and server errors (never shown to callers).
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Server socket bind error
    #[error("server bind error: {0}")]
    Bind(String),

    /// Upstream client could not be built
    #[error("upstream client error: {0}")]
    Client(String),

    /// Server terminated with an I/O error
    #[error("server error: {0}")]
    Serve(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            PortalError::InvalidToken { reason: None }.status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(PortalError::InvoiceMismatch.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            PortalError::ValidationPayload("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            PortalError::RangeNotSatisfiable { total: Some(10) }.status(),
            StatusCode::RANGE_NOT_SATISFIABLE
        );
        assert_eq!(
            PortalError::ArtifactUnavailable.status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            PortalError::UpstreamUnavailable(UpstreamOperation::MarkViewed).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert!(PortalError::Internal("boom".into()).is_server_error());
    }

    #[test]
    fn test_public_message_hides_detail() {
        let err = PortalError::Internal("db pool exhausted at 10.0.0.3".into());
        assert_eq!(err.public_message(), "Internal server error");

        let err = PortalError::ValidationPayload("signature_path is 6000 characters".into());
        assert_eq!(err.public_message(), "Invalid request data");
    }

    #[test]
    fn test_invalid_token_reason() {
        let err = PortalError::InvalidToken {
            reason: Some("Token expired".into()),
        };
        assert_eq!(err.public_message(), "Token expired");

        let err = PortalError::InvalidToken {
            reason: Some("  ".into()),
        };
        assert_eq!(err.public_message(), "Invalid token");
    }

    #[test]
    fn test_upstream_messages() {
        assert_eq!(
            PortalError::UpstreamUnavailable(UpstreamOperation::SubmitSignature).public_message(),
            "Failed to save signature"
        );
        assert_eq!(
            PortalError::UpstreamUnavailable(UpstreamOperation::StreamDocument).public_message(),
            "PDF temporarily unavailable"
        );
    }
}
