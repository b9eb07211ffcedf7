//! Core types for token-gated invoice access.
//!
//! Nothing here talks to the network. The upstream wire records live in
//! [`crate::domain::records`]; these are the validated shapes the access
//! components pass around.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Longest token accepted before any upstream call is made.
pub const MAX_TOKEN_LENGTH: usize = 2048;

/// Default maximum length of a submitted signature path, in characters.
pub const DEFAULT_MAX_SIGNATURE_LENGTH: usize = 5000;

/// Due-date text shown when the invoice has no due date.
pub const DUE_ON_RECEIPT: &str = "On receipt";

// =============================================================================
// Identifiers
// =============================================================================

/// Invoice identifier taken from the URL path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvoiceId(Uuid);

impl InvoiceId {
    pub fn new(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for InvoiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for InvoiceId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

impl From<Uuid> for InvoiceId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Possession-based access token.
///
/// The value is opaque: the only local checks are that it is non-empty,
/// bounded, and made of URL-safe characters. Its meaning is resolved entirely
/// by the invoice authority. `Debug` and `Display` never print the raw value so
/// that tokens cannot end up in logs.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    /// Accept a raw token from the request path, or `None` if it cannot
    /// possibly be valid.
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.is_empty() || raw.len() > MAX_TOKEN_LENGTH {
            return None;
        }
        if !raw.bytes().all(is_url_safe) {
            return None;
        }
        Some(Self(raw.to_string()))
    }

    /// Raw token, for forwarding to the authority only.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

fn is_url_safe(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'~' | b'=')
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccessToken(<{} bytes>)", self.0.len())
    }
}

impl fmt::Display for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}

// =============================================================================
// Token validation
// =============================================================================

/// Invoice state as reported by the authority at validation time.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InvoiceSnapshot {
    pub invoice_number: String,
    pub invoice_date: Option<NaiveDateTime>,
    pub invoice_due_date: Option<NaiveDateTime>,
    /// Storage key of the last generated PDF, if any.
    pub pdf_storage_key: Option<String>,
    pub signature_path: Option<String>,
    pub viewed: bool,
}

/// A token the authority accepted, with the invoice it is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedInvoice {
    pub invoice_id: InvoiceId,
    pub snapshot: InvoiceSnapshot,
}

/// Outcome of validating a token.
///
/// Snapshot fields are only reachable through `Valid`, so an invalid result
/// can never leak invoice data to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenValidation {
    Valid(ValidatedInvoice),
    Invalid {
        /// Caller-facing reason supplied by the authority (e.g. "Token expired").
        reason: Option<String>,
    },
}

impl TokenValidation {
    pub fn invalid() -> Self {
        Self::Invalid { reason: None }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid(_))
    }
}

// =============================================================================
// Artifacts
// =============================================================================

/// Storage key of the document to stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactReference {
    pub storage_key: String,
    pub was_regenerated: bool,
}

/// How the freshness resolver arrived at a storage key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactResolution {
    /// The authority confirmed the existing artifact is current.
    Current(String),
    /// The authority regenerated the artifact.
    Regenerated(String),
    /// The freshness check failed; the key from token validation is used.
    FellBackTo(String),
    /// Neither the freshness check nor the validation produced a key.
    NoArtifact,
}

impl ArtifactResolution {
    pub fn reference(&self) -> Option<ArtifactReference> {
        match self {
            Self::Current(key) | Self::FellBackTo(key) => Some(ArtifactReference {
                storage_key: key.clone(),
                was_regenerated: false,
            }),
            Self::Regenerated(key) => Some(ArtifactReference {
                storage_key: key.clone(),
                was_regenerated: true,
            }),
            Self::NoArtifact => None,
        }
    }

    /// Short label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Current(_) => "current",
            Self::Regenerated(_) => "regenerated",
            Self::FellBackTo(_) => "fallback",
            Self::NoArtifact => "none",
        }
    }
}

// =============================================================================
// Signature payload
// =============================================================================

/// Local reasons a signature payload is refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("signature_path is required")]
    Empty,
    #[error("signature_path is {length} characters, maximum is {max}")]
    TooLong { length: usize, max: usize },
}

/// Signature path that passed local validation and may be relayed upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignaturePath(String);

impl SignaturePath {
    /// Validate a submitted signature path against `max_length` characters.
    pub fn parse(raw: &str, max_length: usize) -> Result<Self, SignatureError> {
        if raw.trim().is_empty() {
            return Err(SignatureError::Empty);
        }
        let length = raw.chars().count();
        if length > max_length {
            return Err(SignatureError::TooLong {
                length,
                max: max_length,
            });
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// =============================================================================
// Public responses
// =============================================================================

/// Invoice metadata returned by the metadata endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicInvoiceResponse {
    pub invoice_id: InvoiceId,
    pub invoice_number: String,
    pub date: String,
    pub due_date: String,
    pub signature_path: String,
    pub viewed: bool,
}

impl PublicInvoiceResponse {
    pub fn from_validated(invoice: &ValidatedInvoice) -> Self {
        let snapshot = &invoice.snapshot;
        Self {
            invoice_id: invoice.invoice_id,
            invoice_number: snapshot.invoice_number.clone(),
            date: snapshot.invoice_date.map(long_date).unwrap_or_default(),
            due_date: snapshot
                .invoice_due_date
                .map(long_date)
                .unwrap_or_else(|| DUE_ON_RECEIPT.to_string()),
            signature_path: snapshot.signature_path.clone().unwrap_or_default(),
            viewed: snapshot.viewed,
        }
    }
}

/// Body of action responses and of every error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicActionResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PublicActionResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: None,
            error: Some(error.into()),
        }
    }
}

/// Long date form, e.g. `Monday, January 15, 2024`.
pub fn long_date(value: NaiveDateTime) -> String {
    value.format("%A, %B %-d, %Y").to_string()
}
