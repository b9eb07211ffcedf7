//! Outbound ports for the invoice portal.
//!
//! The two upstream authorities are reached only through these traits. The
//! reqwest adapters in [`crate::adapters`] implement them for production;
//! tests substitute in-memory fakes.

use crate::domain::{
    AccessToken, ByteRange, ContentRange, EnsurePdfRecord, SignatureRecord, ValidationRecord,
};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use std::fmt;

/// Document bytes relayed from storage.
pub type ByteStream = BoxStream<'static, Result<Bytes, std::io::Error>>;

/// Failure talking to the token/invoice authority.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthorityError {
    /// Non-success HTTP status
    #[error("authority returned status {0}")]
    Status(u16),
    /// Connect, timeout or I/O failure
    #[error("authority transport error: {0}")]
    Transport(String),
    /// Success status but the body could not be decoded
    #[error("malformed authority response: {0}")]
    Malformed(String),
}

/// Token/invoice authority. Every call is keyed by token; the authority
/// derives the owning invoice and organization itself.
#[async_trait]
pub trait InvoiceAuthority: Send + Sync {
    /// `GET /validate?token=<t>`
    async fn validate_token(&self, token: &AccessToken) -> Result<ValidationRecord, AuthorityError>;

    /// `GET /ensure-pdf?token=<t>`
    async fn ensure_pdf_current(&self, token: &AccessToken)
        -> Result<EnsurePdfRecord, AuthorityError>;

    /// `POST /viewed?token=<t>`
    async fn mark_viewed(&self, token: &AccessToken) -> Result<(), AuthorityError>;

    /// `POST /signature?token=<t>`
    async fn submit_signature(
        &self,
        token: &AccessToken,
        signature: &SignatureRecord,
    ) -> Result<(), AuthorityError>;
}

/// Which part of the document storage actually served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServedRange {
    Full,
    Partial(ContentRange),
}

/// An open document body from storage.
pub struct StoredDocument {
    pub body: ByteStream,
    /// Length of `body` in bytes, when storage reported it
    pub content_length: Option<u64>,
    pub served: ServedRange,
}

impl fmt::Debug for StoredDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredDocument")
            .field("content_length", &self.content_length)
            .field("served", &self.served)
            .finish_non_exhaustive()
    }
}

/// Failure fetching a document.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    #[error("document not found")]
    NotFound,
    #[error("range not satisfiable")]
    RangeNotSatisfiable { total: Option<u64> },
    #[error("storage returned status {0}")]
    Status(u16),
    #[error("storage transport error: {0}")]
    Transport(String),
}

/// Document storage authority.
#[async_trait]
pub trait DocumentStorage: Send + Sync {
    /// `GET /stream-pdf?storage-key=<k>`, forwarding `range` when present.
    async fn fetch(
        &self,
        storage_key: &str,
        range: Option<ByteRange>,
    ) -> Result<StoredDocument, StorageError>;
}
