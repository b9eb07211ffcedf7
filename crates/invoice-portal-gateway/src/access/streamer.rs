//! Document streaming from storage, range aware.
//!
//! The caller's `Range` is forwarded to storage. When storage honours it the
//! partial body is relayed as is. When storage answers with the whole
//! document and a known length, the range is applied here while relaying, so
//! the caller always sees the bytes it asked for and nothing else. A whole
//! document of unknown length is relayed in full.

use super::gate::AuthorizedAccess;
use crate::domain::{ArtifactReference, ByteRange, ContentRange, ResolvedRange};
use crate::ports::{ByteStream, DocumentStorage, ServedRange, StorageError};
use bytes::Bytes;
use futures::{future, StreamExt, TryStreamExt};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

pub const PDF_CONTENT_TYPE: &str = "application/pdf";

/// Body and headers of a document response.
pub struct DocumentStream {
    pub body: ByteStream,
    pub content_type: &'static str,
    pub content_length: Option<u64>,
    /// Set when only part of the document is sent
    pub content_range: Option<ContentRange>,
}

impl DocumentStream {
    pub fn is_partial(&self) -> bool {
        self.content_range.is_some()
    }
}

impl fmt::Debug for DocumentStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentStream")
            .field("content_type", &self.content_type)
            .field("content_length", &self.content_length)
            .field("content_range", &self.content_range)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    #[error("document temporarily unavailable: {0}")]
    TemporarilyUnavailable(StorageError),
    #[error("range not satisfiable")]
    RangeNotSatisfiable { total: Option<u64> },
}

#[derive(Clone)]
pub struct DocumentStreamer {
    storage: Arc<dyn DocumentStorage>,
}

impl DocumentStreamer {
    pub fn new(storage: Arc<dyn DocumentStorage>) -> Self {
        Self { storage }
    }

    /// Open the resolved artifact of an authorized invoice.
    pub async fn stream(
        &self,
        access: &AuthorizedAccess,
        artifact: &ArtifactReference,
        range: Option<ByteRange>,
    ) -> Result<DocumentStream, StreamError> {
        let document = match self.storage.fetch(&artifact.storage_key, range).await {
            Ok(document) => document,
            Err(StorageError::RangeNotSatisfiable { total }) => {
                debug!(invoice_id = %access.invoice_id(), ?total, "Range not satisfiable");
                return Err(StreamError::RangeNotSatisfiable { total });
            }
            Err(e) => {
                warn!(invoice_id = %access.invoice_id(), error = %e, "Document storage failed");
                return Err(StreamError::TemporarilyUnavailable(e));
            }
        };

        match (document.served, range, document.content_length) {
            (ServedRange::Partial(content_range), _, _) => Ok(DocumentStream {
                body: document.body,
                content_type: PDF_CONTENT_TYPE,
                content_length: Some(content_range.len()),
                content_range: Some(content_range),
            }),
            (ServedRange::Full, Some(range), Some(total)) => {
                let resolved = range.resolve(total).map_err(|_| {
                    StreamError::RangeNotSatisfiable { total: Some(total) }
                })?;
                debug!(
                    invoice_id = %access.invoice_id(),
                    %range,
                    "Storage ignored range, slicing locally"
                );
                Ok(DocumentStream {
                    body: slice_stream(document.body, resolved),
                    content_type: PDF_CONTENT_TYPE,
                    content_length: Some(resolved.len()),
                    content_range: Some(ContentRange::new(resolved, total)),
                })
            }
            (ServedRange::Full, Some(range), None) => {
                // Without a length the slice bounds cannot be stated in a
                // Content-Range, so the whole document is sent as a 200.
                debug!(
                    invoice_id = %access.invoice_id(),
                    %range,
                    "Storage ignored range and sent no length, serving whole document"
                );
                Ok(DocumentStream {
                    body: document.body,
                    content_type: PDF_CONTENT_TYPE,
                    content_length: None,
                    content_range: None,
                })
            }
            (ServedRange::Full, None, content_length) => Ok(DocumentStream {
                body: document.body,
                content_type: PDF_CONTENT_TYPE,
                content_length,
                content_range: None,
            }),
        }
    }
}

/// Relay only the bytes of `range` from a full-document stream. The upstream
/// stream is dropped as soon as the range end has been passed.
pub(crate) fn slice_stream(body: ByteStream, range: ResolvedRange) -> ByteStream {
    let end = range.end + 1;
    body.scan(0u64, move |offset, chunk| {
        let chunk_start = *offset;
        if chunk_start >= end {
            return future::ready(None);
        }
        let item = chunk.map(|bytes: Bytes| {
            let chunk_end = chunk_start + bytes.len() as u64;
            *offset = chunk_end;
            let lo = range.start.max(chunk_start);
            let hi = end.min(chunk_end);
            if lo >= hi {
                Bytes::new()
            } else {
                bytes.slice((lo - chunk_start) as usize..(hi - chunk_start) as usize)
            }
        });
        future::ready(Some(item))
    })
    .try_filter(|bytes| future::ready(!bytes.is_empty()))
    .boxed()
}
