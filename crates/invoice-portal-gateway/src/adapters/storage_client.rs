//! HTTP client for the document storage authority.

use crate::domain::config::UpstreamConfig;
use crate::domain::{ByteRange, ContentRange, GatewayError};
use crate::ports::{DocumentStorage, ServedRange, StorageError, StoredDocument};
use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use reqwest::header::{HeaderName, CONTENT_RANGE, RANGE};
use reqwest::{Client, StatusCode};
use tracing::debug;

/// reqwest implementation of [`DocumentStorage`].
#[derive(Clone)]
pub struct HttpDocumentStorage {
    client: Client,
    stream_url: String,
}

impl HttpDocumentStorage {
    pub fn new(config: &UpstreamConfig) -> Result<Self, GatewayError> {
        // Connect timeout only: a total timeout would cut long documents.
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| GatewayError::Client(e.to_string()))?;

        Ok(Self {
            client,
            stream_url: format!("{}/stream-pdf", config.storage_url.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl DocumentStorage for HttpDocumentStorage {
    async fn fetch(
        &self,
        storage_key: &str,
        range: Option<ByteRange>,
    ) -> Result<StoredDocument, StorageError> {
        let mut request = self
            .client
            .get(&self.stream_url)
            .query(&[("storage-key", storage_key)]);
        if let Some(range) = range {
            request = request.header(RANGE, range.to_string());
        }

        let response = request
            .send()
            .await
            .map_err(|e| StorageError::Transport(e.to_string()))?;

        let status = response.status();
        let header = |name: HeaderName| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let content_range = header(CONTENT_RANGE);

        let served = match status {
            StatusCode::OK => ServedRange::Full,
            StatusCode::PARTIAL_CONTENT => {
                let parsed = content_range.as_deref().and_then(ContentRange::parse);
                match parsed {
                    Some(range) => ServedRange::Partial(range),
                    None => {
                        return Err(StorageError::Transport(
                            "partial response without a usable Content-Range".into(),
                        ))
                    }
                }
            }
            StatusCode::NOT_FOUND => return Err(StorageError::NotFound),
            StatusCode::RANGE_NOT_SATISFIABLE => {
                return Err(StorageError::RangeNotSatisfiable {
                    total: content_range.as_deref().and_then(unsatisfied_total),
                })
            }
            other => {
                debug!(status = other.as_u16(), "Storage returned non-success status");
                return Err(StorageError::Status(other.as_u16()));
            }
        };

        let content_length = response.content_length();
        let body = response
            .bytes_stream()
            .map_err(std::io::Error::other)
            .boxed();

        Ok(StoredDocument {
            body,
            content_length,
            served,
        })
    }
}

/// Total length from a `bytes */<len>` Content-Range.
fn unsatisfied_total(header: &str) -> Option<u64> {
    header.trim().strip_prefix("bytes */")?.trim().parse().ok()
}
