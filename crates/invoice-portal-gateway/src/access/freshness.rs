//! Artifact freshness: ask the authority for a current PDF, falling back to
//! the key the validation snapshot carried.

use super::gate::AuthorizedAccess;
use crate::domain::{AccessToken, ArtifactResolution};
use crate::ports::InvoiceAuthority;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Clone)]
pub struct FreshnessResolver {
    authority: Arc<dyn InvoiceAuthority>,
}

impl FreshnessResolver {
    pub fn new(authority: Arc<dyn InvoiceAuthority>) -> Self {
        Self { authority }
    }

    /// Resolve the storage key to stream for an authorized invoice.
    pub async fn ensure_fresh(&self, access: &AuthorizedAccess) -> ArtifactResolution {
        let resolution = self
            .resolve(access.token(), access.snapshot().pdf_storage_key.as_deref())
            .await;
        match &resolution {
            ArtifactResolution::Regenerated(_) => {
                info!(invoice_id = %access.invoice_id(), "Invoice PDF regenerated")
            }
            ArtifactResolution::NoArtifact => {
                warn!(invoice_id = %access.invoice_id(), "No PDF available for invoice")
            }
            _ => debug!(
                invoice_id = %access.invoice_id(),
                resolution = resolution.label(),
                "Resolved invoice PDF"
            ),
        }
        resolution
    }

    async fn resolve(&self, token: &AccessToken, fallback_key: Option<&str>) -> ArtifactResolution {
        let fallback = || match fallback_key.filter(|k| !k.trim().is_empty()) {
            Some(key) => ArtifactResolution::FellBackTo(key.to_string()),
            None => ArtifactResolution::NoArtifact,
        };

        match self.authority.ensure_pdf_current(token).await {
            Ok(record) => match record.storage_key.filter(|k| !k.trim().is_empty()) {
                Some(key) if record.was_regenerated => ArtifactResolution::Regenerated(key),
                Some(key) => ArtifactResolution::Current(key),
                None => {
                    warn!("PDF freshness check returned no storage key, using cached key");
                    fallback()
                }
            },
            Err(e) => {
                warn!(error = %e, "PDF freshness check failed, using cached key");
                fallback()
            }
        }
    }
}
