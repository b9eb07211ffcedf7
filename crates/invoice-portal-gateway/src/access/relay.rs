//! Forwards viewer actions to the invoice authority. Calls are keyed by the
//! token, never by invoice id, and are not retried.

use super::gate::AuthorizedAccess;
use crate::domain::{SignaturePath, SignatureRecord};
use crate::ports::InvoiceAuthority;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Clone)]
pub struct ActionRelay {
    authority: Arc<dyn InvoiceAuthority>,
}

impl ActionRelay {
    pub fn new(authority: Arc<dyn InvoiceAuthority>) -> Self {
        Self { authority }
    }

    /// Record that the invoice was opened. `false` on any upstream failure.
    pub async fn mark_viewed(&self, access: &AuthorizedAccess) -> bool {
        match self.authority.mark_viewed(access.token()).await {
            Ok(()) => {
                info!(invoice_id = %access.invoice_id(), "Invoice marked as viewed");
                true
            }
            Err(e) => {
                warn!(invoice_id = %access.invoice_id(), error = %e, "Failed to mark invoice as viewed");
                false
            }
        }
    }

    /// Attach a locally validated signature. `false` on any upstream failure.
    pub async fn submit_signature(
        &self,
        access: &AuthorizedAccess,
        signature: &SignaturePath,
    ) -> bool {
        let record = SignatureRecord {
            signature_path: signature.as_str().to_string(),
        };
        match self.authority.submit_signature(access.token(), &record).await {
            Ok(()) => {
                info!(invoice_id = %access.invoice_id(), "Invoice signature saved");
                true
            }
            Err(e) => {
                warn!(invoice_id = %access.invoice_id(), error = %e, "Failed to save invoice signature");
                false
            }
        }
    }
}
