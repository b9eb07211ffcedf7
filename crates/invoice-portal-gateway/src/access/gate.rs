//! Invoice access gate: the invoice-id binding check.
//!
//! [`AuthorizedAccess`] can only be built by [`authorize`], and the
//! freshness resolver, document streamer and action relay all require one.
//! A token for invoice A therefore can never reach an upstream call made on
//! behalf of invoice B's URL.

use crate::domain::{
    AccessToken, InvoiceId, InvoiceSnapshot, PortalError, TokenValidation, ValidatedInvoice,
};

/// Why the gate refused a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessRejection {
    InvalidToken {
        reason: Option<String>,
    },
    InvoiceMismatch {
        requested: InvoiceId,
        bound: InvoiceId,
    },
}

impl From<AccessRejection> for PortalError {
    fn from(rejection: AccessRejection) -> Self {
        match rejection {
            AccessRejection::InvalidToken { reason } => PortalError::InvalidToken { reason },
            AccessRejection::InvoiceMismatch { .. } => PortalError::InvoiceMismatch,
        }
    }
}

/// Proof that a token is valid and bound to the invoice in the request path.
#[derive(Debug, Clone)]
pub struct AuthorizedAccess {
    token: AccessToken,
    invoice: ValidatedInvoice,
}

impl AuthorizedAccess {
    /// The original token, unchanged, for forwarding upstream.
    pub fn token(&self) -> &AccessToken {
        &self.token
    }

    pub fn invoice_id(&self) -> InvoiceId {
        self.invoice.invoice_id
    }

    pub fn invoice(&self) -> &ValidatedInvoice {
        &self.invoice
    }

    pub fn snapshot(&self) -> &InvoiceSnapshot {
        &self.invoice.snapshot
    }
}

/// Check a validation result against the invoice id in the request path.
pub fn authorize(
    path_invoice_id: InvoiceId,
    token: AccessToken,
    validation: TokenValidation,
) -> Result<AuthorizedAccess, AccessRejection> {
    let invoice = match validation {
        TokenValidation::Valid(invoice) => invoice,
        TokenValidation::Invalid { reason } => {
            return Err(AccessRejection::InvalidToken { reason });
        }
    };

    if invoice.invoice_id != path_invoice_id {
        return Err(AccessRejection::InvoiceMismatch {
            requested: path_invoice_id,
            bound: invoice.invoice_id,
        });
    }

    Ok(AuthorizedAccess { token, invoice })
}
