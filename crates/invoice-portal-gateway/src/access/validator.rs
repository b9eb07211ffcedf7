//! Token validation against the invoice authority.

use crate::domain::{
    AccessToken, InvoiceId, InvoiceSnapshot, TokenValidation, ValidatedInvoice, ValidationRecord,
};
use crate::ports::{AuthorityError, InvoiceAuthority};
use std::sync::Arc;
use tracing::{debug, warn};

/// The authority could not give an answer. The request must be rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidatorError {
    #[error("token authority unavailable: {0}")]
    Unavailable(AuthorityError),
}

/// Resolves what a token authorizes. Results are never cached: tokens can be
/// revoked and invoice state can change between requests.
#[derive(Clone)]
pub struct TokenValidator {
    authority: Arc<dyn InvoiceAuthority>,
}

impl TokenValidator {
    pub fn new(authority: Arc<dyn InvoiceAuthority>) -> Self {
        Self { authority }
    }

    pub async fn validate(&self, token: &AccessToken) -> Result<TokenValidation, ValidatorError> {
        match self.authority.validate_token(token).await {
            Ok(record) => Ok(interpret(record)),
            Err(AuthorityError::Malformed(detail)) => {
                warn!(detail = %detail, "Malformed validation response, treating token as invalid");
                Ok(TokenValidation::invalid())
            }
            Err(e) => {
                warn!(error = %e, "Token validation failed upstream");
                Err(ValidatorError::Unavailable(e))
            }
        }
    }
}

/// Turn the authority's record into a validation result, failing closed on
/// anything inconsistent.
pub fn interpret(record: ValidationRecord) -> TokenValidation {
    if !record.is_valid {
        return TokenValidation::Invalid {
            reason: record.error,
        };
    }

    let Some(invoice_id) = record
        .invoice_id
        .as_deref()
        .and_then(|raw| raw.parse::<InvoiceId>().ok())
    else {
        debug!("Valid token without a usable invoice id");
        return TokenValidation::invalid();
    };

    TokenValidation::Valid(ValidatedInvoice {
        invoice_id,
        snapshot: InvoiceSnapshot {
            invoice_number: record.invoice_number.unwrap_or_default(),
            invoice_date: record.invoice_date,
            invoice_due_date: record.invoice_due_date,
            pdf_storage_key: record.pdf_storage_key.filter(|k| !k.trim().is_empty()),
            signature_path: record.signature_path,
            viewed: record.viewed,
        },
    })
}
