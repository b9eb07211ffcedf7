//! Adapters for the invoice portal.
//!
//! reqwest implementations of the outbound ports, and the HTTP rendering of
//! portal errors.

pub mod authority_client;
pub mod error_conversions;
pub mod storage_client;

pub use authority_client::HttpInvoiceAuthority;
pub use storage_client::HttpDocumentStorage;
