//! Ports (hexagonal boundaries) of the invoice portal.

pub mod outbound;

pub use outbound::{
    AuthorityError, ByteStream, DocumentStorage, InvoiceAuthority, ServedRange, StorageError,
    StoredDocument,
};
