//! Domain types for the invoice portal.
//!
//! Configuration, the error taxonomy, validated access types and the wire
//! records of the upstream authorities. No I/O lives here.

pub mod config;
pub mod correlation;
pub mod error;
pub mod range;
pub mod records;
pub mod types;

// Re-exports for convenience
pub use config::{ConfigError, GatewayConfig};
pub use correlation::CorrelationId;
pub use error::{GatewayError, PortalError, PortalResult, UpstreamOperation};
pub use range::{ByteRange, ContentRange, ResolvedRange, Unsatisfiable};
pub use records::{EnsurePdfRecord, SignatureRecord, ValidationRecord};
pub use types::*;
