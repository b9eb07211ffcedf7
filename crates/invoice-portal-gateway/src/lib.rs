//! Invoice Portal Gateway - token-gated public access to invoices.
//!
//! Customers holding an access link (`invoice id` + opaque token) can read
//! invoice metadata, download the PDF, mark the invoice as viewed and attach
//! a signature. The gateway owns no invoice data: every request is validated
//! against the token/invoice authority and documents are streamed from the
//! storage authority.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                     INVOICE PORTAL GATEWAY                        │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  CORS → Tracing → ClientContext → RateLimit → BodyLimit → Timeout │
//! │                              │                                    │
//! │                      router (axum handlers)                       │
//! │                              │                                    │
//! │                        PortalService                              │
//! │      TokenValidator → gate::authorize → AuthorizedAccess          │
//! │            │                │                  │                  │
//! │   FreshnessResolver   DocumentStreamer     ActionRelay            │
//! └────────────┼────────────────┼──────────────────┼─────────────────┘
//!              ▼                ▼                  ▼
//!       Invoice authority   Document storage   Invoice authority
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use invoice_portal_gateway::{GatewayConfig, GatewayService};
//!
//! let config = GatewayConfig::from_file("portal.toml")?;
//! GatewayService::new(config)?.run().await?;
//! ```

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod access;
pub mod adapters;
pub mod domain;
pub mod middleware;
pub mod portal;
pub mod ports;
pub mod router;
pub mod service;
pub mod telemetry;

#[cfg(test)]
mod testing;

// Re-exports for public API
pub use domain::config::GatewayConfig;
pub use domain::error::{GatewayError, PortalError, PortalResult};
pub use domain::types::*;
pub use middleware::GatewayMetrics;
pub use portal::{PortalService, RequestContext};
pub use router::{build_router, AppState};
pub use service::GatewayService;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
