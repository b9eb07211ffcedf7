//! Access pipeline: validate the token, gate it against the requested
//! invoice, then resolve, stream or relay on the authorized invoice's behalf.

pub mod freshness;
pub mod gate;
pub mod relay;
pub mod streamer;
pub mod validator;

pub use freshness::FreshnessResolver;
pub use gate::{authorize, AccessRejection, AuthorizedAccess};
pub use relay::ActionRelay;
pub use streamer::{DocumentStream, DocumentStreamer, StreamError, PDF_CONTENT_TYPE};
pub use validator::{TokenValidator, ValidatorError};
