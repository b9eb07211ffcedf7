//! # Invoice Portal Test Suite
//!
//! ```text
//! tests/src/
//! └── integration/      # Full gateway against mocked upstream authorities
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p portal-tests
//! cargo test -p portal-tests integration::
//! ```

pub mod integration;
