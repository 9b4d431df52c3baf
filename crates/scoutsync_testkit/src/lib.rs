//! # scoutsync testkit
//!
//! Test utilities for scoutsync.
//!
//! This crate provides:
//! - A canned `HttpClient` that routes requests to fixed responses
//! - Registry API payloads shaped like the real service
//! - Group and config-file helpers
//! - Property-based generators for desired and observed group sets
//!
//! ## Usage
//!
//! ```rust,ignore
//! use scoutsync_testkit::prelude::*;
//!
//! let client = CannedHttpClient::new()
//!     .route_json(customlists_url(), customlists_payload())
//!     .route_json(list_url(11), ledare_members_payload());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;
