//! # scoutsync core
//!
//! Data model and pure transformations shared by the scoutsync crates.
//!
//! This crate provides:
//! - Registry and directory entity types (`MailingList`, `DirectoryGroup`,
//!   `RegistryUser`, `DirectoryUser`)
//! - Address normalization, `+tag` stripping and ordered rewrite rules
//! - The desired-state builder turning mailing lists into directory groups
//! - Roster classification (adults/youths) and discrepancy reporting
//! - Page collection for token-paginated APIs
//! - The `HttpClient` abstraction used by the remote readers
//!
//! This is a pure crate with no I/O operations of its own.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod address;
mod builder;
mod error;
pub mod http;
mod model;
mod page;
pub mod roster;

pub use address::RewriteRule;
pub use builder::{GroupBuilder, GroupBuilderConfig, DEFAULT_MANAGED_TAG};
pub use error::{CoreError, CoreResult};
pub use http::{Auth, Body, HttpClient, HttpError, HttpRequest, HttpResponse, Method};
pub use model::{DirectoryGroup, DirectoryUser, MailingList, RegistryUser};
pub use page::{collect_pages, Page};
pub use roster::{DiscrepancyReport, Population, RosterConfig};
