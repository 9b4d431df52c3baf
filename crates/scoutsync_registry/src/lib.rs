//! # scoutsync registry
//!
//! Readers for the Scoutnet registry API.
//!
//! This crate provides:
//! - `RegistryClient`, fetching custom mailing lists and the member list
//! - Wire parsing for the registry's `{field: {value}}` record shape
//!
//! Every fetch is an explicit one-shot call; results are owned by the
//! caller and nothing is cached.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod client;
mod error;
mod wire;

pub use client::{RegistryClient, RegistryConfig, DEFAULT_REGISTRY_ENDPOINT};
pub use error::{RegistryError, RegistryResult};
