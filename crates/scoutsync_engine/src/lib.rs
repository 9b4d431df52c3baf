//! # scoutsync engine
//!
//! Reconciles directory groups against the desired state built from the
//! registry.
//!
//! This crate provides:
//! - The `DirectoryApi` abstraction over the remote directory
//! - Paginated directory readers
//! - The reconciliation engine (delete stale → info → aliases → members)
//! - A creation-lag retry with configurable delay and attempt count
//! - `MemoryDirectory`, an in-memory directory that records every call
//! - `HttpDirectory`, the Admin Directory v1 client over `HttpClient`
//!
//! ## Key Invariants
//!
//! - The registry always wins; only groups carrying the managed tag are ever
//!   deleted
//! - Every step diffs desired state against freshly read remote state, so a
//!   run is idempotent and a partial run converges on the next one
//! - Write failures are isolated per entity; read failures abort the run
//! - Dry-run performs every read and computes every delta but writes nothing

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod directory;
mod error;
mod http;
mod memory;
mod reconcile;

pub use config::{CreationRetry, ReconcileConfig, DEFAULT_PAGE_SIZE};
pub use directory::{managed_filter, DirectoryApi, DirectoryReader, GroupRecord, Lookup};
pub use error::{EngineError, EngineResult};
pub use http::{HttpDirectory, StaticToken, TokenSource, DIRECTORY_API_BASE};
pub use memory::{DirectoryCall, MemoryDirectory};
pub use reconcile::{FailedOperation, Operation, ReconcileReport, Reconciler};
