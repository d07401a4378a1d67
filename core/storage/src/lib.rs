//! Object storage abstraction.
//!
//! This crate provides one contract, [`ObjectStore`], for flat key/value blob
//! storage with per-object string metadata, and three implementations:
//!
//! - [`MemoryStore`]: in-process map, the behavioral reference
//! - [`S3Store`]: client for S3-compatible HTTP endpoints
//! - [`EncryptedStore`]: AES-GCM decorator over any other store
//!
//! # Design Principles
//! - Backend isolation: callers hold `Arc<dyn ObjectStore>` and never branch on the backend
//! - Async operations: all I/O is async and honors a caller [`Context`]
//! - Whole-object bodies: puts take a buffered body, gets write to a caller sink
//! - Unified error semantics: absence is always `Error::ObjectNotFound`

pub mod context;
pub mod encrypted;
pub mod memory;
pub mod provider;
pub mod registry;
pub mod s3;


pub use context::Context;
pub use encrypted::{EncryptedStore, CIPHER_MODE_GCM, CIPHER_MODE_KEY};
pub use memory::MemoryStore;
pub use provider::{
    DeleteFailure, Listing, ObjectHead, ObjectSink, ObjectStore, ObjectSummary, MAX_DELETE_KEYS,
};
pub use registry::{create_default_registry, StoreFactory, StoreRegistry, ENCRYPTION_KEY_FIELD};
pub use s3::{HttpTransport, S3Config, S3Store};

pub use objstore_common::{Error, Metadata, Result};
