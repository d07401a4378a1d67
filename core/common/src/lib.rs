//! Common types shared across the objstore crates.
//!
//! This module provides the error type every backend reports through and the
//! small value types (object keys, metadata maps) that make up the storage
//! contract's vocabulary.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{normalize_metadata, validate_key, Metadata};
