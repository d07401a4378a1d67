//! S3-compatible backend.
//!
//! [`S3Store`] speaks the S3 REST API (ListObjectsV2, GetObject, HeadObject,
//! PutObject, DeleteObject, DeleteObjects) against one bucket through an
//! [`HttpTransport`]. Request signing is the transport's concern.

mod client;
mod config;
mod transport;
mod xml;

#[cfg(test)]
pub(crate) mod fake;

pub use client::{S3Store, META_PREFIX};
pub use config::{S3Config, DEFAULT_USER_AGENT};
pub use transport::HttpTransport;
