//! S3 store configuration.

use serde::{Deserialize, Serialize};

/// Default `User-Agent` sent by clients built from configuration.
pub const DEFAULT_USER_AGENT: &str = concat!("objstore/", env!("CARGO_PKG_VERSION"));

/// Configuration for an S3-compatible store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Config {
    /// Root URL of the bucket, e.g. `http://localhost:4566/smoke/`.
    pub bucket_url: String,
    /// Page size requested from list calls (`max-keys`); server default if unset.
    #[serde(default)]
    pub page_size: Option<u32>,
    /// Custom `User-Agent` header.
    #[serde(default)]
    pub user_agent: Option<String>,
}

impl S3Config {
    /// Create a configuration for the given bucket root.
    pub fn new(bucket_url: impl Into<String>) -> Self {
        Self {
            bucket_url: bucket_url.into(),
            page_size: None,
            user_agent: None,
        }
    }

    /// Set the list page size.
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    /// The user agent to send.
    pub fn user_agent(&self) -> &str {
        self.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT)
    }
}
