//! Object store trait definition.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::BTreeSet;
use tokio::io::AsyncWrite;

use objstore_common::{validate_key, Error, Metadata, Result};

use crate::context::Context;

/// Largest batch `delete_objects` accepts in one call.
///
/// Larger batches are rejected outright; chunking is the caller's job.
pub const MAX_DELETE_KEYS: usize = 999;

/// Sink that object bodies are streamed into.
pub type ObjectSink<'a> = dyn AsyncWrite + Send + Unpin + 'a;

/// Result of a head request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectHead {
    /// Stored body size in bytes.
    pub size: u64,
    /// Stored metadata; empty when none was written.
    pub metadata: Metadata,
}

/// One object in a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectSummary {
    /// Object key.
    pub key: String,
    /// Stored body size in bytes.
    pub size: u64,
}

/// A complete listing of a bucket under a prefix.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Listing {
    /// Objects whose key has no delimiter after the prefix, ascending by key.
    pub objects: Vec<ObjectSummary>,
    /// Folded common prefixes, each ending in the delimiter, ascending.
    pub common_prefixes: Vec<String>,
}

impl Listing {
    /// Build a listing from unordered parts.
    ///
    /// Objects are stable-sorted by key byte order and common prefixes are
    /// deduplicated and sorted.
    pub fn from_parts(mut objects: Vec<ObjectSummary>, common_prefixes: Vec<String>) -> Self {
        objects.sort_by(|a, b| a.key.as_bytes().cmp(b.key.as_bytes()));
        let common_prefixes = common_prefixes
            .into_iter()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        Self {
            objects,
            common_prefixes,
        }
    }

    /// Keys of the listed objects, in listing order.
    pub fn keys(&self) -> Vec<&str> {
        self.objects.iter().map(|o| o.key.as_str()).collect()
    }

    /// Sizes of the listed objects, aligned with [`Listing::keys`].
    pub fn sizes(&self) -> Vec<u64> {
        self.objects.iter().map(|o| o.size).collect()
    }

    /// Whether the listing holds neither objects nor common prefixes.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty() && self.common_prefixes.is_empty()
    }
}

/// A key that a batch delete could not remove.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteFailure {
    /// The key that was not deleted.
    pub key: String,
    /// Backend error code (e.g. `AccessDenied`).
    pub code: String,
    /// Human-readable backend message, possibly empty.
    pub message: String,
}

/// Where a key lands in a delimited listing.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Placement {
    /// Key does not start with the prefix.
    Excluded,
    /// Key is listed individually.
    Object,
    /// Key folds into this common prefix.
    CommonPrefix(String),
}

/// Classify `key` against a listing `prefix` and `delimiter`.
///
/// A key whose remainder after the prefix contains the delimiter folds into
/// the prefix extended through the first delimiter occurrence.
pub(crate) fn place_key(key: &str, prefix: &str, delimiter: &str) -> Placement {
    let Some(rest) = key.strip_prefix(prefix) else {
        return Placement::Excluded;
    };
    if delimiter.is_empty() {
        return Placement::Object;
    }
    match rest.find(delimiter) {
        Some(at) => Placement::CommonPrefix(key[..prefix.len() + at + delimiter.len()].to_string()),
        None => Placement::Object,
    }
}

/// Validate a batch delete request before any side effect.
pub(crate) fn check_delete_batch(keys: &[String]) -> Result<()> {
    if keys.len() > MAX_DELETE_KEYS {
        return Err(Error::InvalidInput(format!(
            "Cannot delete {} keys in one call, the limit is {}",
            keys.len(),
            MAX_DELETE_KEYS
        )));
    }
    for key in keys {
        validate_key(key)?;
    }
    Ok(())
}

/// Object store trait implemented by every backend.
///
/// All operations take a [`Context`] and fail fast with its error if it is
/// already cancelled or expired.
///
/// Contract rules shared by every implementation:
/// - Absence is reported as `Error::ObjectNotFound`.
/// - Metadata keys are returned lowercased; missing metadata is an empty map.
/// - Deleting an absent key succeeds and is never reported as a failure.
/// - Common prefixes include the trailing delimiter.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Get the provider name (e.g., "memory", "s3", "encrypted").
    fn name(&self) -> &str;

    /// Stream an object's body into `dst` and return its metadata.
    ///
    /// # Postconditions
    /// - On success the full body has been written to `dst`
    ///
    /// # Errors
    /// - `ObjectNotFound` if the key is absent
    /// - Integrity or decryption errors, which supersede a clean transfer
    async fn get_object(&self, ctx: &Context, key: &str, dst: &mut ObjectSink<'_>)
        -> Result<Metadata>;

    /// Get an object's size and metadata without transferring its body.
    ///
    /// # Errors
    /// - `ObjectNotFound` if the key is absent
    async fn head_object(&self, ctx: &Context, key: &str) -> Result<ObjectHead>;

    /// List every object under `prefix`, folding keys at `delimiter`.
    ///
    /// An empty prefix matches every key; an empty delimiter disables
    /// folding. Pagination, if the backend needs it, happens internally and
    /// the complete listing is returned.
    async fn list_objects(&self, ctx: &Context, prefix: &str, delimiter: &str) -> Result<Listing>;

    /// Store an object, replacing any existing body and metadata at `key`.
    async fn put_object(
        &self,
        ctx: &Context,
        key: &str,
        metadata: &Metadata,
        body: Bytes,
    ) -> Result<()>;

    /// Delete up to [`MAX_DELETE_KEYS`] objects.
    ///
    /// Returns the keys the backend reported as not deleted. Every other
    /// requested key is gone when this returns `Ok`.
    ///
    /// # Errors
    /// - `InvalidInput` for more than `MAX_DELETE_KEYS` keys, before any side effect
    /// - Whole-request failures; per-key failures are returned as data
    async fn delete_objects(&self, ctx: &Context, keys: &[String]) -> Result<Vec<DeleteFailure>>;
}
