//! Client-side encryption decorator.
//!
//! Bodies are sealed with AES-GCM before they reach the wrapped store and
//! opened after they come back, so the backend only ever sees ciphertext.
//! Stored layout:
//!
//! ```text
//! [nonce: 12 bytes][ciphertext][tag: 16 bytes]
//! ```
//!
//! Every object written through the decorator carries the metadata entry
//! `cipher-mode=GCM`; Get refuses objects without it. Keys, sizes and the
//! remaining metadata are visible to the backend.

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use objstore_common::{normalize_metadata, Error, Metadata, Result};
use objstore_crypto::{open, seal, CipherKey};

use crate::context::Context;
use crate::provider::{DeleteFailure, Listing, ObjectHead, ObjectSink, ObjectStore};

/// Metadata entry naming the cipher used for the body.
pub const CIPHER_MODE_KEY: &str = "cipher-mode";

/// Marker value for AES-GCM sealed bodies.
pub const CIPHER_MODE_GCM: &str = "GCM";

/// Object store that encrypts bodies before delegating to another store.
pub struct EncryptedStore {
    inner: Arc<dyn ObjectStore>,
    key: CipherKey,
}

impl EncryptedStore {
    /// Wrap `inner`, sealing bodies under `key`.
    pub fn new(inner: Arc<dyn ObjectStore>, key: CipherKey) -> Self {
        Self { inner, key }
    }

    /// The wrapped store.
    pub fn inner(&self) -> &Arc<dyn ObjectStore> {
        &self.inner
    }
}

#[async_trait]
impl ObjectStore for EncryptedStore {
    fn name(&self) -> &str {
        "encrypted"
    }

    /// Fetch, authenticate and decrypt an object.
    ///
    /// # Postconditions
    /// - On success `dst` holds the plaintext and the returned metadata
    ///   no longer carries `cipher-mode`
    /// - On any failure nothing has been written to `dst`
    ///
    /// # Errors
    /// - `ObjectNotFound` if the inner store has no such key
    /// - `Crypto` if the marker is missing or wrong, or authentication fails
    async fn get_object(
        &self,
        ctx: &Context,
        key: &str,
        dst: &mut ObjectSink<'_>,
    ) -> Result<Metadata> {
        let mut envelope = Vec::new();
        let mut metadata = self.inner.get_object(ctx, key, &mut envelope).await?;

        match metadata.remove(CIPHER_MODE_KEY).as_deref() {
            Some(CIPHER_MODE_GCM) => {}
            Some(other) => {
                return Err(Error::Crypto(format!(
                    "{}: unsupported cipher mode '{}'",
                    key, other
                )));
            }
            None => {
                return Err(Error::Crypto(format!(
                    "{}: object is not marked as encrypted",
                    key
                )));
            }
        }

        let plaintext = open(&self.key, &envelope)
            .inspect_err(|_| warn!(key, "failed to open encrypted object"))?;

        ctx.run(async {
            dst.write_all(&plaintext).await?;
            dst.flush().await
        })
        .await??;

        Ok(metadata)
    }

    async fn head_object(&self, ctx: &Context, key: &str) -> Result<ObjectHead> {
        self.inner.head_object(ctx, key).await
    }

    async fn list_objects(&self, ctx: &Context, prefix: &str, delimiter: &str) -> Result<Listing> {
        self.inner.list_objects(ctx, prefix, delimiter).await
    }

    /// Seal `body` under a fresh nonce and store it through the inner store.
    async fn put_object(
        &self,
        ctx: &Context,
        key: &str,
        metadata: &Metadata,
        body: Bytes,
    ) -> Result<()> {
        ctx.check()?;

        let mut metadata = normalize_metadata(metadata);
        metadata.insert(CIPHER_MODE_KEY.to_string(), CIPHER_MODE_GCM.to_string());

        let envelope = seal(&self.key, &body)?;
        debug!(key, plaintext = body.len(), stored = envelope.len(), "sealed object");

        self.inner
            .put_object(ctx, key, &metadata, Bytes::from(envelope))
            .await
    }

    async fn delete_objects(&self, ctx: &Context, keys: &[String]) -> Result<Vec<DeleteFailure>> {
        self.inner.delete_objects(ctx, keys).await
    }
}
