//! In-memory object store, the reference implementation of the contract.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{BTreeSet, HashMap};
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::debug;

use objstore_common::{normalize_metadata, validate_key, Error, Metadata, Result};

use crate::context::Context;
use crate::provider::{
    check_delete_batch, place_key, DeleteFailure, Listing, ObjectHead, ObjectSink, ObjectStore,
    ObjectSummary, Placement,
};

/// A stored object.
#[derive(Debug, Clone)]
struct StoredObject {
    body: Bytes,
    metadata: Metadata,
}

/// In-memory object store.
///
/// Useful for testing and as the behavioral reference for other backends.
/// Each instance owns its own map; all data is lost on drop.
pub struct MemoryStore {
    objects: RwLock<HashMap<String, StoredObject>>,
}

impl MemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
        }
    }

    /// Number of stored objects.
    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    /// Whether the store holds no objects.
    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get_object(
        &self,
        ctx: &Context,
        key: &str,
        dst: &mut ObjectSink<'_>,
    ) -> Result<Metadata> {
        validate_key(key)?;
        let object = {
            let objects = ctx.run(self.objects.read()).await?;
            objects
                .get(key)
                .cloned()
                .ok_or_else(|| Error::ObjectNotFound(key.to_string()))?
        };

        ctx.run(async {
            dst.write_all(&object.body).await?;
            dst.flush().await
        })
        .await??;

        Ok(object.metadata)
    }

    async fn head_object(&self, ctx: &Context, key: &str) -> Result<ObjectHead> {
        validate_key(key)?;
        let objects = ctx.run(self.objects.read()).await?;

        match objects.get(key) {
            Some(object) => Ok(ObjectHead {
                size: object.body.len() as u64,
                metadata: object.metadata.clone(),
            }),
            None => Err(Error::ObjectNotFound(key.to_string())),
        }
    }

    async fn list_objects(&self, ctx: &Context, prefix: &str, delimiter: &str) -> Result<Listing> {
        let objects = ctx.run(self.objects.read()).await?;

        let mut listed = Vec::new();
        let mut common_prefixes = BTreeSet::new();

        for (key, object) in objects.iter() {
            match place_key(key, prefix, delimiter) {
                Placement::Excluded => {}
                Placement::Object => listed.push(ObjectSummary {
                    key: key.clone(),
                    size: object.body.len() as u64,
                }),
                Placement::CommonPrefix(common) => {
                    common_prefixes.insert(common);
                }
            }
        }

        Ok(Listing::from_parts(
            listed,
            common_prefixes.into_iter().collect(),
        ))
    }

    async fn put_object(
        &self,
        ctx: &Context,
        key: &str,
        metadata: &Metadata,
        body: Bytes,
    ) -> Result<()> {
        validate_key(key)?;
        let object = StoredObject {
            body,
            metadata: normalize_metadata(metadata),
        };

        let mut objects = ctx.run(self.objects.write()).await?;
        debug!(key, size = object.body.len(), "memory put");
        objects.insert(key.to_string(), object);
        Ok(())
    }

    async fn delete_objects(&self, ctx: &Context, keys: &[String]) -> Result<Vec<DeleteFailure>> {
        check_delete_batch(keys)?;
        if keys.is_empty() {
            ctx.check()?;
            return Ok(Vec::new());
        }

        let mut objects = ctx.run(self.objects.write()).await?;
        for key in keys {
            objects.remove(key);
        }
        debug!(count = keys.len(), "memory delete");
        Ok(Vec::new())
    }
}
