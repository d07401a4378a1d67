//! Store registry for resolving backends by name and configuration.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use objstore_common::{Error, Result};
use objstore_crypto::CipherKey;

use crate::encrypted::EncryptedStore;
use crate::memory::MemoryStore;
use crate::provider::ObjectStore;
use crate::s3::{S3Config, S3Store};

/// Factory function type for creating stores.
pub type StoreFactory = Box<dyn Fn(Value) -> Result<Arc<dyn ObjectStore>> + Send + Sync>;

/// Configuration field holding a base64 AES key; when present the store is
/// wrapped in an [`EncryptedStore`].
pub const ENCRYPTION_KEY_FIELD: &str = "encryption_key";

/// Registry for object store factories.
///
/// Allows dynamic registration and resolution of stores
/// by name and configuration.
pub struct StoreRegistry {
    factories: HashMap<String, StoreFactory>,
}

impl StoreRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register a store factory.
    ///
    /// # Preconditions
    /// - `name` must be unique within the registry
    ///
    /// # Postconditions
    /// - Factory is registered and can be resolved by name
    ///
    /// # Errors
    /// - `AlreadyExists` if the name is already registered
    pub fn register(&mut self, name: impl Into<String>, factory: StoreFactory) -> Result<()> {
        let name = name.into();
        if self.factories.contains_key(&name) {
            return Err(Error::AlreadyExists(format!(
                "Store '{}' is already registered",
                name
            )));
        }
        self.factories.insert(name, factory);
        Ok(())
    }

    /// Resolve a store by name and configuration.
    ///
    /// # Errors
    /// - `NotFound` if no factory is registered under `name`
    /// - Whatever the factory reports for an invalid configuration
    pub fn resolve(&self, name: &str, config: Value) -> Result<Arc<dyn ObjectStore>> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| Error::NotFound(format!("Store '{}' is not registered", name)))?;
        factory(config)
    }

    /// Registered store names, sorted.
    pub fn stores(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    /// Check if a store is registered.
    pub fn has_store(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }
}

impl Default for StoreRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Wrap `store` in an [`EncryptedStore`] if `config` carries an encryption key.
fn with_optional_encryption(
    store: Arc<dyn ObjectStore>,
    config: &Value,
) -> Result<Arc<dyn ObjectStore>> {
    match config.get(ENCRYPTION_KEY_FIELD) {
        None | Some(Value::Null) => Ok(store),
        Some(Value::String(encoded)) => {
            let key = CipherKey::from_base64(encoded)?;
            Ok(Arc::new(EncryptedStore::new(store, key)))
        }
        Some(_) => Err(Error::InvalidInput(format!(
            "'{}' must be a base64 string",
            ENCRYPTION_KEY_FIELD
        ))),
    }
}

/// Create a registry with the built-in stores.
///
/// - `memory`: no configuration
/// - `s3`: an [`S3Config`] object
///
/// Both accept an optional `encryption_key`.
///
/// # Errors
/// - `AlreadyExists` if a built-in name is registered twice
pub fn create_default_registry() -> Result<StoreRegistry> {
    let mut registry = StoreRegistry::new();

    registry.register(
        "memory",
        Box::new(|config| with_optional_encryption(Arc::new(MemoryStore::new()), &config)),
    )?;

    registry.register(
        "s3",
        Box::new(|config| {
            let s3_config: S3Config = serde_json::from_value(config.clone())
                .map_err(|e| Error::InvalidInput(format!("Invalid s3 configuration: {}", e)))?;
            with_optional_encryption(Arc::new(S3Store::from_config(&s3_config)?), &config)
        }),
    )?;

    Ok(registry)
}
