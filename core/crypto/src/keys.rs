//! Cipher key type with secure memory handling.
//!
//! Keys zeroize their memory on drop so key material does not linger after
//! the owning store is gone.

use aes_gcm::aead::{KeyInit, OsRng};
use aes_gcm::{Aes128Gcm, Aes256Gcm};
use base64::Engine;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

use objstore_common::{Error, Result};

/// Supported AES key sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySize {
    /// AES-128 (16-byte key).
    Aes128,
    /// AES-256 (32-byte key).
    Aes256,
}

impl KeySize {
    /// Key length in bytes.
    pub fn key_len(self) -> usize {
        match self {
            KeySize::Aes128 => 16,
            KeySize::Aes256 => 32,
        }
    }

    fn from_len(len: usize) -> Option<Self> {
        match len {
            16 => Some(KeySize::Aes128),
            32 => Some(KeySize::Aes256),
            _ => None,
        }
    }
}

/// Block cipher key for AES-GCM.
///
/// The key size selects the cipher: a 16-byte key uses AES-128-GCM and a
/// 32-byte key uses AES-256-GCM.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct CipherKey {
    key: Vec<u8>,
}

impl CipherKey {
    /// Create a key from raw bytes.
    ///
    /// # Errors
    /// - Returns error unless `key` is 16 or 32 bytes long
    pub fn from_bytes(key: &[u8]) -> Result<Self> {
        if KeySize::from_len(key.len()).is_none() {
            return Err(Error::Crypto(format!(
                "Invalid key length: expected 16 or 32, got {}",
                key.len()
            )));
        }
        Ok(Self { key: key.to_vec() })
    }

    /// Create a key from its standard base64 encoding.
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let mut raw = base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| Error::InvalidInput(format!("Invalid base64 key: {}", e)))?;
        let key = Self::from_bytes(&raw);
        raw.zeroize();
        key
    }

    /// Generate a random key of the given size.
    pub fn generate(size: KeySize) -> Self {
        let key = match size {
            KeySize::Aes128 => Aes128Gcm::generate_key(&mut OsRng).to_vec(),
            KeySize::Aes256 => Aes256Gcm::generate_key(&mut OsRng).to_vec(),
        };
        Self { key }
    }

    /// The AES variant this key selects.
    pub fn size(&self) -> KeySize {
        match self.key.len() {
            16 => KeySize::Aes128,
            _ => KeySize::Aes256,
        }
    }

    /// Get the key bytes.
    ///
    /// # Security
    /// The returned slice should be used immediately and not stored.
    pub fn as_bytes(&self) -> &[u8] {
        &self.key
    }
}

impl fmt::Debug for CipherKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CipherKey({:?}, [REDACTED])", self.size())
    }
}
