//! Authenticated encryption using AES-GCM.
//!
//! Sealed envelopes are laid out as `nonce || ciphertext || tag`. The nonce
//! is 96 bits and drawn fresh from the OS RNG for every seal.

use aes_gcm::{
    aead::{generic_array::GenericArray, Aead, AeadCore, KeyInit, OsRng},
    Aes128Gcm, Aes256Gcm, Nonce,
};

use crate::keys::{CipherKey, KeySize};
use objstore_common::{Error, Result};

/// Nonce size for AES-GCM (12 bytes).
pub const NONCE_SIZE: usize = 12;

/// Authentication tag size (16 bytes).
pub const TAG_SIZE: usize = 16;

/// Bytes a sealed envelope adds to its plaintext.
pub const OVERHEAD: usize = NONCE_SIZE + TAG_SIZE;

/// Seal plaintext under AES-GCM with a random nonce and no associated data.
///
/// # Postconditions
/// - Returns nonce || ciphertext || tag
/// - The envelope length is plaintext length + OVERHEAD
///
/// # Errors
/// - Returns error if encryption fails
pub fn seal(key: &CipherKey, plaintext: &[u8]) -> Result<Vec<u8>> {
    let mut nonce = [0u8; NONCE_SIZE];
    nonce.copy_from_slice(&Aes256Gcm::generate_nonce(&mut OsRng));

    let ciphertext = seal_with_nonce(key, &nonce, plaintext)?;

    let mut result = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    result.extend_from_slice(&nonce);
    result.extend_from_slice(&ciphertext);

    Ok(result)
}

/// Open an envelope produced by [`seal`].
///
/// # Preconditions
/// - `envelope` must be at least NONCE_SIZE + TAG_SIZE bytes
///
/// # Errors
/// - Returns error if the envelope is too short
/// - Returns error if authentication fails (tampered data or wrong key)
pub fn open(key: &CipherKey, envelope: &[u8]) -> Result<Vec<u8>> {
    if envelope.len() < OVERHEAD {
        return Err(Error::Crypto(format!(
            "Ciphertext too short: {} bytes, need at least {}",
            envelope.len(),
            OVERHEAD
        )));
    }

    let (nonce, sealed) = envelope.split_at(NONCE_SIZE);
    let nonce = Nonce::from_slice(nonce);

    let opened = match key.size() {
        KeySize::Aes128 => {
            Aes128Gcm::new(GenericArray::from_slice(key.as_bytes())).decrypt(nonce, sealed)
        }
        KeySize::Aes256 => {
            Aes256Gcm::new(GenericArray::from_slice(key.as_bytes())).decrypt(nonce, sealed)
        }
    };

    opened.map_err(|e| Error::Crypto(format!("Decryption failed: {}", e)))
}

/// Seal plaintext with a caller-chosen nonce, returning ciphertext || tag.
///
/// # Warning
/// Reusing a nonce under the same key breaks both confidentiality and
/// authenticity. Only [`seal`] should be used for stored objects.
pub fn seal_with_nonce(
    key: &CipherKey,
    nonce: &[u8; NONCE_SIZE],
    plaintext: &[u8],
) -> Result<Vec<u8>> {
    let nonce = Nonce::from_slice(nonce);

    let sealed = match key.size() {
        KeySize::Aes128 => {
            Aes128Gcm::new(GenericArray::from_slice(key.as_bytes())).encrypt(nonce, plaintext)
        }
        KeySize::Aes256 => {
            Aes256Gcm::new(GenericArray::from_slice(key.as_bytes())).encrypt(nonce, plaintext)
        }
    };

    sealed.map_err(|e| Error::Crypto(format!("Encryption failed: {}", e)))
}
