//! Cryptographic primitives for client-side object encryption.
//!
//! This module provides:
//! - Authenticated encryption using AES-GCM (128- or 256-bit keys)
//! - A self-describing envelope: `nonce || ciphertext || tag`
//! - Key handling with automatic zeroization
//!
//! # Security Guarantees
//! - All key material is automatically zeroized on drop
//! - No plaintext or key material is ever logged
//! - Opening verifies the authentication tag before returning any plaintext

pub mod aead;
pub mod keys;

pub use aead::{open, seal, NONCE_SIZE, OVERHEAD, TAG_SIZE};
pub use keys::{CipherKey, KeySize};
