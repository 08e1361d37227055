//! Symmetric encryption for stored fields and the config file.
//!
//! # Algorithms
//!
//! - **Encryption**: ChaCha20-Poly1305 (authenticated encryption)
//! - **Nonces**: 12 random bytes from the OS CSPRNG, one per encryption
//!
//! # Wire format
//!
//! A sealed value is `nonce || ciphertext || tag`. Text fields store it
//! base64-encoded (standard alphabet, padded).

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chacha20poly1305::{aead::Aead, ChaCha20Poly1305, Key, KeyInit, Nonce};
use rand::rngs::OsRng;
use rand::RngCore;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::types::{CafeError, Result};

// =============================================================================
// Constants
// =============================================================================

/// Key length for ChaCha20-Poly1305 (32 bytes)
pub const KEY_LEN: usize = 32;

/// Nonce length for ChaCha20-Poly1305 (12 bytes)
pub const NONCE_LEN: usize = 12;

/// ChaCha20-Poly1305 auth tag length (16 bytes)
pub const AUTH_TAG_LEN: usize = 16;

// =============================================================================
// Keys
// =============================================================================

/// A 256-bit symmetric key, wiped from memory on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct FieldKey([u8; KEY_LEN]);

impl FieldKey {
    /// Generate a fresh random key.
    pub fn generate() -> Self {
        Self(generate_random_bytes())
    }

    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Decode a key from its base64 form, as stored in the config file
    /// or passed through `ENCRYPTION_KEY`.
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let decoded = Zeroizing::new(
            STANDARD
                .decode(encoded.trim())
                .map_err(|e| CafeError::Config(format!("Key is not valid base64: {e}")))?,
        );

        if decoded.len() != KEY_LEN {
            return Err(CafeError::Config(format!(
                "Invalid key length: expected {} bytes, got {}",
                KEY_LEN,
                decoded.len()
            )));
        }

        let mut key = [0u8; KEY_LEN];
        key.copy_from_slice(&decoded);
        Ok(Self(key))
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.0)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FieldKey(<redacted>)")
    }
}

/// Generate cryptographically secure random bytes.
pub fn generate_random_bytes<const N: usize>() -> [u8; N] {
    let mut bytes = [0u8; N];
    OsRng.fill_bytes(&mut bytes);
    bytes
}

// =============================================================================
// Encryption / Decryption
// =============================================================================

/// Seal raw bytes. Returns `nonce || ciphertext || tag`.
pub fn encrypt_bytes(plaintext: &[u8], key: &FieldKey) -> Result<Vec<u8>> {
    let nonce: [u8; NONCE_LEN] = generate_random_bytes();
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|e| CafeError::Crypto(format!("Encryption failed: {e}")))?;

    let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    sealed.extend_from_slice(&nonce);
    sealed.extend_from_slice(&ciphertext);
    Ok(sealed)
}

/// Open a value produced by [`encrypt_bytes`].
///
/// Fails on truncated input, on a wrong key and on any tampering.
pub fn decrypt_bytes(sealed: &[u8], key: &FieldKey) -> Result<Zeroizing<Vec<u8>>> {
    if sealed.len() < NONCE_LEN + AUTH_TAG_LEN {
        return Err(CafeError::Crypto(format!(
            "Sealed value too short: {} bytes",
            sealed.len()
        )));
    }

    let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map(Zeroizing::new)
        .map_err(|_| CafeError::Crypto("Failed to decrypt value (wrong key or corrupted)".into()))
}

/// Encrypt a text field for storage. Empty plaintext is rejected.
pub fn encrypt_field(plaintext: &str, key: &FieldKey) -> Result<String> {
    if plaintext.is_empty() {
        return Err(CafeError::InvalidArgument(
            "Plain text cannot be empty".into(),
        ));
    }

    let sealed = encrypt_bytes(plaintext.as_bytes(), key)?;
    Ok(STANDARD.encode(sealed))
}

/// Decrypt a text field produced by [`encrypt_field`].
pub fn decrypt_field(ciphertext: &str, key: &FieldKey) -> Result<Zeroizing<String>> {
    if ciphertext.is_empty() {
        return Err(CafeError::Crypto("Cipher text cannot be empty".into()));
    }

    let sealed = STANDARD
        .decode(ciphertext)
        .map_err(|e| CafeError::Crypto(format!("Cipher text is not valid base64: {e}")))?;
    let plaintext = decrypt_bytes(&sealed, key)?;

    String::from_utf8(plaintext.to_vec())
        .map(Zeroizing::new)
        .map_err(|_| CafeError::Crypto("Decrypted value is not UTF-8".into()))
}

// =============================================================================
// Tests
// =============================================================================
