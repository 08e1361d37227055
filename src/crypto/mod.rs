//! Encryption at rest
//!
//! Admin tokens, card numbers and customer card references are stored
//! encrypted with a per-collection ChaCha20-Poly1305 key. The database
//! config file is sealed with the same primitive under the master key.

pub mod cipher;
pub mod keys;

pub use cipher::{
    decrypt_bytes, decrypt_field, encrypt_bytes, encrypt_field, generate_random_bytes, FieldKey,
    AUTH_TAG_LEN, KEY_LEN, NONCE_LEN,
};
pub use keys::{KeyCollection, KeyProvider, StaticKeyProvider};
