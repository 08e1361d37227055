//! Admin bearer token generation

use rand::rngs::OsRng;
use rand::Rng;
use std::fmt;
use zeroize::Zeroizing;

use crate::crypto::{encrypt_field, FieldKey};
use crate::types::Result;

/// Length of a plaintext token
pub const TOKEN_LEN: usize = 48;

/// RFC 3986 unreserved characters
pub const TOKEN_ALPHABET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_.~";

/// A freshly generated token. The plaintext exists only here and is
/// wiped when this value is dropped.
pub struct IssuedToken {
    /// Encrypted form, ready to store
    pub ciphertext: String,
    /// Plaintext, to hand to the new holder exactly once
    pub plaintext: Zeroizing<String>,
}

impl fmt::Debug for IssuedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedToken")
            .field("ciphertext", &self.ciphertext)
            .field("plaintext", &"<redacted>")
            .finish()
    }
}

/// Draw a plaintext token uniformly from [`TOKEN_ALPHABET`].
pub fn generate_plaintext() -> Zeroizing<String> {
    let mut rng = OsRng;
    let token: String = (0..TOKEN_LEN)
        .map(|_| char::from(TOKEN_ALPHABET[rng.gen_range(0..TOKEN_ALPHABET.len())]))
        .collect();
    Zeroizing::new(token)
}

/// Generate a token and encrypt it with the admins key.
pub fn issue_token(key: &FieldKey) -> Result<IssuedToken> {
    let plaintext = generate_plaintext();
    let ciphertext = encrypt_field(&plaintext, key)?;
    Ok(IssuedToken {
        ciphertext,
        plaintext,
    })
}
