//! Per-collection key material.
//!
//! Each logical collection that stores encrypted fields has its own key.
//! Callers ask a [`KeyProvider`] for the key of a collection instead of
//! reaching into configuration themselves.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::crypto::cipher::FieldKey;
use crate::types::{CafeError, Result};

/// Logical collections with encrypted fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCollection {
    /// Admin bearer tokens
    Admins,
    /// Customer card references
    Customers,
    /// Card numbers
    Cards,
}

impl KeyCollection {
    pub const ALL: [KeyCollection; 3] = [Self::Admins, Self::Customers, Self::Cards];

    /// Name used in the config file
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admins => "admins",
            Self::Customers => "customers",
            Self::Cards => "cards",
        }
    }
}

impl fmt::Display for KeyCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Keyed encryption provider
pub trait KeyProvider: Send + Sync {
    /// Key for the given collection. A missing key is a configuration error.
    fn key_for(&self, collection: KeyCollection) -> Result<&FieldKey>;
}

/// Keys held in memory, loaded once at startup
#[derive(Clone, Default)]
pub struct StaticKeyProvider {
    keys: HashMap<KeyCollection, FieldKey>,
}

impl StaticKeyProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh random keys for every collection (dev mode and tests)
    pub fn generate() -> Self {
        KeyCollection::ALL
            .into_iter()
            .fold(Self::new(), |provider, c| provider.with_key(c, FieldKey::generate()))
    }

    pub fn with_key(mut self, collection: KeyCollection, key: FieldKey) -> Self {
        self.keys.insert(collection, key);
        self
    }

    /// Build from the `collection_encryption` section of the config file.
    ///
    /// Every collection must be present.
    pub fn from_encoded(encoded: &BTreeMap<String, String>) -> Result<Self> {
        let mut provider = Self::new();
        for collection in KeyCollection::ALL {
            let value = encoded.get(collection.as_str()).ok_or_else(|| {
                CafeError::Config(format!("No encryption key for collection '{collection}'"))
            })?;
            provider = provider.with_key(collection, FieldKey::from_base64(value)?);
        }
        Ok(provider)
    }

    /// Encode keys back for the config file
    pub fn to_encoded(&self) -> BTreeMap<String, String> {
        self.keys
            .iter()
            .map(|(c, k)| (c.as_str().to_string(), k.to_base64()))
            .collect()
    }
}

impl KeyProvider for StaticKeyProvider {
    fn key_for(&self, collection: KeyCollection) -> Result<&FieldKey> {
        self.keys.get(&collection).ok_or_else(|| {
            CafeError::Config(format!("No encryption key for collection '{collection}'"))
        })
    }
}
