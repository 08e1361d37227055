//! Token resolution
//!
//! Maps a plaintext bearer token to the admin that holds it. Tokens are
//! stored with a random nonce, so equal plaintexts never produce equal
//! ciphertexts and a lookup cannot be a simple filter. [`ScanTokenResolver`]
//! decrypts every stored token and compares; an indexed implementation can
//! replace it behind [`TokenResolver`] without touching callers.

use async_trait::async_trait;
use bson::doc;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::auth::token::{issue_token, IssuedToken};
use crate::crypto::{decrypt_field, KeyCollection, KeyProvider};
use crate::db::{AdminDoc, DocumentStore};
use crate::types::{CafeError, Result};

#[async_trait]
pub trait TokenResolver: Send + Sync {
    /// The admin holding `plaintext`, or `None`.
    ///
    /// Blank input is an `InvalidArgument`. Store failures and timeouts
    /// are returned as errors, never as `None`.
    async fn resolve(&self, plaintext: &str) -> Result<Option<AdminDoc>>;

    /// Replace the admin's token with a fresh one and return it.
    async fn rotate(&self, admin: &AdminDoc) -> Result<IssuedToken>;

    /// Invalidate the admin's current token. Nobody learns the new one.
    async fn revoke(&self, admin: &AdminDoc) -> Result<()> {
        self.rotate(admin).await.map(drop)
    }
}

/// Linear scan over the admins collection
pub struct ScanTokenResolver {
    admins: Arc<dyn DocumentStore<AdminDoc>>,
    keys: Arc<dyn KeyProvider>,
    store_timeout: Duration,
}

impl ScanTokenResolver {
    pub fn new(
        admins: Arc<dyn DocumentStore<AdminDoc>>,
        keys: Arc<dyn KeyProvider>,
        store_timeout: Duration,
    ) -> Self {
        Self {
            admins,
            keys,
            store_timeout,
        }
    }

    /// Run one store round-trip under the configured timeout
    async fn bounded<T, F>(&self, what: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>> + Send,
    {
        tokio::time::timeout(self.store_timeout, fut)
            .await
            .map_err(|_| {
                CafeError::Timeout(format!(
                    "{what} did not complete within {}ms",
                    self.store_timeout.as_millis()
                ))
            })?
    }
}

#[async_trait]
impl TokenResolver for ScanTokenResolver {
    async fn resolve(&self, plaintext: &str) -> Result<Option<AdminDoc>> {
        if plaintext.trim().is_empty() {
            return Err(CafeError::InvalidArgument("Token is required".into()));
        }

        let key = self.keys.key_for(KeyCollection::Admins)?;
        let admins = self.bounded("Loading admins", self.admins.find_all()).await?;

        for admin in admins {
            match decrypt_field(&admin.token, key) {
                Ok(stored) if stored.as_str() == plaintext => return Ok(Some(admin)),
                Ok(_) => {}
                Err(e) => {
                    debug!(admin_id = %admin.id_hex(), "Skipping undecryptable token: {}", e);
                }
            }
        }

        Ok(None)
    }

    async fn rotate(&self, admin: &AdminDoc) -> Result<IssuedToken> {
        let id = admin
            ._id
            .ok_or_else(|| CafeError::InvalidArgument("Admin has no id".into()))?;
        let issued = issue_token(self.keys.key_for(KeyCollection::Admins)?)?;

        let matched = self
            .bounded(
                "Replacing token",
                self.admins.update_one(
                    doc! { "_id": id },
                    doc! { "$set": { "token": issued.ciphertext.as_str() } },
                ),
            )
            .await?;

        if matched == 0 {
            return Err(CafeError::NotFound(format!("Admin {} not found", id.to_hex())));
        }
        Ok(issued)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::StaticKeyProvider;
    use crate::db::MemoryStore;
    use bson::oid::ObjectId;

    /// A store whose every call hangs past any reasonable timeout
    struct StalledStore;

    #[async_trait]
    impl DocumentStore<AdminDoc> for StalledStore {
        async fn find_one(&self, _: bson::Document) -> Result<Option<AdminDoc>> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(None)
        }
        async fn find_many(&self, _: bson::Document) -> Result<Vec<AdminDoc>> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(Vec::new())
        }
        async fn insert_one(&self, _: AdminDoc) -> Result<ObjectId> {
            Err(CafeError::Database("stalled".into()))
        }
        async fn update_one(&self, _: bson::Document, _: bson::Document) -> Result<u64> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(0)
        }
        async fn update_many(&self, _: bson::Document, _: bson::Document) -> Result<u64> {
            Ok(0)
        }
        async fn delete_one(&self, _: bson::Document) -> Result<u64> {
            Ok(0)
        }
        async fn delete_many(&self, _: bson::Document) -> Result<u64> {
            Ok(0)
        }
        fn backend(&self) -> &'static str {
            "stalled"
        }
    }

    async fn setup() -> (ScanTokenResolver, Arc<MemoryStore<AdminDoc>>, Arc<StaticKeyProvider>) {
        let store = Arc::new(MemoryStore::<AdminDoc>::new());
        let keys = Arc::new(StaticKeyProvider::generate());
        let resolver =
            ScanTokenResolver::new(store.clone(), keys.clone(), Duration::from_secs(5));
        (resolver, store, keys)
    }

    async fn insert_admin(
        store: &MemoryStore<AdminDoc>,
        keys: &StaticKeyProvider,
        name: &str,
    ) -> (ObjectId, String) {
        let issued = issue_token(keys.key_for(KeyCollection::Admins).unwrap()).unwrap();
        let id = store
            .insert_one(AdminDoc::new(name.into(), issued.ciphertext.clone()))
            .await
            .unwrap();
        (id, issued.plaintext.to_string())
    }

    #[tokio::test]
    async fn test_resolves_every_inserted_token() {
        let (resolver, store, keys) = setup().await;
        let mut inserted = Vec::new();
        for name in ["a", "b", "c", "d"] {
            inserted.push(insert_admin(&store, &keys, name).await);
        }

        for (id, token) in inserted {
            let admin = resolver.resolve(&token).await.unwrap().unwrap();
            assert_eq!(admin._id, Some(id));
        }
    }

    #[tokio::test]
    async fn test_unknown_token_is_absent() {
        let (resolver, store, keys) = setup().await;
        insert_admin(&store, &keys, "a").await;

        assert!(resolver.resolve("never-issued").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_blank_token_is_invalid_argument() {
        let (resolver, _, _) = setup().await;

        assert!(matches!(
            resolver.resolve("").await,
            Err(CafeError::InvalidArgument(_))
        ));
        assert!(matches!(
            resolver.resolve("   ").await,
            Err(CafeError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_corrupted_record_is_skipped() {
        let (resolver, store, keys) = setup().await;
        // Corrupted record sits first in store order
        store
            .insert_one(AdminDoc::new("broken".into(), "garbage!".into()))
            .await
            .unwrap();
        let (id, token) = insert_admin(&store, &keys, "a").await;

        let admin = resolver.resolve(&token).await.unwrap().unwrap();
        assert_eq!(admin._id, Some(id));
    }

    #[tokio::test]
    async fn test_missing_key_is_fatal() {
        let store = Arc::new(MemoryStore::<AdminDoc>::new());
        let resolver = ScanTokenResolver::new(
            store,
            Arc::new(StaticKeyProvider::new()),
            Duration::from_secs(5),
        );

        assert!(matches!(
            resolver.resolve("anything").await,
            Err(CafeError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_store_timeout_is_fatal() {
        let resolver = ScanTokenResolver::new(
            Arc::new(StalledStore),
            Arc::new(StaticKeyProvider::generate()),
            Duration::from_millis(20),
        );

        assert!(matches!(
            resolver.resolve("anything").await,
            Err(CafeError::Timeout(_))
        ));
    }

    #[tokio::test]
    async fn test_rotate_and_revoke() {
        let (resolver, store, keys) = setup().await;
        let (id, token) = insert_admin(&store, &keys, "a").await;
        let admin = resolver.resolve(&token).await.unwrap().unwrap();

        let issued = resolver.rotate(&admin).await.unwrap();
        assert!(resolver.resolve(&token).await.unwrap().is_none());
        let rotated = resolver.resolve(&issued.plaintext).await.unwrap().unwrap();
        assert_eq!(rotated._id, Some(id));

        resolver.revoke(&rotated).await.unwrap();
        assert!(resolver.resolve(&issued.plaintext).await.unwrap().is_none());
    }
}
