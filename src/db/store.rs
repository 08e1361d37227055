//! Document store abstraction
//!
//! Services talk to collections through [`DocumentStore`], so the same
//! handler code runs against MongoDB in production and against
//! [`MemoryStore`](crate::db::MemoryStore) in dev mode and tests.

use async_trait::async_trait;
use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{de::DeserializeOwned, Serialize};

use crate::db::schemas::Metadata;
use crate::types::Result;

/// Trait for schemas that provide index definitions
pub trait IntoIndexes {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)>;
}

/// Trait for schemas with mutable metadata
pub trait MutMetadata {
    fn mut_metadata(&mut self) -> &mut Metadata;
}

/// Everything a document type needs to live in a store
pub trait Schema:
    Serialize + DeserializeOwned + Unpin + Send + Sync + Clone + IntoIndexes + MutMetadata + 'static
{
}

impl<T> Schema for T where
    T: Serialize + DeserializeOwned + Unpin + Send + Sync + Clone + IntoIndexes + MutMetadata + 'static
{
}

/// A typed collection of documents.
///
/// Filters and updates use MongoDB query syntax. The in-memory backend
/// supports the subset the services use: equality, `$ne` and `$in` in
/// filters; `$set`, `$unset`, `$push`, `$pull` and `$inc` in updates.
#[async_trait]
pub trait DocumentStore<T: Schema>: Send + Sync {
    /// Every document, in store order
    async fn find_all(&self) -> Result<Vec<T>> {
        self.find_many(doc! {}).await
    }

    async fn find_one(&self, filter: Document) -> Result<Option<T>>;

    async fn find_many(&self, filter: Document) -> Result<Vec<T>>;

    /// Insert a document, stamping metadata. Returns the assigned id.
    async fn insert_one(&self, item: T) -> Result<ObjectId>;

    /// Apply `update` to the first match. Returns the matched count.
    async fn update_one(&self, filter: Document, update: Document) -> Result<u64>;

    /// Apply `update` to every match. Returns the matched count.
    async fn update_many(&self, filter: Document, update: Document) -> Result<u64>;

    /// Returns the deleted count.
    async fn delete_one(&self, filter: Document) -> Result<u64>;

    async fn delete_many(&self, filter: Document) -> Result<u64>;

    /// Backend name, reported by the health endpoint
    fn backend(&self) -> &'static str;
}

/// Add `metadata.updated_at` to the `$set` stage of an update document.
pub(crate) fn with_updated_at(mut update: Document) -> Document {
    let now = bson::DateTime::now();
    match update.get_document_mut("$set") {
        Ok(set) => {
            set.insert("metadata.updated_at", now);
        }
        Err(_) => {
            update.insert("$set", doc! { "metadata.updated_at": now });
        }
    }
    update
}
