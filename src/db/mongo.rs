//! MongoDB client and collection wrapper

use async_trait::async_trait;
use bson::{doc, oid::ObjectId, Document};
use futures_util::TryStreamExt;
use mongodb::{error::ErrorKind, Client, Collection, IndexModel};
use tracing::{error, info};

use crate::db::store::{with_updated_at, DocumentStore, Schema};
use crate::types::{CafeError, Result};

/// Duplicate key error code reported by the server
const DUPLICATE_KEY: i32 = 11000;

/// MongoDB client wrapper
#[derive(Clone)]
pub struct MongoClient {
    client: Client,
    db_name: String,
}

impl MongoClient {
    /// Connect and ping the database
    pub async fn new(uri: &str, db_name: &str) -> Result<Self> {
        info!("Connecting to MongoDB database '{}'", db_name);

        // Fail fast when MongoDB is unreachable
        let timeout_uri = if uri.contains('?') {
            format!("{}&serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        } else {
            format!("{}?serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        };

        let client = Client::with_uri_str(&timeout_uri)
            .await
            .map_err(|e| CafeError::Database(format!("Failed to connect to MongoDB: {}", e)))?;

        client
            .database(db_name)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| CafeError::Database(format!("MongoDB ping failed: {}", e)))?;

        info!("Connected to MongoDB database '{}'", db_name);

        Ok(Self {
            client,
            db_name: db_name.to_string(),
        })
    }

    /// Get a typed collection, applying its indexes
    pub async fn collection<T: Schema>(&self, name: &str) -> Result<MongoCollection<T>> {
        MongoCollection::new(&self.client, &self.db_name, name).await
    }

    pub fn db_name(&self) -> &str {
        &self.db_name
    }
}

/// Typed MongoDB collection with automatic indexing
#[derive(Debug, Clone)]
pub struct MongoCollection<T: Schema> {
    inner: Collection<T>,
}

impl<T: Schema> MongoCollection<T> {
    /// Create a new collection and apply indexes
    pub async fn new(client: &Client, db_name: &str, collection_name: &str) -> Result<Self> {
        let collection = client.database(db_name).collection::<T>(collection_name);
        let mongo_collection = MongoCollection { inner: collection };

        mongo_collection.apply_indexes().await?;

        Ok(mongo_collection)
    }

    /// Apply schema-defined indexes
    async fn apply_indexes(&self) -> Result<()> {
        let schema_indices = T::into_indices();

        if schema_indices.is_empty() {
            return Ok(());
        }

        let indices: Vec<IndexModel> = schema_indices
            .into_iter()
            .map(|(keys, opts)| IndexModel::builder().keys(keys).options(opts).build())
            .collect();

        self.inner
            .create_indexes(indices)
            .await
            .map_err(|e| CafeError::Database(format!("Failed to create indexes: {}", e)))?;

        Ok(())
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Write(mongodb::error::WriteFailure::WriteError(e)) => e.code == DUPLICATE_KEY,
        _ => false,
    }
}

#[async_trait]
impl<T: Schema> DocumentStore<T> for MongoCollection<T> {
    async fn find_one(&self, filter: Document) -> Result<Option<T>> {
        self.inner
            .find_one(filter)
            .await
            .map_err(|e| CafeError::Database(format!("Find failed: {}", e)))
    }

    async fn find_many(&self, filter: Document) -> Result<Vec<T>> {
        let cursor = self
            .inner
            .find(filter)
            .await
            .map_err(|e| CafeError::Database(format!("Find failed: {}", e)))?;

        cursor.try_collect().await.map_err(|e| {
            error!("Error reading documents: {}", e);
            CafeError::Database(format!("Cursor failed: {}", e))
        })
    }

    async fn insert_one(&self, mut item: T) -> Result<ObjectId> {
        item.mut_metadata().touch();

        let result = self.inner.insert_one(item).await.map_err(|e| {
            if is_duplicate_key(&e) {
                CafeError::Conflict("Document already exists".into())
            } else {
                CafeError::Database(format!("Insert failed: {}", e))
            }
        })?;

        result
            .inserted_id
            .as_object_id()
            .ok_or_else(|| CafeError::Database("Failed to get inserted ID".into()))
    }

    async fn update_one(&self, filter: Document, update: Document) -> Result<u64> {
        self.inner
            .update_one(filter, with_updated_at(update))
            .await
            .map(|r| r.matched_count)
            .map_err(|e| CafeError::Database(format!("Update failed: {}", e)))
    }

    async fn update_many(&self, filter: Document, update: Document) -> Result<u64> {
        self.inner
            .update_many(filter, with_updated_at(update))
            .await
            .map(|r| r.matched_count)
            .map_err(|e| CafeError::Database(format!("Update failed: {}", e)))
    }

    async fn delete_one(&self, filter: Document) -> Result<u64> {
        self.inner
            .delete_one(filter)
            .await
            .map(|r| r.deleted_count)
            .map_err(|e| CafeError::Database(format!("Delete failed: {}", e)))
    }

    async fn delete_many(&self, filter: Document) -> Result<u64> {
        self.inner
            .delete_many(filter)
            .await
            .map(|r| r.deleted_count)
            .map_err(|e| CafeError::Database(format!("Delete failed: {}", e)))
    }

    fn backend(&self) -> &'static str {
        "mongodb"
    }
}
