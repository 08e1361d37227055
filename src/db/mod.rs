//! Database layer for OpenCafe
//!
//! Every collection is reached through the [`DocumentStore`] trait so the
//! MongoDB backend and the in-memory backend are interchangeable.

pub mod memory;
pub mod mongo;
pub mod schemas;
pub mod store;

use std::sync::Arc;

pub use memory::MemoryStore;
pub use mongo::{MongoClient, MongoCollection};
pub use schemas::{
    card_hash, AdminDoc, CardDoc, CustomerDoc, DishDoc, InstanceDoc, IssueDoc, LocalizedStringDoc,
    MenuDoc, Metadata, NutriProfile, PointDoc, NUTRITION_KEYS,
};
pub use store::{DocumentStore, IntoIndexes, MutMetadata, Schema};

use crate::types::Result;

/// Handles to every collection
#[derive(Clone)]
pub struct Stores {
    pub admins: Arc<dyn DocumentStore<AdminDoc>>,
    pub points: Arc<dyn DocumentStore<PointDoc>>,
    pub issues: Arc<dyn DocumentStore<IssueDoc>>,
    pub strings: Arc<dyn DocumentStore<LocalizedStringDoc>>,
    pub dishes: Arc<dyn DocumentStore<DishDoc>>,
    pub menus: Arc<dyn DocumentStore<MenuDoc>>,
    pub instances: Arc<dyn DocumentStore<InstanceDoc>>,
    pub customers: Arc<dyn DocumentStore<CustomerDoc>>,
    pub cards: Arc<dyn DocumentStore<CardDoc>>,
}

impl Stores {
    /// Fresh, empty in-memory collections
    pub fn in_memory() -> Self {
        Self {
            admins: Arc::new(MemoryStore::<AdminDoc>::new()),
            points: Arc::new(MemoryStore::<PointDoc>::new()),
            issues: Arc::new(MemoryStore::<IssueDoc>::new()),
            strings: Arc::new(MemoryStore::<LocalizedStringDoc>::new()),
            dishes: Arc::new(MemoryStore::<DishDoc>::new()),
            menus: Arc::new(MemoryStore::<MenuDoc>::new()),
            instances: Arc::new(MemoryStore::<InstanceDoc>::new()),
            customers: Arc::new(MemoryStore::<CustomerDoc>::new()),
            cards: Arc::new(MemoryStore::<CardDoc>::new()),
        }
    }

    /// Open every collection on MongoDB, creating indexes
    pub async fn mongo(client: &MongoClient) -> Result<Self> {
        Ok(Self {
            admins: Arc::new(client.collection::<AdminDoc>(schemas::ADMIN_COLLECTION).await?),
            points: Arc::new(client.collection::<PointDoc>(schemas::POINT_COLLECTION).await?),
            issues: Arc::new(client.collection::<IssueDoc>(schemas::ISSUE_COLLECTION).await?),
            strings: Arc::new(client.collection::<LocalizedStringDoc>(schemas::STRING_COLLECTION).await?),
            dishes: Arc::new(client.collection::<DishDoc>(schemas::DISH_COLLECTION).await?),
            menus: Arc::new(client.collection::<MenuDoc>(schemas::MENU_COLLECTION).await?),
            instances: Arc::new(client.collection::<InstanceDoc>(schemas::INSTANCE_COLLECTION).await?),
            customers: Arc::new(client.collection::<CustomerDoc>(schemas::CUSTOMER_COLLECTION).await?),
            cards: Arc::new(client.collection::<CardDoc>(schemas::CARD_COLLECTION).await?),
        })
    }

    /// Backend name for health reporting
    pub fn backend(&self) -> &'static str {
        self.admins.backend()
    }
}
