//! Customer document schema

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::schemas::Metadata;
use crate::db::store::{IntoIndexes, MutMetadata};

/// Collection name for customers
pub const CUSTOMER_COLLECTION: &str = "customers";

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct CustomerDoc {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    /// Random positive id, referenced by cards
    pub internal_id: i64,

    pub username: String,
    pub email: String,

    #[serde(default)]
    pub is_email_verified: bool,

    /// Argon2 password hash
    pub password: String,

    /// Favorite dish ids
    #[serde(default)]
    pub hearts: Vec<i32>,

    #[serde(default)]
    pub reviews: Vec<String>,

    /// Card number, encrypted with the customers key
    #[serde(default)]
    pub card: Option<String>,
}

impl IntoIndexes for CustomerDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "email": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("email_unique".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "internalId": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("internal_id_unique".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for CustomerDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
