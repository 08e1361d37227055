//! Loyalty card document schema
//!
//! The card number is never stored in the clear: `number` holds it
//! encrypted with the cards key and `hash` holds its SHA-256 for lookups.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::db::schemas::Metadata;
use crate::db::store::{IntoIndexes, MutMetadata};

/// Collection name for cards
pub const CARD_COLLECTION: &str = "cards";

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct CardDoc {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    /// Owner's `internalId`
    pub owner_iid: i64,

    /// Encrypted card number
    pub number: String,

    /// Hex SHA-256 of the decimal card number
    pub hash: String,

    #[serde(default)]
    pub balance: i64,

    #[serde(default)]
    pub orders: Vec<String>,
}

/// Lookup hash for a card number
pub fn card_hash(number: i64) -> String {
    hex::encode(Sha256::digest(number.to_string().as_bytes()))
}

impl IntoIndexes for CardDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "hash": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("hash_unique".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "ownerIid": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("owner_unique".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for CardDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
