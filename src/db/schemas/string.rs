//! Localized string document schema
//!
//! User-facing text lives here, keyed by a string identifier (SI) of the
//! form `WHAT%id%WHERE`, with one document per culture.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::schemas::Metadata;
use crate::db::store::{IntoIndexes, MutMetadata};

/// Collection name for localized strings
pub const STRING_COLLECTION: &str = "strings";

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct LocalizedStringDoc {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    pub culture: String,
    pub content: String,
    pub si: String,

    /// Set when another culture of the same SI changed after this one
    #[serde(default)]
    pub outdated: bool,
}

impl LocalizedStringDoc {
    pub fn new(culture: &str, content: &str, si: &str) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            culture: culture.to_string(),
            content: content.to_string(),
            si: si.to_string(),
            outdated: false,
        }
    }
}

impl IntoIndexes for LocalizedStringDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "si": 1, "culture": 1 },
            Some(
                IndexOptions::builder()
                    .unique(true)
                    .name("si_culture_unique".to_string())
                    .build(),
            ),
        )]
    }
}

impl MutMetadata for LocalizedStringDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
