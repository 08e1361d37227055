//! Menu document schema

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::schemas::Metadata;
use crate::db::store::{IntoIndexes, MutMetadata};

/// Collection name for menus
pub const MENU_COLLECTION: &str = "menus";

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct MenuDoc {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    pub menu_id: i32,
    pub name_si: String,
    pub description_si: String,

    /// Dish ids, in display order
    #[serde(default)]
    pub dishes: Vec<i32>,
}

impl IntoIndexes for MenuDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "menuId": 1 },
            Some(
                IndexOptions::builder()
                    .unique(true)
                    .name("menu_id_unique".to_string())
                    .build(),
            ),
        )]
    }
}

impl MutMetadata for MenuDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
