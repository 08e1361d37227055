//! Point (branch) document schema

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::schemas::Metadata;
use crate::db::store::{IntoIndexes, MutMetadata};

/// Collection name for points
pub const POINT_COLLECTION: &str = "points";

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct PointDoc {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    pub point_id: i32,

    /// Hex ids of the admins staffed here
    #[serde(default)]
    pub supervisors: Vec<String>,

    #[serde(default)]
    pub address: String,

    /// Image ids (ObjectId hex)
    #[serde(default)]
    pub pics: Vec<String>,

    /// Dish ids not served at this point
    #[serde(default)]
    pub unavailable: Vec<i32>,

    #[serde(default)]
    pub reviews: Vec<String>,

    /// Ids of issues raised here and still open
    #[serde(default)]
    pub active_issues: Vec<i32>,
}

impl PointDoc {
    pub fn new(point_id: i32, address: String) -> Self {
        Self {
            point_id,
            address,
            metadata: Metadata::new(),
            ..Default::default()
        }
    }
}

impl IntoIndexes for PointDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "pointId": 1 },
            Some(
                IndexOptions::builder()
                    .unique(true)
                    .name("point_id_unique".to_string())
                    .build(),
            ),
        )]
    }
}

impl MutMetadata for PointDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
