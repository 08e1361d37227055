//! Issue ticket document schema

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::schemas::Metadata;
use crate::db::store::{IntoIndexes, MutMetadata};

/// Collection name for issues
pub const ISSUE_COLLECTION: &str = "issues";

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct IssueDoc {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    pub issue_id: i32,

    #[serde(default)]
    pub is_active: bool,

    #[serde(default)]
    pub is_monitored: bool,

    /// Hex id of the supervisor who raised the issue
    pub raiser: String,

    /// Point the raiser was bound to, if any
    #[serde(default)]
    pub point: Option<i32>,

    pub when_raised: DateTime,

    pub title: String,
    pub contacts: String,
    pub description: String,
}

impl IntoIndexes for IssueDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "issueId": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("issue_id_unique".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "point": 1 },
                Some(IndexOptions::builder().name("point_index".to_string()).build()),
            ),
        ]
    }
}

impl MutMetadata for IssueDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
