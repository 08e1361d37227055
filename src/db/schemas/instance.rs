//! Instance configuration document schema
//!
//! One live document (`isBackup = false`) describes the deployment;
//! any number of backup copies may sit beside it.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::db::schemas::Metadata;
use crate::db::store::{IntoIndexes, MutMetadata};

/// Collection name for instance configurations
pub const INSTANCE_COLLECTION: &str = "instances";

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct InstanceDoc {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    #[serde(default)]
    pub is_backup: bool,

    /// Supported cultures; the first one is primary
    #[serde(default)]
    pub cultures: Vec<String>,

    #[serde(default)]
    pub logo: String,

    /// Culture to display name
    #[serde(default)]
    pub name: BTreeMap<String, String>,

    /// Culture to description
    #[serde(default)]
    pub description: BTreeMap<String, String>,

    #[serde(default)]
    pub pics: Vec<String>,
}

impl InstanceDoc {
    /// Primary culture, used for new localized strings
    pub fn primary_culture(&self) -> Option<&str> {
        self.cultures.first().map(String::as_str)
    }
}

impl IntoIndexes for InstanceDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "isBackup": 1 },
            Some(
                IndexOptions::builder()
                    .name("is_backup_index".to_string())
                    .build(),
            ),
        )]
    }
}

impl MutMetadata for InstanceDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
