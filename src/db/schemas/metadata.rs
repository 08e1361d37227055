//! Common metadata for all documents
//!
//! Tracks creation and update timestamps. Deletion is physical, so there
//! is no tombstone here.

use bson::DateTime;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Metadata {
    /// When the document was last updated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime>,

    /// When the document was created
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime>,
}

impl Metadata {
    /// Create new metadata with current timestamp
    pub fn new() -> Self {
        let now = DateTime::now();
        Self {
            updated_at: Some(now),
            created_at: Some(now),
        }
    }

    /// Stamp both timestamps, keeping an existing creation time
    pub fn touch(&mut self) {
        let now = DateTime::now();
        self.created_at.get_or_insert(now);
        self.updated_at = Some(now);
    }
}
