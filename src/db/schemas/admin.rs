//! Admin document schema
//!
//! Admins authenticate with a bearer token that is stored encrypted with
//! the admins collection key.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::auth::Role;
use crate::db::schemas::Metadata;
use crate::db::store::{IntoIndexes, MutMetadata};

/// Collection name for admins
pub const ADMIN_COLLECTION: &str = "admins";

/// Point binding value meaning "not bound anywhere"
pub const UNBOUND: i32 = -1;

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct AdminDoc {
    /// MongoDB document ID
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    pub name: String,

    #[serde(default)]
    pub roles: Vec<Role>,

    /// Point this admin works at. `None` and negative values mean unbound.
    #[serde(default)]
    pub bound_to: Option<i32>,

    /// Encrypted bearer token
    pub token: String,
}

impl AdminDoc {
    /// A fresh `general` admin with no binding
    pub fn new(name: String, encrypted_token: String) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            name,
            roles: vec![Role::General],
            bound_to: None,
            token: encrypted_token,
        }
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    /// The bound point, if any
    pub fn bound_point(&self) -> Option<i32> {
        self.bound_to.filter(|pid| *pid >= 0)
    }

    /// Hex form of the document id, empty if not yet stored
    pub fn id_hex(&self) -> String {
        self._id.map(|id| id.to_hex()).unwrap_or_default()
    }
}

impl IntoIndexes for AdminDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "boundTo": 1 },
            Some(
                IndexOptions::builder()
                    .name("bound_to_index".to_string())
                    .build(),
            ),
        )]
    }
}

impl MutMetadata for AdminDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_admin_is_unbound_general() {
        let admin = AdminDoc::new("Ann".into(), "sealed".into());

        assert_eq!(admin.roles, vec![Role::General]);
        assert_eq!(admin.bound_point(), None);
    }

    #[test]
    fn test_negative_binding_is_unbound() {
        let mut admin = AdminDoc::new("Ann".into(), "sealed".into());
        admin.bound_to = Some(UNBOUND);
        assert_eq!(admin.bound_point(), None);

        admin.bound_to = Some(5);
        assert_eq!(admin.bound_point(), Some(5));
    }

    #[test]
    fn test_wire_field_names() {
        let mut admin = AdminDoc::new("Ann".into(), "sealed".into());
        admin.roles.push(Role::Supervisor);
        admin.bound_to = Some(3);

        let doc = bson::to_document(&admin).unwrap();
        assert_eq!(doc.get_i32("boundTo").unwrap(), 3);
        assert_eq!(
            doc.get_array("roles").unwrap(),
            &vec![bson::Bson::from("general"), bson::Bson::from("sprvsr")]
        );
        assert!(!doc.contains_key("_id"));
    }
}
