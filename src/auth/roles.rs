//! Admin roles and capability checks
//!
//! Every authorization decision in the service reduces to [`authorize`],
//! a pure function of the caller and a [`Capability`].

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::db::schemas::{AdminDoc, IssueDoc};

/// Role tags an admin can hold. An admin may hold several.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Deployment owner: manages admins, points and the instance
    Head,
    /// Shift supervisor: raises issues
    #[serde(rename = "sprvsr")]
    Supervisor,
    /// Branch manager: manages its bound point and the catalogue
    General,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Head => "head",
            Role::Supervisor => "sprvsr",
            Role::General => "general",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Something a caller may be allowed to do
#[derive(Debug, Clone, Copy)]
pub enum Capability<'a> {
    /// Caller holds `head`
    Head,
    /// Caller holds `general` and is bound to the point
    GeneralBoundTo(i32),
    /// Caller holds `sprvsr` and raised the issue
    SupervisorOf(&'a IssueDoc),
    /// Caller is the target admin, or holds `head`
    SelfOrHead(&'a AdminDoc),
}

/// True iff the admin holds `head`.
pub fn is_head(admin: &AdminDoc) -> bool {
    admin.has_role(Role::Head)
}

/// Evaluate a capability for a caller. No I/O.
pub fn authorize(caller: &AdminDoc, capability: Capability<'_>) -> bool {
    match capability {
        Capability::Head => is_head(caller),
        Capability::GeneralBoundTo(point) => {
            caller.has_role(Role::General) && point >= 0 && caller.bound_point() == Some(point)
        }
        Capability::SupervisorOf(issue) => {
            caller.has_role(Role::Supervisor)
                && caller._id.is_some()
                && issue.raiser == caller.id_hex()
        }
        Capability::SelfOrHead(target) => {
            is_head(caller) || (caller._id.is_some() && caller._id == target._id)
        }
    }
}
