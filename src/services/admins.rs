//! Admin accounts
//!
//! Login, registration, renaming, deletion, listing and token rotation.
//! Operations naming a single admin map an unknown token to
//! `Unauthorized`; operations naming two admins map it to `NotFound`.

use bson::doc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::auth::{Capability, IssuedToken, Role};
use crate::crypto::{decrypt_field, KeyCollection};
use crate::db::AdminDoc;
use crate::logging::AuditAction;
use crate::services::{require, Context};
use crate::types::{CafeError, Result};

// =============================================================================
// Request / Response Types
// =============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRequest {
    #[serde(default)]
    pub token: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub name: String,
}

/// Caller (`token1`) acting on another admin (`token2`)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TwoTokenRequest {
    #[serde(default)]
    pub token1: String,
    #[serde(default)]
    pub token2: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeNameRequest {
    #[serde(default)]
    pub token1: String,
    #[serde(default)]
    pub token2: String,
    #[serde(default)]
    pub name: String,
}

/// Public view of an admin. Never carries the token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AdminView {
    pub id: String,
    pub name: String,
    pub roles: Vec<Role>,
    pub bound_to: Option<i32>,
}

impl From<&AdminDoc> for AdminView {
    fn from(admin: &AdminDoc) -> Self {
        Self {
            id: admin.id_hex(),
            name: admin.name.clone(),
            roles: admin.roles.clone(),
            bound_to: admin.bound_point(),
        }
    }
}

/// An admin together with a plaintext token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminWithToken {
    #[serde(flatten)]
    pub admin: AdminView,
    /// `None` when the stored token cannot be decrypted
    pub token: Option<String>,
}

// =============================================================================
// Operations
// =============================================================================

/// Insert an admin with the given roles and a fresh token.
///
/// Used by registration and by startup bootstrapping.
pub async fn create_admin(
    ctx: &Context,
    name: &str,
    roles: Vec<Role>,
    bound_to: Option<i32>,
) -> Result<(AdminDoc, IssuedToken)> {
    let issued = ctx.auth.issue_token()?;
    let mut admin = AdminDoc::new(name.trim().to_string(), issued.ciphertext.clone());
    admin.roles = roles;
    admin.bound_to = bound_to;

    let id = ctx.stores.admins.insert_one(admin.clone()).await?;
    admin._id = Some(id);
    Ok((admin, issued))
}

/// Identify the token holder
pub async fn login(ctx: &Context, req: TokenRequest) -> Result<AdminView> {
    require(&req.token, "token")?;
    let admin = ctx.auth.require_admin(&req.token).await?;

    info!(admin_id = %admin.id_hex(), "Admin logged in");
    Ok(AdminView::from(&admin))
}

/// Create a `general` admin. Head only. The plaintext token is returned
/// here and nowhere else.
pub async fn register(ctx: &Context, req: RegisterRequest) -> Result<AdminWithToken> {
    require(&req.token, "token")?;
    require(&req.name, "name")?;

    let caller = ctx.auth.require_admin(&req.token).await?;
    if !ctx.auth.is_head(&caller) {
        warn!(admin_id = %caller.id_hex(), "Non-head admin tried to register an admin");
        ctx.audit
            .denied(AuditAction::AdminRegistered, &caller.id_hex(), req.name.as_str())
            .await;
        return Err(CafeError::Unauthorized("Only a head admin can register admins".into()));
    }

    let (admin, issued) = create_admin(ctx, &req.name, vec![Role::General], None).await?;

    info!(admin_id = %admin.id_hex(), by = %caller.id_hex(), "Admin registered");
    ctx.audit
        .success(AuditAction::AdminRegistered, &caller.id_hex(), admin.id_hex())
        .await;

    Ok(AdminWithToken {
        admin: AdminView::from(&admin),
        token: Some(issued.plaintext.to_string()),
    })
}

/// Rename `token2`'s holder. Allowed for the holder itself, for a head,
/// and for a general renaming a supervisor.
pub async fn change_name(ctx: &Context, req: ChangeNameRequest) -> Result<AdminView> {
    require(&req.token1, "token1")?;
    require(&req.token2, "token2")?;
    require(&req.name, "name")?;

    let caller = ctx.auth.find_admin(&req.token1).await?;
    let target = ctx.auth.find_admin(&req.token2).await?;

    let allowed = ctx.auth.authorize(&caller, Capability::SelfOrHead(&target))
        || (caller.has_role(Role::General) && target.has_role(Role::Supervisor));
    if !allowed {
        ctx.audit
            .denied(AuditAction::AdminRenamed, &caller.id_hex(), target.id_hex())
            .await;
        return Err(CafeError::Unauthorized("Not allowed to rename this admin".into()));
    }

    let name = req.name.trim().to_string();
    ctx.stores
        .admins
        .update_one(doc! { "_id": target._id }, doc! { "$set": { "name": name.as_str() } })
        .await?;

    ctx.audit
        .success(AuditAction::AdminRenamed, &caller.id_hex(), target.id_hex())
        .await;

    let mut renamed = target;
    renamed.name = name;
    Ok(AdminView::from(&renamed))
}

/// Physically delete `token2`'s holder. Head only.
pub async fn delete(ctx: &Context, req: TwoTokenRequest) -> Result<AdminView> {
    require(&req.token1, "token1")?;
    require(&req.token2, "token2")?;

    let caller = ctx.auth.find_admin(&req.token1).await?;
    let target = ctx.auth.find_admin(&req.token2).await?;

    if !ctx.auth.authorize(&caller, Capability::Head) {
        ctx.audit
            .denied(AuditAction::AdminDeleted, &caller.id_hex(), target.id_hex())
            .await;
        return Err(CafeError::Unauthorized("Only a head admin can delete admins".into()));
    }

    let deleted = ctx
        .stores
        .admins
        .delete_one(doc! { "_id": target._id })
        .await?;
    if deleted == 0 {
        return Err(CafeError::NotFound("Admin was already deleted".into()));
    }

    // Drop the victim from any point roster
    ctx.stores
        .points
        .update_many(
            doc! { "supervisors": target.id_hex() },
            doc! { "$pull": { "supervisors": target.id_hex() } },
        )
        .await?;

    info!(admin_id = %target.id_hex(), by = %caller.id_hex(), "Admin deleted");
    ctx.audit
        .success(AuditAction::AdminDeleted, &caller.id_hex(), target.id_hex())
        .await;

    Ok(AdminView::from(&target))
}

/// Every admin with its decrypted token. Head only.
pub async fn get_all(ctx: &Context, req: TokenRequest) -> Result<Vec<AdminWithToken>> {
    require(&req.token, "token")?;

    let caller = ctx.auth.find_admin(&req.token).await?;
    ctx.auth
        .ensure(&caller, Capability::Head)
        .map_err(|_| CafeError::Unauthorized("Only a head admin can list admins".into()))?;

    let key = ctx.keys.key_for(KeyCollection::Admins)?;
    let admins = ctx.stores.admins.find_all().await?;

    Ok(admins
        .iter()
        .map(|admin| AdminWithToken {
            admin: AdminView::from(admin),
            token: decrypt_field(&admin.token, key).ok().map(|t| t.to_string()),
        })
        .collect())
}

/// Give `token2`'s holder a new token and return it. Head only.
pub async fn rotate(ctx: &Context, req: TwoTokenRequest) -> Result<AdminWithToken> {
    require(&req.token1, "token1")?;
    require(&req.token2, "token2")?;

    let caller = ctx.auth.find_admin(&req.token1).await?;
    let target = ctx.auth.find_admin(&req.token2).await?;
    if !ctx.auth.authorize(&caller, Capability::Head) {
        ctx.audit
            .denied(AuditAction::TokenRotated, &caller.id_hex(), target.id_hex())
            .await;
        return Err(CafeError::Unauthorized("Only a head admin can rotate tokens".into()));
    }

    let issued = ctx.auth.rotate(&target).await?;
    ctx.audit
        .success(AuditAction::TokenRotated, &caller.id_hex(), target.id_hex())
        .await;

    Ok(AdminWithToken {
        admin: AdminView::from(&target),
        token: Some(issued.plaintext.to_string()),
    })
}
