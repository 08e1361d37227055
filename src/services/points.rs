//! Points (physical branches)
//!
//! Creating and deleting points is reserved to heads. A general admin
//! manages the point it is bound to, including its supervisor roster.

use bson::{doc, oid::ObjectId};
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::{info, warn};

use crate::auth::{Capability, Role};
use crate::db::{AdminDoc, PointDoc};
use crate::logging::AuditAction;
use crate::services::{missing_id, require, require_id, unique_id, Context};
use crate::types::{CafeError, Result};

// =============================================================================
// Request Types
// =============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPointRequest {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub token: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePointRequest {
    #[serde(default = "missing_id")]
    pub pid: i32,
    #[serde(default)]
    pub token: String,
    /// `address`, `+pic` or `-pic` to a value
    #[serde(default)]
    pub updates: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointTokenRequest {
    #[serde(default = "missing_id")]
    pub pid: i32,
    #[serde(default)]
    pub token: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffRequest {
    #[serde(default = "missing_id")]
    pub pid: i32,
    #[serde(default)]
    pub token1: String,
    #[serde(default)]
    pub token2: String,
    /// `hire` or `fire`
    #[serde(default)]
    pub action: String,
}

/// One validated change to a point
enum PointUpdate {
    Address(String),
    AddPic(String),
    RemovePic(String),
}

fn parse_update(key: &str, value: &str) -> Result<PointUpdate> {
    let pic = |value: &str| {
        ObjectId::parse_str(value)
            .map(|oid| oid.to_hex())
            .map_err(|_| CafeError::InvalidArgument(format!("'{value}' is not a valid image id")))
    };

    match key {
        "address" => {
            require(value, "address")?;
            Ok(PointUpdate::Address(value.trim().to_string()))
        }
        "+pic" => Ok(PointUpdate::AddPic(pic(value)?)),
        "-pic" => Ok(PointUpdate::RemovePic(pic(value)?)),
        other => Err(CafeError::InvalidArgument(format!(
            "Unknown point update '{other}'"
        ))),
    }
}

// =============================================================================
// Operations
// =============================================================================

async fn load(ctx: &Context, pid: i32) -> Result<PointDoc> {
    ctx.stores
        .points
        .find_one(doc! { "pointId": pid })
        .await?
        .ok_or_else(|| CafeError::NotFound(format!("Point {pid} not found")))
}

/// Create a point with a random id. Head only.
pub async fn new_point(ctx: &Context, req: NewPointRequest) -> Result<PointDoc> {
    require(&req.address, "address")?;
    require(&req.token, "token")?;

    let caller = ctx.auth.require_admin(&req.token).await?;
    ctx.auth.ensure(&caller, Capability::Head)?;

    let points = ctx.stores.points.clone();
    let pid = unique_id(|candidate| {
        let points = points.clone();
        async move { Ok(points.find_one(doc! { "pointId": candidate }).await?.is_some()) }
    })
    .await?;

    let mut point = PointDoc::new(pid, req.address.trim().to_string());
    point._id = Some(ctx.stores.points.insert_one(point.clone()).await?);

    info!(point_id = pid, "Point created");
    ctx.audit
        .success(AuditAction::PointCreated, &caller.id_hex(), pid.to_string())
        .await;
    Ok(point)
}

/// Apply address and picture changes. Only the general bound to the point
/// may do this. Every update is validated before any is applied.
pub async fn update(ctx: &Context, req: UpdatePointRequest) -> Result<PointDoc> {
    require(&req.token, "token")?;
    require_id(req.pid, "pid")?;
    if req.updates.is_empty() {
        return Err(CafeError::InvalidArgument("'updates' is required".into()));
    }

    let caller = ctx.auth.require_admin(&req.token).await?;
    ctx.auth.ensure(&caller, Capability::GeneralBoundTo(req.pid))?;

    let point = load(ctx, req.pid).await?;
    let updates = req
        .updates
        .iter()
        .map(|(k, v)| parse_update(k, v))
        .collect::<Result<Vec<_>>>()?;

    // Replay picture changes on a copy so a failing batch writes nothing
    let mut pics = point.pics;
    for change in &updates {
        match change {
            PointUpdate::AddPic(pic) => pics.push(pic.clone()),
            PointUpdate::RemovePic(pic) => {
                if pics.is_empty() {
                    return Err(CafeError::Conflict(
                        "Cannot remove a picture from a point with no pictures".into(),
                    ));
                }
                pics.retain(|p| p != pic);
            }
            PointUpdate::Address(_) => {}
        }
    }

    let filter = doc! { "pointId": req.pid };
    for change in updates {
        let update = match change {
            PointUpdate::Address(address) => doc! { "$set": { "address": address } },
            PointUpdate::AddPic(pic) => doc! { "$push": { "pics": pic } },
            PointUpdate::RemovePic(pic) => doc! { "$pull": { "pics": pic } },
        };
        ctx.stores.points.update_one(filter.clone(), update).await?;
    }

    load(ctx, req.pid).await
}

/// Delete a point and unbind everyone bound to it. Head only.
pub async fn delete(ctx: &Context, req: PointTokenRequest) -> Result<()> {
    require_id(req.pid, "pid")?;
    require(&req.token, "token")?;

    let caller = ctx.auth.require_admin(&req.token).await?;
    ctx.auth.ensure(&caller, Capability::Head)?;
    load(ctx, req.pid).await?;

    let unbound = ctx
        .stores
        .admins
        .update_many(
            doc! { "boundTo": req.pid },
            doc! { "$set": { "boundTo": crate::db::schemas::UNBOUND } },
        )
        .await?;
    ctx.stores
        .points
        .delete_one(doc! { "pointId": req.pid })
        .await?;

    info!(point_id = req.pid, unbound, "Point deleted");
    ctx.audit
        .success(AuditAction::PointDeleted, &caller.id_hex(), req.pid.to_string())
        .await;
    Ok(())
}

/// Can `caller` hire or fire `target` at `pid`?
fn may_staff(ctx: &Context, caller: &AdminDoc, target: &AdminDoc, pid: i32) -> bool {
    let branch_manager = ctx.auth.authorize(caller, Capability::GeneralBoundTo(pid))
        && target.has_role(Role::Supervisor);
    let head = ctx.auth.authorize(caller, Capability::Head)
        && (target.has_role(Role::General) || target.has_role(Role::Supervisor));
    branch_manager || head
}

/// Hire `token2`'s holder to the point or fire them from it.
pub async fn staff(ctx: &Context, req: StaffRequest) -> Result<PointDoc> {
    require_id(req.pid, "pid")?;
    require(&req.token1, "token1")?;
    require(&req.token2, "token2")?;
    require(&req.action, "action")?;

    let caller = ctx.auth.find_admin(&req.token1).await?;
    let target = ctx.auth.find_admin(&req.token2).await?;

    let action = match req.action.as_str() {
        "hire" => AuditAction::StaffHired,
        "fire" => AuditAction::StaffFired,
        other => {
            return Err(CafeError::InvalidArgument(format!(
                "Unknown staff action '{other}', expected hire or fire"
            )))
        }
    };

    if !may_staff(ctx, &caller, &target, req.pid) {
        warn!(admin_id = %caller.id_hex(), point_id = req.pid, "Staff change refused");
        ctx.audit.denied(action, &caller.id_hex(), target.id_hex()).await;
        return Err(CafeError::Unauthorized(
            "Not allowed to change staff at this point".into(),
        ));
    }

    let point = load(ctx, req.pid).await?;
    let target_id = target.id_hex();
    let staffed = point.supervisors.contains(&target_id);

    match action {
        AuditAction::StaffHired => {
            if staffed {
                return Err(CafeError::Conflict("Admin already works at this point".into()));
            }
            // Leave the previous point's roster first
            if let Some(previous) = target.bound_point().filter(|p| *p != req.pid) {
                ctx.stores
                    .points
                    .update_one(
                        doc! { "pointId": previous },
                        doc! { "$pull": { "supervisors": target_id.as_str() } },
                    )
                    .await?;
            }
            ctx.stores
                .points
                .update_one(
                    doc! { "pointId": req.pid },
                    doc! { "$push": { "supervisors": target_id.as_str() } },
                )
                .await?;
            ctx.stores
                .admins
                .update_one(
                    doc! { "_id": target._id },
                    doc! { "$set": { "boundTo": req.pid } },
                )
                .await?;
        }
        _ => {
            if !staffed && target.bound_point() != Some(req.pid) {
                return Err(CafeError::Conflict("Admin does not work at this point".into()));
            }
            ctx.stores
                .points
                .update_one(
                    doc! { "pointId": req.pid },
                    doc! { "$pull": { "supervisors": target_id.as_str() } },
                )
                .await?;
            ctx.stores
                .admins
                .update_one(
                    doc! { "_id": target._id },
                    doc! { "$set": { "boundTo": crate::db::schemas::UNBOUND } },
                )
                .await?;
        }
    }

    info!(point_id = req.pid, admin_id = %target_id, action = %req.action, "Staff changed");
    ctx.audit.success(action, &caller.id_hex(), target_id).await;
    load(ctx, req.pid).await
}

/// Public lookup by id
pub async fn get(ctx: &Context, pid: i32) -> Result<PointDoc> {
    if pid == missing_id() {
        return Err(CafeError::InvalidArgument("Point -1 cannot exist".into()));
    }
    load(ctx, pid).await
}

pub async fn get_all(ctx: &Context) -> Result<Vec<PointDoc>> {
    ctx.stores.points.find_all().await
}
