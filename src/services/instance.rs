//! Deployment-wide instance configuration and its backups
//!
//! Exactly one document has `isBackup = false`; it is what `Load` returns.
//! Every other document is a backup that can be restored over it.

use bson::{doc, oid::ObjectId};
use serde::Deserialize;
use tracing::info;

use crate::auth::Capability;
use crate::db::{AdminDoc, InstanceDoc, Metadata};
use crate::logging::AuditAction;
use crate::services::{require, Context};
use crate::types::{CafeError, Result};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlashRequest {
    #[serde(default)]
    pub token: String,
    pub instance: Option<InstanceDoc>,
}

/// Names an instance document by its ObjectId hex
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdRequest {
    #[serde(default)]
    pub token: String,
    #[serde(default, alias = "_id")]
    pub id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenRequest {
    #[serde(default)]
    pub token: String,
}

async fn require_head(ctx: &Context, token: &str) -> Result<AdminDoc> {
    require(token, "token")?;
    let caller = ctx.auth.require_admin(token).await?;
    ctx.auth.ensure(&caller, Capability::Head)?;
    Ok(caller)
}

fn parse_id(id: &str) -> Result<ObjectId> {
    require(id, "id")?;
    ObjectId::parse_str(id.trim())
        .map_err(|_| CafeError::InvalidArgument(format!("'{id}' is not a valid instance id")))
}

async fn find(ctx: &Context, id: ObjectId) -> Result<InstanceDoc> {
    ctx.stores
        .instances
        .find_one(doc! { "_id": id })
        .await?
        .ok_or_else(|| CafeError::NotFound(format!("Instance {id} not found")))
}

/// The live instance, if one was flashed
pub async fn live(ctx: &Context) -> Result<Option<InstanceDoc>> {
    ctx.stores
        .instances
        .find_one(doc! { "isBackup": false })
        .await
}

/// Public read of the live instance
pub async fn load(ctx: &Context) -> Result<InstanceDoc> {
    live(ctx)
        .await?
        .ok_or_else(|| CafeError::NotFound("The instance has not been set up".into()))
}

/// Replace the live instance. Head only.
pub async fn flash(ctx: &Context, req: FlashRequest) -> Result<InstanceDoc> {
    require(&req.token, "token")?;
    let instance = req
        .instance
        .ok_or_else(|| CafeError::InvalidArgument("'instance' is required".into()))?;
    if instance.is_backup {
        return Err(CafeError::InvalidArgument(
            "A backup cannot be flashed as the live instance".into(),
        ));
    }
    if instance.cultures.is_empty() {
        return Err(CafeError::InvalidArgument(
            "The instance needs at least one culture".into(),
        ));
    }
    if instance.cultures.iter().any(|c| c.trim().is_empty()) {
        return Err(CafeError::InvalidArgument("Cultures cannot be blank".into()));
    }

    let caller = require_head(ctx, &req.token).await?;
    let flashed = replace_live(ctx, instance).await?;

    ctx.audit
        .success(AuditAction::InstanceFlashed, &caller.id_hex(), id_hex(&flashed))
        .await;
    Ok(flashed)
}

async fn replace_live(ctx: &Context, mut instance: InstanceDoc) -> Result<InstanceDoc> {
    let removed = ctx
        .stores
        .instances
        .delete_many(doc! { "isBackup": false })
        .await?;

    instance._id = None;
    instance.is_backup = false;
    instance.metadata = Metadata::new();
    instance._id = Some(ctx.stores.instances.insert_one(instance.clone()).await?);

    info!(replaced = removed, cultures = ?instance.cultures, "Instance flashed");
    Ok(instance)
}

fn id_hex(instance: &InstanceDoc) -> String {
    instance._id.map(|id| id.to_hex()).unwrap_or_default()
}

/// Store a backup copy of an instance. Head only.
pub async fn copy(ctx: &Context, req: IdRequest) -> Result<InstanceDoc> {
    let id = parse_id(&req.id)?;
    let caller = require_head(ctx, &req.token).await?;

    let mut backup = find(ctx, id).await?;
    backup._id = None;
    backup.is_backup = true;
    backup.metadata = Metadata::new();
    backup._id = Some(ctx.stores.instances.insert_one(backup.clone()).await?);

    ctx.audit
        .success(AuditAction::InstanceCopied, &caller.id_hex(), id_hex(&backup))
        .await;
    Ok(backup)
}

/// Flash a backup as the live instance. The backup itself is kept.
pub async fn restore(ctx: &Context, req: IdRequest) -> Result<InstanceDoc> {
    let id = parse_id(&req.id)?;
    let caller = require_head(ctx, &req.token).await?;

    let backup = find(ctx, id).await?;
    if !backup.is_backup {
        return Err(CafeError::InvalidArgument(
            "Only a backup can be restored".into(),
        ));
    }
    let restored = replace_live(ctx, backup).await?;

    ctx.audit
        .success(AuditAction::InstanceRestored, &caller.id_hex(), id.to_hex())
        .await;
    Ok(restored)
}

/// Delete a backup. The live instance cannot be deleted.
pub async fn delete(ctx: &Context, req: IdRequest) -> Result<()> {
    let id = parse_id(&req.id)?;
    let caller = require_head(ctx, &req.token).await?;

    let target = find(ctx, id).await?;
    if !target.is_backup {
        return Err(CafeError::InvalidArgument(
            "The live instance cannot be deleted".into(),
        ));
    }
    ctx.stores.instances.delete_one(doc! { "_id": id }).await?;

    ctx.audit
        .success(AuditAction::InstanceDeleted, &caller.id_hex(), id.to_hex())
        .await;
    Ok(())
}

/// Every backup. Head only.
pub async fn backups(ctx: &Context, req: TokenRequest) -> Result<Vec<InstanceDoc>> {
    require_head(ctx, &req.token).await?;
    ctx.stores
        .instances
        .find_many(doc! { "isBackup": true })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::services::admins::create_admin;
    use std::collections::BTreeMap;

    async fn head(ctx: &Context) -> String {
        let (_, issued) = create_admin(ctx, "Owner", vec![Role::Head], None).await.unwrap();
        issued.plaintext.to_string()
    }

    fn sample(name: &str) -> InstanceDoc {
        InstanceDoc {
            cultures: vec!["en".into()],
            logo: "logo.png".into(),
            name: BTreeMap::from([("en".to_string(), name.to_string())]),
            ..Default::default()
        }
    }

    async fn flash_sample(ctx: &Context, token: &str, name: &str) -> InstanceDoc {
        flash(
            ctx,
            FlashRequest {
                token: token.to_string(),
                instance: Some(sample(name)),
            },
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_load_before_flash() {
        let ctx = Context::in_memory();
        assert!(matches!(load(&ctx).await, Err(CafeError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_flash_replaces_live() {
        let ctx = Context::in_memory();
        let token = head(&ctx).await;

        flash_sample(&ctx, &token, "Bean There").await;
        flash_sample(&ctx, &token, "Brew Haven").await;

        let live = load(&ctx).await.unwrap();
        assert_eq!(live.name["en"], "Brew Haven");
        assert_eq!(ctx.stores.instances.find_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_flash_validation() {
        let ctx = Context::in_memory();
        let token = head(&ctx).await;

        let mut backup = sample("x");
        backup.is_backup = true;
        let result = flash(
            &ctx,
            FlashRequest {
                token: token.clone(),
                instance: Some(backup),
            },
        )
        .await;
        assert!(matches!(result, Err(CafeError::InvalidArgument(_))));

        // A blank entry would become the primary culture
        let mut blank_first = sample("x");
        blank_first.cultures = vec!["".into(), "en".into()];
        let result = flash(
            &ctx,
            FlashRequest {
                token: token.clone(),
                instance: Some(blank_first),
            },
        )
        .await;
        assert!(matches!(result, Err(CafeError::InvalidArgument(_))));
        assert!(matches!(load(&ctx).await, Err(CafeError::NotFound(_))));

        let (_, general) = create_admin(&ctx, "Gen", vec![Role::General], None).await.unwrap();
        let result = flash(
            &ctx,
            FlashRequest {
                token: general.plaintext.to_string(),
                instance: Some(sample("x")),
            },
        )
        .await;
        assert!(matches!(result, Err(CafeError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_copy_restore_delete() {
        let ctx = Context::in_memory();
        let token = head(&ctx).await;
        let original = flash_sample(&ctx, &token, "Bean There").await;

        let backup = copy(
            &ctx,
            IdRequest {
                token: token.clone(),
                id: id_hex(&original),
            },
        )
        .await
        .unwrap();
        assert!(backup.is_backup);
        assert_ne!(backup._id, original._id);

        flash_sample(&ctx, &token, "Brew Haven").await;
        restore(
            &ctx,
            IdRequest {
                token: token.clone(),
                id: id_hex(&backup),
            },
        )
        .await
        .unwrap();
        assert_eq!(load(&ctx).await.unwrap().name["en"], "Bean There");

        let listed = backups(&ctx, TokenRequest { token: token.clone() }).await.unwrap();
        assert_eq!(listed.len(), 1);

        // The live instance is protected
        let live = load(&ctx).await.unwrap();
        let refused = delete(
            &ctx,
            IdRequest {
                token: token.clone(),
                id: id_hex(&live),
            },
        )
        .await;
        assert!(matches!(refused, Err(CafeError::InvalidArgument(_))));

        delete(
            &ctx,
            IdRequest {
                token: token.clone(),
                id: id_hex(&backup),
            },
        )
        .await
        .unwrap();
        assert!(backups(&ctx, TokenRequest { token }).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_bad_ids() {
        let ctx = Context::in_memory();
        let token = head(&ctx).await;

        let malformed = copy(
            &ctx,
            IdRequest {
                token: token.clone(),
                id: "xyz".into(),
            },
        )
        .await;
        assert!(matches!(malformed, Err(CafeError::InvalidArgument(_))));

        let unknown = restore(
            &ctx,
            IdRequest {
                token,
                id: ObjectId::new().to_hex(),
            },
        )
        .await;
        assert!(matches!(unknown, Err(CafeError::NotFound(_))));
    }
}
