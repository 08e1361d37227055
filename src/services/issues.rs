//! Issue tickets raised by supervisors at their point

use bson::{doc, DateTime};
use serde::Deserialize;
use tracing::info;

use crate::auth::{Capability, Role};
use crate::db::{IssueDoc, Metadata};
use crate::services::{missing_id, require, require_id, unique_id, Context};
use crate::types::{CafeError, Result};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RaiseRequest {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub contacts: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModifyRequest {
    #[serde(default)]
    pub token: String,
    /// `close`, `+monitor` or `-monitor`
    #[serde(default)]
    pub action: String,
    #[serde(default = "missing_id")]
    pub issue_id: i32,
}

/// Open an issue at the caller's point. Supervisors only.
pub async fn raise(ctx: &Context, req: RaiseRequest) -> Result<IssueDoc> {
    require(&req.token, "token")?;
    require(&req.title, "title")?;
    require(&req.description, "description")?;

    let caller = ctx.auth.require_admin(&req.token).await?;
    if !caller.has_role(Role::Supervisor) {
        return Err(CafeError::Unauthorized("Only supervisors raise issues".into()));
    }
    let point = caller.bound_point().ok_or_else(|| {
        CafeError::Conflict("Supervisor is not bound to a point".into())
    })?;

    let issues = ctx.stores.issues.clone();
    let issue_id = unique_id(|candidate| {
        let issues = issues.clone();
        async move { Ok(issues.find_one(doc! { "issueId": candidate }).await?.is_some()) }
    })
    .await?;

    let mut issue = IssueDoc {
        _id: None,
        metadata: Metadata::new(),
        issue_id,
        is_active: true,
        is_monitored: false,
        raiser: caller.id_hex(),
        point: Some(point),
        when_raised: DateTime::now(),
        title: req.title.trim().to_string(),
        contacts: req.contacts.trim().to_string(),
        description: req.description.trim().to_string(),
    };
    issue._id = Some(ctx.stores.issues.insert_one(issue.clone()).await?);

    ctx.stores
        .points
        .update_one(
            doc! { "pointId": point },
            doc! { "$push": { "activeIssues": issue_id } },
        )
        .await?;

    info!(issue_id, point_id = point, raiser = %issue.raiser, "Issue raised");
    Ok(issue)
}

/// Every issue. Generals and heads only.
pub async fn get_all(ctx: &Context, token: &str) -> Result<Vec<IssueDoc>> {
    require(token, "token")?;
    let caller = ctx.auth.require_admin(token).await?;
    if !(caller.has_role(Role::General) || ctx.auth.is_head(&caller)) {
        return Err(CafeError::Unauthorized("Not allowed to list issues".into()));
    }
    ctx.stores.issues.find_all().await
}

/// Close an issue or toggle its monitoring flag.
pub async fn modify(ctx: &Context, req: ModifyRequest) -> Result<IssueDoc> {
    require(&req.token, "token")?;
    require(&req.action, "action")?;
    require_id(req.issue_id, "issueId")?;

    let caller = ctx.auth.require_admin(&req.token).await?;
    let filter = doc! { "issueId": req.issue_id };
    let issue = ctx
        .stores
        .issues
        .find_one(filter.clone())
        .await?
        .ok_or_else(|| CafeError::NotFound(format!("Issue {} not found", req.issue_id)))?;

    let at_point = issue
        .point
        .is_some_and(|p| ctx.auth.authorize(&caller, Capability::GeneralBoundTo(p)));
    if !(at_point
        || ctx.auth.authorize(&caller, Capability::SupervisorOf(&issue))
        || ctx.auth.authorize(&caller, Capability::Head))
    {
        return Err(CafeError::Unauthorized("Not allowed to modify this issue".into()));
    }

    let update = match req.action.as_str() {
        "close" => doc! { "$set": { "isActive": false } },
        "+monitor" => doc! { "$set": { "isMonitored": true } },
        "-monitor" => doc! { "$set": { "isMonitored": false } },
        other => {
            return Err(CafeError::InvalidArgument(format!(
                "Unknown issue action '{other}'"
            )))
        }
    };
    ctx.stores.issues.update_one(filter.clone(), update).await?;

    if req.action == "close" {
        if let Some(point) = issue.point {
            ctx.stores
                .points
                .update_one(
                    doc! { "pointId": point },
                    doc! { "$pull": { "activeIssues": req.issue_id } },
                )
                .await?;
        }
    }

    info!(issue_id = req.issue_id, action = %req.action, by = %caller.id_hex(), "Issue modified");
    ctx.stores
        .issues
        .find_one(filter)
        .await?
        .ok_or_else(|| CafeError::NotFound(format!("Issue {} not found", req.issue_id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::PointDoc;
    use crate::services::admins::create_admin;

    async fn seed(ctx: &Context, roles: Vec<Role>, bound: Option<i32>) -> String {
        let (_, issued) = create_admin(ctx, "staff", roles, bound).await.unwrap();
        issued.plaintext.to_string()
    }

    fn raise_request(token: &str) -> RaiseRequest {
        RaiseRequest {
            token: token.to_string(),
            title: "Grinder jammed".into(),
            contacts: "+1 555 0100".into(),
            description: "Grinder two stopped mid-shift".into(),
        }
    }

    #[tokio::test]
    async fn test_raise_records_point_and_raiser() {
        let ctx = Context::in_memory();
        ctx.stores
            .points
            .insert_one(PointDoc::new(7, "Main St".into()))
            .await
            .unwrap();
        let sprvsr = seed(&ctx, vec![Role::Supervisor], Some(7)).await;

        let issue = raise(&ctx, raise_request(&sprvsr)).await.unwrap();
        assert!(issue.is_active);
        assert_eq!(issue.point, Some(7));

        let point = ctx
            .stores
            .points
            .find_one(doc! { "pointId": 7 })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(point.active_issues, vec![issue.issue_id]);
    }

    #[tokio::test]
    async fn test_raise_requires_supervisor() {
        let ctx = Context::in_memory();
        let general = seed(&ctx, vec![Role::General], Some(7)).await;
        assert!(matches!(
            raise(&ctx, raise_request(&general)).await,
            Err(CafeError::Unauthorized(_))
        ));
        assert!(matches!(
            raise(&ctx, raise_request("ghost")).await,
            Err(CafeError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_get_all_policy() {
        let ctx = Context::in_memory();
        let sprvsr = seed(&ctx, vec![Role::Supervisor], Some(7)).await;
        let head = seed(&ctx, vec![Role::Head], None).await;
        raise(&ctx, raise_request(&sprvsr)).await.unwrap();

        assert_eq!(get_all(&ctx, &head).await.unwrap().len(), 1);
        assert!(matches!(
            get_all(&ctx, &sprvsr).await,
            Err(CafeError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_modify_by_raiser_and_general() {
        let ctx = Context::in_memory();
        ctx.stores
            .points
            .insert_one(PointDoc::new(7, "Main St".into()))
            .await
            .unwrap();
        let sprvsr = seed(&ctx, vec![Role::Supervisor], Some(7)).await;
        let general = seed(&ctx, vec![Role::General], Some(7)).await;
        let stranger = seed(&ctx, vec![Role::General], Some(8)).await;
        let issue = raise(&ctx, raise_request(&sprvsr)).await.unwrap();

        let monitored = modify(
            &ctx,
            ModifyRequest {
                token: sprvsr,
                action: "+monitor".into(),
                issue_id: issue.issue_id,
            },
        )
        .await
        .unwrap();
        assert!(monitored.is_monitored);

        let refused = modify(
            &ctx,
            ModifyRequest {
                token: stranger,
                action: "close".into(),
                issue_id: issue.issue_id,
            },
        )
        .await;
        assert!(matches!(refused, Err(CafeError::Unauthorized(_))));

        let closed = modify(
            &ctx,
            ModifyRequest {
                token: general,
                action: "close".into(),
                issue_id: issue.issue_id,
            },
        )
        .await
        .unwrap();
        assert!(!closed.is_active);

        let point = ctx
            .stores
            .points
            .find_one(doc! { "pointId": 7 })
            .await
            .unwrap()
            .unwrap();
        assert!(point.active_issues.is_empty());
    }

    #[tokio::test]
    async fn test_modify_unknown_issue_and_action() {
        let ctx = Context::in_memory();
        let head = seed(&ctx, vec![Role::Head], None).await;
        let sprvsr = seed(&ctx, vec![Role::Supervisor], Some(1)).await;
        let issue = raise(&ctx, raise_request(&sprvsr)).await.unwrap();

        let missing = modify(
            &ctx,
            ModifyRequest {
                token: head.clone(),
                action: "close".into(),
                issue_id: issue.issue_id.wrapping_add(1).max(0),
            },
        )
        .await;
        assert!(matches!(missing, Err(CafeError::NotFound(_))));

        let bad = modify(
            &ctx,
            ModifyRequest {
                token: head,
                action: "reopen".into(),
                issue_id: issue.issue_id,
            },
        )
        .await;
        assert!(matches!(bad, Err(CafeError::InvalidArgument(_))));
    }
}
