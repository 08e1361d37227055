//! Loyalty-program customers

use bson::doc;
use rand::rngs::OsRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::auth::{hash_password, validate_password, verify_password};
use crate::db::{CustomerDoc, Metadata};
use crate::services::{require, Context};
use crate::types::{CafeError, Result};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailPasswordRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// What a customer sees about themselves. No password hash, no card.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CustomerView {
    pub internal_id: i64,
    pub username: String,
    pub email: String,
    pub is_email_verified: bool,
    pub has_card: bool,
}

impl From<&CustomerDoc> for CustomerView {
    fn from(customer: &CustomerDoc) -> Self {
        Self {
            internal_id: customer.internal_id,
            username: customer.username.clone(),
            email: customer.email.clone(),
            is_email_verified: customer.is_email_verified,
            has_card: customer.card.is_some(),
        }
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

async fn by_email(ctx: &Context, email: &str) -> Result<Option<CustomerDoc>> {
    ctx.stores
        .customers
        .find_one(doc! { "email": normalize_email(email) })
        .await
}

pub async fn register(ctx: &Context, req: RegisterRequest) -> Result<CustomerView> {
    require(&req.username, "username")?;
    require(&req.email, "email")?;
    require(&req.password, "password")?;
    validate_password(&req.password)?;

    if by_email(ctx, &req.email).await?.is_some() {
        return Err(CafeError::Conflict(
            "A customer with this email already exists".into(),
        ));
    }

    let internal_id = loop {
        let candidate = OsRng.gen_range(1..=i64::MAX);
        let taken = ctx
            .stores
            .customers
            .find_one(doc! { "internalId": candidate })
            .await?
            .is_some();
        if !taken {
            break candidate;
        }
    };

    let customer = CustomerDoc {
        _id: None,
        metadata: Metadata::new(),
        internal_id,
        username: req.username.trim().to_string(),
        email: normalize_email(&req.email),
        is_email_verified: false,
        password: hash_password(&req.password)?,
        hearts: Vec::new(),
        reviews: Vec::new(),
        card: None,
    };
    ctx.stores.customers.insert_one(customer.clone()).await?;

    info!(internal_id, "Customer registered");
    Ok(CustomerView::from(&customer))
}

/// Check an email and password pair. Unknown email is `NotFound`, a wrong
/// password is `Unauthorized`.
pub(crate) async fn authenticate(ctx: &Context, email: &str, password: &str) -> Result<CustomerDoc> {
    require(email, "email")?;
    require(password, "password")?;

    let customer = by_email(ctx, email)
        .await?
        .ok_or_else(|| CafeError::NotFound("No customer with this email".into()))?;
    if !verify_password(password, &customer.password)? {
        return Err(CafeError::Unauthorized("Wrong password".into()));
    }
    Ok(customer)
}

pub async fn login(ctx: &Context, req: EmailPasswordRequest) -> Result<CustomerView> {
    let customer = authenticate(ctx, &req.email, &req.password).await?;
    info!(internal_id = customer.internal_id, "Customer logged in");
    Ok(CustomerView::from(&customer))
}
