//! Loyalty cards
//!
//! A card number is stored twice: encrypted with the cards key for display
//! to its owner, and as a SHA-256 hash for lookup. The owner's customer
//! document keeps its own copy encrypted with the customers key.

use bson::doc;
use rand::rngs::OsRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::crypto::{decrypt_field, encrypt_field, KeyCollection};
use crate::db::{card_hash, CardDoc, Metadata};
use crate::logging::AuditAction;
use crate::services::customers::{authenticate, EmailPasswordRequest};
use crate::services::{require, Context};
use crate::types::{CafeError, Result};

/// Card numbers have exactly this many decimal digits
const NUMBER_DIGITS: u32 = 16;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    #[serde(default, alias = "id")]
    pub number: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmountRequest {
    #[serde(default, alias = "id")]
    pub number: i64,
    #[serde(default)]
    pub token: String,
    #[serde(default, alias = "toRetract")]
    pub amount: i64,
}

/// Result of a card lookup
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CardStatus {
    pub id: i64,
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance: Option<i64>,
}

impl CardStatus {
    fn invalid(number: i64) -> Self {
        Self {
            id: number,
            valid: false,
            balance: None,
        }
    }
}

fn random_number() -> i64 {
    let low = 10_i64.pow(NUMBER_DIGITS - 1);
    let high = 10_i64.pow(NUMBER_DIGITS) - 1;
    OsRng.gen_range(low..=high)
}

fn require_number(number: i64) -> Result<()> {
    if number <= 0 {
        return Err(CafeError::InvalidArgument("'id' is required".into()));
    }
    Ok(())
}

async fn by_number(ctx: &Context, number: i64) -> Result<Option<CardDoc>> {
    ctx.stores
        .cards
        .find_one(doc! { "hash": card_hash(number) })
        .await
}

/// Issue the customer's card and return its number. One card per customer.
pub async fn issue(ctx: &Context, req: EmailPasswordRequest) -> Result<CardStatus> {
    let customer = authenticate(ctx, &req.email, &req.password).await?;
    if customer.card.is_some() {
        return Err(CafeError::Conflict("This customer already has a card".into()));
    }

    let number = loop {
        let candidate = random_number();
        if by_number(ctx, candidate).await?.is_none() {
            break candidate;
        }
    };

    let card = CardDoc {
        _id: None,
        metadata: Metadata::new(),
        owner_iid: customer.internal_id,
        number: encrypt_field(&number.to_string(), ctx.keys.key_for(KeyCollection::Cards)?)?,
        hash: card_hash(number),
        balance: 0,
        orders: Vec::new(),
    };
    ctx.stores.cards.insert_one(card).await?;

    let customer_copy =
        encrypt_field(&number.to_string(), ctx.keys.key_for(KeyCollection::Customers)?)?;
    ctx.stores
        .customers
        .update_one(
            doc! { "internalId": customer.internal_id },
            doc! { "$set": { "card": customer_copy } },
        )
        .await?;

    let owner = customer.internal_id.to_string();
    info!(owner_iid = customer.internal_id, "Card issued");
    ctx.audit
        .success(AuditAction::CardIssued, &owner, owner.as_str())
        .await;

    Ok(CardStatus {
        id: number,
        valid: true,
        balance: Some(0),
    })
}

/// Look a card up by number. An unknown number yields `valid = false`.
pub async fn verify(ctx: &Context, req: VerifyRequest) -> Result<CardStatus> {
    require_number(req.number)?;
    Ok(match by_number(ctx, req.number).await? {
        Some(card) => CardStatus {
            id: req.number,
            valid: true,
            balance: Some(card.balance),
        },
        None => CardStatus::invalid(req.number),
    })
}

/// The customer's own card
pub async fn get(ctx: &Context, req: EmailPasswordRequest) -> Result<CardStatus> {
    let customer = authenticate(ctx, &req.email, &req.password).await?;
    let card = ctx
        .stores
        .cards
        .find_one(doc! { "ownerIid": customer.internal_id })
        .await?
        .ok_or_else(|| CafeError::NotFound("No card has been issued to this customer".into()))?;

    let plain = decrypt_field(&card.number, ctx.keys.key_for(KeyCollection::Cards)?)?;
    let number = plain
        .parse::<i64>()
        .map_err(|_| CafeError::Internal("Stored card number is not numeric".into()))?;
    verify(ctx, VerifyRequest { number }).await
}

/// Take points off a card
pub async fn retract(ctx: &Context, req: AmountRequest) -> Result<CardStatus> {
    change_balance(ctx, req, AuditAction::PointsRetracted).await
}

/// Add points to a card
pub async fn accrue(ctx: &Context, req: AmountRequest) -> Result<CardStatus> {
    change_balance(ctx, req, AuditAction::PointsAccrued).await
}

async fn change_balance(ctx: &Context, req: AmountRequest, action: AuditAction) -> Result<CardStatus> {
    require_number(req.number)?;
    require(&req.token, "token")?;
    if req.amount <= 0 {
        return Err(CafeError::InvalidArgument("'amount' must be positive".into()));
    }

    let caller = ctx.auth.require_admin(&req.token).await?;
    let card = by_number(ctx, req.number)
        .await?
        .ok_or_else(|| CafeError::NotFound("No such card".into()))?;

    let delta = match action {
        AuditAction::PointsRetracted => {
            if req.amount > card.balance {
                ctx.audit
                    .denied(action, &caller.id_hex(), card.owner_iid.to_string())
                    .await;
                return Err(CafeError::Conflict(
                    "Cannot retract more points than the card holds".into(),
                ));
            }
            -req.amount
        }
        _ => req.amount,
    };
    let balance = card
        .balance
        .checked_add(delta)
        .ok_or_else(|| CafeError::Conflict("Balance would overflow".into()))?;

    // Only applies if nobody changed the balance since it was read
    let matched = ctx
        .stores
        .cards
        .update_one(
            doc! { "hash": card.hash.as_str(), "balance": card.balance },
            doc! { "$inc": { "balance": delta } },
        )
        .await?;
    if matched == 0 {
        warn!(owner_iid = card.owner_iid, "Card balance changed concurrently");
        return Err(CafeError::Conflict(
            "The card balance changed, retry the operation".into(),
        ));
    }

    info!(owner_iid = card.owner_iid, delta, balance, "Card balance changed");
    ctx.audit
        .success(action, &caller.id_hex(), card.owner_iid.to_string())
        .await;

    Ok(CardStatus {
        id: req.number,
        valid: true,
        balance: Some(balance),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::services::admins::create_admin;
    use crate::services::customers::{register, RegisterRequest};

    fn credentials() -> EmailPasswordRequest {
        EmailPasswordRequest {
            email: "dana@example.com".into(),
            password: "espresso-please".into(),
        }
    }

    async fn customer_with_card(ctx: &Context) -> i64 {
        register(
            ctx,
            RegisterRequest {
                username: "dana".into(),
                email: "dana@example.com".into(),
                password: "espresso-please".into(),
            },
        )
        .await
        .unwrap();
        issue(ctx, credentials()).await.unwrap().id
    }

    async fn admin_token(ctx: &Context) -> String {
        let (_, issued) = create_admin(ctx, "Till", vec![Role::Supervisor], Some(1))
            .await
            .unwrap();
        issued.plaintext.to_string()
    }

    #[test]
    fn test_number_has_sixteen_digits() {
        for _ in 0..100 {
            assert_eq!(random_number().to_string().len(), 16);
        }
    }

    #[tokio::test]
    async fn test_issue_once() {
        let ctx = Context::in_memory();
        let number = customer_with_card(&ctx).await;

        let status = verify(&ctx, VerifyRequest { number }).await.unwrap();
        assert!(status.valid);
        assert_eq!(status.balance, Some(0));

        // Both stored copies are encrypted
        let card = by_number(&ctx, number).await.unwrap().unwrap();
        assert_ne!(card.number, number.to_string());

        assert!(matches!(
            issue(&ctx, credentials()).await,
            Err(CafeError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_get_returns_own_card() {
        let ctx = Context::in_memory();
        let number = customer_with_card(&ctx).await;

        let status = get(&ctx, credentials()).await.unwrap();
        assert_eq!(status.id, number);

        let mut wrong = credentials();
        wrong.password = "latte-please".into();
        assert!(matches!(
            get(&ctx, wrong).await,
            Err(CafeError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_verify_unknown() {
        let ctx = Context::in_memory();
        let status = verify(&ctx, VerifyRequest { number: 1234 }).await.unwrap();
        assert_eq!(status, CardStatus::invalid(1234));
        assert!(matches!(
            verify(&ctx, VerifyRequest::default()).await,
            Err(CafeError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_accrue_then_retract() {
        let ctx = Context::in_memory();
        let number = customer_with_card(&ctx).await;
        let token = admin_token(&ctx).await;

        let after = accrue(
            &ctx,
            AmountRequest {
                number,
                token: token.clone(),
                amount: 50,
            },
        )
        .await
        .unwrap();
        assert_eq!(after.balance, Some(50));

        let after = retract(
            &ctx,
            AmountRequest {
                number,
                token: token.clone(),
                amount: 20,
            },
        )
        .await
        .unwrap();
        assert_eq!(after.balance, Some(30));

        let too_much = retract(
            &ctx,
            AmountRequest {
                number,
                token,
                amount: 31,
            },
        )
        .await;
        assert!(matches!(too_much, Err(CafeError::Conflict(_))));
        assert_eq!(
            verify(&ctx, VerifyRequest { number }).await.unwrap().balance,
            Some(30)
        );
    }

    #[tokio::test]
    async fn test_balance_change_validation() {
        let ctx = Context::in_memory();
        let number = customer_with_card(&ctx).await;
        let token = admin_token(&ctx).await;

        let zero = accrue(
            &ctx,
            AmountRequest {
                number,
                token: token.clone(),
                amount: 0,
            },
        )
        .await;
        assert!(matches!(zero, Err(CafeError::InvalidArgument(_))));

        let stranger = accrue(
            &ctx,
            AmountRequest {
                number,
                token: "ghost".into(),
                amount: 5,
            },
        )
        .await;
        assert!(matches!(stranger, Err(CafeError::Unauthorized(_))));

        let unknown = accrue(
            &ctx,
            AmountRequest {
                number: 42,
                token,
                amount: 5,
            },
        )
        .await;
        assert!(matches!(unknown, Err(CafeError::NotFound(_))));
    }
}
