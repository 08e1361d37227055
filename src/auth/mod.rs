//! Authentication and authorization for OpenCafe
//!
//! Provides:
//! - Bearer token issuance and resolution for admins
//! - Role checks and capability evaluation
//! - Password hashing with Argon2 for customers
//!
//! Every handler that mutates a document goes through [`AuthCore`] first.

pub mod password;
pub mod resolver;
pub mod roles;
pub mod token;

use std::sync::Arc;
use std::time::Duration;

pub use password::{hash_password, validate_password, verify_password, MIN_PASSWORD_LEN};
pub use resolver::{ScanTokenResolver, TokenResolver};
pub use roles::{authorize, is_head, Capability, Role};
pub use token::{issue_token, IssuedToken, TOKEN_ALPHABET, TOKEN_LEN};

use crate::crypto::{KeyCollection, KeyProvider};
use crate::db::{AdminDoc, DocumentStore};
use crate::types::{CafeError, Result};

/// Token resolution, role checks and token issuance in one place.
///
/// Holds no state of its own beyond the resolver and the key provider.
#[derive(Clone)]
pub struct AuthCore {
    resolver: Arc<dyn TokenResolver>,
    keys: Arc<dyn KeyProvider>,
}

impl AuthCore {
    pub fn new(resolver: Arc<dyn TokenResolver>, keys: Arc<dyn KeyProvider>) -> Self {
        Self { resolver, keys }
    }

    /// AuthCore over the scanning resolver
    pub fn scanning(
        admins: Arc<dyn DocumentStore<AdminDoc>>,
        keys: Arc<dyn KeyProvider>,
        store_timeout: Duration,
    ) -> Self {
        let resolver = ScanTokenResolver::new(admins, keys.clone(), store_timeout);
        Self::new(Arc::new(resolver), keys)
    }

    /// The admin holding `token`, if any
    pub async fn resolve_token(&self, token: &str) -> Result<Option<AdminDoc>> {
        self.resolver.resolve(token).await
    }

    /// Resolve or fail with `Unauthorized`
    pub async fn require_admin(&self, token: &str) -> Result<AdminDoc> {
        self.resolve_token(token)
            .await?
            .ok_or_else(|| CafeError::Unauthorized("Unknown token".into()))
    }

    /// Resolve or fail with `NotFound`, for operations naming two admins
    pub async fn find_admin(&self, token: &str) -> Result<AdminDoc> {
        self.resolve_token(token)
            .await?
            .ok_or_else(|| CafeError::NotFound("Token holder was not found".into()))
    }

    pub fn is_head(&self, admin: &AdminDoc) -> bool {
        is_head(admin)
    }

    pub fn authorize(&self, admin: &AdminDoc, capability: Capability<'_>) -> bool {
        authorize(admin, capability)
    }

    /// Fail with `Unauthorized` unless the capability holds
    pub fn ensure(&self, admin: &AdminDoc, capability: Capability<'_>) -> Result<()> {
        if authorize(admin, capability) {
            Ok(())
        } else {
            Err(CafeError::Unauthorized(format!(
                "Admin {} lacks the required capability",
                admin.id_hex()
            )))
        }
    }

    /// A fresh token encrypted with the admins key
    pub fn issue_token(&self) -> Result<IssuedToken> {
        issue_token(self.keys.key_for(KeyCollection::Admins)?)
    }

    pub async fn rotate(&self, admin: &AdminDoc) -> Result<IssuedToken> {
        self.resolver.rotate(admin).await
    }

    pub async fn revoke(&self, admin: &AdminDoc) -> Result<()> {
        self.resolver.revoke(admin).await
    }
}
