//! Business operations
//!
//! Each submodule owns one collection. Handlers validate their input,
//! resolve tokens through [`AuthCore`], evaluate a policy and then touch
//! the store. They return domain values; the HTTP layer turns them into
//! responses.

pub mod admins;
pub mod cards;
pub mod customers;
pub mod dishes;
pub mod instance;
pub mod issues;
pub mod menus;
pub mod points;
pub mod strings;

use rand::rngs::OsRng;
use rand::Rng;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::AuthCore;
use crate::crypto::{KeyProvider, StaticKeyProvider};
use crate::db::Stores;
use crate::logging::AuditLogger;
use crate::types::{CafeError, Result};

/// Everything an operation needs
#[derive(Clone)]
pub struct Context {
    pub stores: Stores,
    pub auth: AuthCore,
    pub keys: Arc<dyn KeyProvider>,
    pub audit: AuditLogger,
}

impl Context {
    pub fn new(
        stores: Stores,
        keys: Arc<dyn KeyProvider>,
        audit: AuditLogger,
        store_timeout: Duration,
    ) -> Self {
        let auth = AuthCore::scanning(stores.admins.clone(), keys.clone(), store_timeout);
        Self {
            stores,
            auth,
            keys,
            audit,
        }
    }

    /// Empty in-memory stores and fresh keys
    pub fn in_memory() -> Self {
        Self::new(
            Stores::in_memory(),
            Arc::new(StaticKeyProvider::generate()),
            AuditLogger::new("memory".to_string()),
            Duration::from_secs(5),
        )
    }
}

/// Fail with `InvalidArgument` when a required text field is blank.
pub(crate) fn require(value: &str, field: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(CafeError::InvalidArgument(format!("'{field}' is required")));
    }
    Ok(())
}

/// Fail with `InvalidArgument` when a numeric id is the `-1` placeholder
/// or otherwise negative.
pub(crate) fn require_id(value: i32, field: &str) -> Result<()> {
    if value < 0 {
        return Err(CafeError::InvalidArgument(format!("'{field}' is required")));
    }
    Ok(())
}

/// Draw random positive ids until `taken` reports a free one.
pub(crate) async fn unique_id<F, Fut>(mut taken: F) -> Result<i32>
where
    F: FnMut(i32) -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    loop {
        let candidate = OsRng.gen_range(1..=i32::MAX);
        if !taken(candidate).await? {
            return Ok(candidate);
        }
    }
}

/// Default for numeric ids missing from a request
pub(crate) fn missing_id() -> i32 {
    -1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require() {
        assert!(require("x", "name").is_ok());
        assert!(matches!(
            require("  ", "name"),
            Err(CafeError::InvalidArgument(_))
        ));
        assert!(require_id(0, "pid").is_ok());
        assert!(require_id(-1, "pid").is_err());
    }

    #[tokio::test]
    async fn test_unique_id_skips_taken() {
        let mut calls = 0;
        let id = unique_id(|_| {
            calls += 1;
            let taken = calls < 3;
            async move { Ok(taken) }
        })
        .await
        .unwrap();

        assert!(id > 0);
        assert_eq!(calls, 3);
    }
}
