//! Access Gate
//!
//! Resolves caller identity from an opaque credential and enforces the
//! "identity required" rule for every operation. Credential verification
//! itself lives behind the [`IdentityResolver`] boundary.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::domain::{EntityStore, User};
use crate::shared::error::AppError;

/// Identity of an authenticated caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub user_id: i64,
}

/// Per-call authentication context
///
/// Anonymous contexts are valid values; operations that need a caller
/// reject them through [`AuthContext::require`].
#[derive(Debug, Clone, Default)]
pub struct AuthContext {
    identity: Option<Identity>,
}

impl AuthContext {
    /// Context with no caller identity
    pub fn anonymous() -> Self {
        Self { identity: None }
    }

    /// Context for a known caller
    pub fn authenticated(user_id: i64) -> Self {
        Self {
            identity: Some(Identity { user_id }),
        }
    }

    /// The caller identity, if any
    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// Require an authenticated caller
    pub fn require(&self) -> Result<&Identity, AppError> {
        self.identity
            .as_ref()
            .ok_or_else(|| AppError::Unauthenticated("Authentication required".to_string()))
    }
}

/// Resolves an opaque credential to a caller identity
///
/// Token formats, signature checks, and session storage are the
/// resolver's concern; the core only consumes the result.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// Resolve a credential, returning `None` when it is invalid or expired
    async fn resolve(&self, credential: &str) -> Option<Identity>;
}

/// Builds authentication contexts for inbound operations
pub struct AccessGate<S: EntityStore> {
    resolver: Arc<dyn IdentityResolver>,
    store: Arc<S>,
}

impl<S: EntityStore> AccessGate<S> {
    pub fn new(resolver: Arc<dyn IdentityResolver>, store: Arc<S>) -> Self {
        Self { resolver, store }
    }

    /// Resolve an optional credential into an [`AuthContext`]
    ///
    /// A missing credential yields an anonymous context. A credential that
    /// fails to resolve, or resolves to a user no longer present in the
    /// store, is rejected with `Unauthenticated`.
    pub async fn context(&self, credential: Option<&str>) -> Result<AuthContext, AppError> {
        let Some(credential) = credential else {
            return Ok(AuthContext::anonymous());
        };

        let identity = self
            .resolver
            .resolve(credential)
            .await
            .ok_or_else(|| AppError::Unauthenticated("Invalid credential".to_string()))?;

        // The resolver can outlive the user record; confirm it still exists
        let user: Option<User> = self.store.get(identity.user_id).await?;
        if user.is_none() {
            tracing::warn!(user_id = identity.user_id, "Credential resolved to unknown user");
            return Err(AppError::Unauthenticated("Unknown user".to_string()));
        }

        Ok(AuthContext::authenticated(identity.user_id))
    }
}

/// Fixed token-table resolver for embedding and tests
#[derive(Debug, Default)]
pub struct StaticTokenResolver {
    tokens: DashMap<String, i64>,
}

impl StaticTokenResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a token for a user
    pub fn insert_token(&self, token: impl Into<String>, user_id: i64) {
        self.tokens.insert(token.into(), user_id);
    }

    /// Remove a token; subsequent resolutions fail
    pub fn revoke_token(&self, token: &str) {
        self.tokens.remove(token);
    }
}

#[async_trait]
impl IdentityResolver for StaticTokenResolver {
    async fn resolve(&self, credential: &str) -> Option<Identity> {
        self.tokens.get(credential).map(|entry| Identity {
            user_id: *entry.value(),
        })
    }
}
