//! Bearer credential sourcing for the scan service.
//!
//! The executor asks a [`CredentialProvider`] for a token immediately before
//! each request. Providers are free to rotate tokens underneath; the executor
//! never caches them.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Current bearer token, or `None` when the user is signed out.
    async fn bearer_token(&self) -> Option<String>;
}

/// Shared mutable token slot.
///
/// Shells update it on login/logout; clones hand the same slot to the
/// executor.
#[derive(Clone, Default)]
pub struct TokenCell {
    token: Arc<RwLock<Option<String>>>,
}

impl TokenCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set(&self, token: Option<String>) {
        *self.token.write().await = token;
    }

    pub async fn get(&self) -> Option<String> {
        self.token.read().await.clone()
    }
}

impl fmt::Debug for TokenCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never log token material.
        f.debug_struct("TokenCell")
            .field("has_token", &self.token.try_read().map(|t| t.is_some()))
            .finish()
    }
}

#[async_trait]
impl CredentialProvider for TokenCell {
    async fn bearer_token(&self) -> Option<String> {
        self.get().await
    }
}

/// Fixed credential, mostly for tests and one-shot tools.
#[derive(Debug, Clone)]
pub struct StaticCredentials {
    token: Option<String>,
}

impl StaticCredentials {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
        }
    }

    pub fn anonymous() -> Self {
        Self { token: None }
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentials {
    async fn bearer_token(&self) -> Option<String> {
        self.token.clone()
    }
}
