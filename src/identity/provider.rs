use std::sync::Arc;

use async_trait::async_trait;

use super::principal::{Claims, ProviderUser};
use crate::error::ProviderError;

/// Credential material returned by a successful sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserCredential {
    pub provider_id: String,
    pub user: ProviderUser,
    pub id_token: Option<String>,
    pub access_token: Option<String>,
    /// Reported by the provider for first-time sign-ins; `None` when unknown.
    pub is_new_user: Option<bool>,
}

/// Callback invoked with the provider's current user (or `None`) on every change.
pub type AuthChangeHandler = Arc<dyn Fn(Option<ProviderUser>) + Send + Sync>;

pub type SubscriptionId = u64;

/// Boundary to an external identity provider.
///
/// `on_change` must deliver the provider's current state to the new handler once
/// right away, then again on every sign-in, sign-out and token refresh.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    fn current_user(&self) -> Option<ProviderUser>;

    fn on_change(&self, handler: AuthChangeHandler) -> SubscriptionId;

    fn unsubscribe(&self, id: SubscriptionId);

    /// Run the interactive consent flow.
    async fn sign_in_interactive(&self) -> Result<UserCredential, ProviderError>;

    async fn sign_in_with_credential(
        &self,
        id_token: Option<&str>,
        access_token: Option<&str>,
    ) -> Result<UserCredential, ProviderError>;

    async fn sign_out(&self) -> Result<(), ProviderError>;

    /// Force a token refresh and return its claims; never served from cache.
    async fn fresh_claims(&self, user: &ProviderUser) -> Result<Claims, ProviderError>;
}
