use std::sync::{Arc, Weak};

use tracing::debug;

use super::principal::{Claims, Principal, ProviderUser};
use super::provider::{AuthChangeHandler, IdentityProvider, SubscriptionId, UserCredential};
use crate::error::SyncResult;

/// Thin handle over an identity provider. Cheap to clone.
#[derive(Clone)]
pub struct IdentitySession {
    provider: Arc<dyn IdentityProvider>,
}

impl IdentitySession {
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self { Self { provider } }

    pub fn current_principal_or_null(&self) -> Option<Principal> {
        self.provider.current_user().as_ref().map(Principal::from_user)
    }

    /// Register `handler`; it fires immediately with the current state.
    pub fn subscribe(&self, handler: AuthChangeHandler) -> Subscription {
        let id = self.provider.on_change(handler);
        debug!(target: "usersync::identity", "subscribe id={}", id);
        Subscription { provider: Arc::downgrade(&self.provider), id, active: true }
    }

    pub async fn sign_in_interactive(&self) -> SyncResult<UserCredential> {
        Ok(self.provider.sign_in_interactive().await?)
    }

    pub async fn sign_in_with_credential(
        &self,
        id_token: Option<&str>,
        access_token: Option<&str>,
    ) -> SyncResult<UserCredential> {
        Ok(self.provider.sign_in_with_credential(id_token, access_token).await?)
    }

    pub async fn sign_out(&self) -> SyncResult<()> {
        Ok(self.provider.sign_out().await?)
    }

    pub async fn fresh_claims(&self, user: &ProviderUser) -> SyncResult<Claims> {
        Ok(self.provider.fresh_claims(user).await?)
    }
}

/// Live change subscription. Dropping it unsubscribes.
pub struct Subscription {
    provider: Weak<dyn IdentityProvider>,
    id: SubscriptionId,
    active: bool,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId { self.id }

    pub fn unsubscribe(mut self) { self.release(); }

    fn release(&mut self) {
        if !self.active { return; }
        self.active = false;
        if let Some(p) = self.provider.upgrade() {
            p.unsubscribe(self.id);
            debug!(target: "usersync::identity", "unsubscribe id={}", self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) { self.release(); }
}
