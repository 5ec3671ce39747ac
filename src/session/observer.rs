use async_trait::async_trait;

use super::state::SessionState;
use crate::identity::ProviderUser;

/// Hooks run by every reconciliation cycle, in registration order.
#[async_trait]
pub trait SessionObserver: Send + Sync {
    /// Runs synchronously as soon as the provider reports a change, before claims
    /// are fetched. Instrumentation only: reconciliation never waits on it.
    fn on_raw_auth_changed(&self, _user: Option<&ProviderUser>) {}

    async fn on_connected(&self, _state: &SessionState) {}

    async fn on_disconnected(&self, _state: &SessionState) {}

    /// `false` once the observer's target is gone; the controller then drops it.
    fn is_alive(&self) -> bool { true }
}
