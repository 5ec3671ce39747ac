//! In-process identity provider used by tests and the demo binary.
//! Change events are delivered synchronously to every handler, outside the lock.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use tracing::debug;

use super::principal::{Claims, ProviderUser};
use super::provider::{AuthChangeHandler, IdentityProvider, SubscriptionId, UserCredential};
use crate::error::ProviderError;
use crate::hold::{hold_pair, Hold, Parked};

const PROVIDER_ID: &str = "memory";

#[derive(Clone)]
struct ScriptedUser {
    user: ProviderUser,
    is_new: Option<bool>,
}

#[derive(Default)]
pub struct MemoryIdentityProvider {
    current: RwLock<Option<ProviderUser>>,
    handlers: RwLock<Vec<(SubscriptionId, AuthChangeHandler)>>,
    next_id: AtomicU64,
    interactive: Mutex<VecDeque<Result<ScriptedUser, ProviderError>>>,
    credentials: RwLock<HashMap<String, ScriptedUser>>,
    claims: RwLock<HashMap<String, serde_json::Map<String, serde_json::Value>>>,
    claims_failures: Mutex<VecDeque<ProviderError>>,
    claims_holds: Mutex<VecDeque<Parked>>,
    sign_out_failures: Mutex<VecDeque<ProviderError>>,
    claims_calls: AtomicUsize,
}

impl MemoryIdentityProvider {
    pub fn new() -> Self { Self::default() }

    /// Next interactive sign-in succeeds as `user`.
    pub fn script_interactive(&self, user: ProviderUser, is_new: Option<bool>) {
        self.interactive.lock().push_back(Ok(ScriptedUser { user, is_new }));
    }

    /// Next interactive sign-in fails with `err` (use `Cancelled` for a dismissed popup).
    pub fn script_interactive_failure(&self, err: ProviderError) {
        self.interactive.lock().push_back(Err(err));
    }

    /// Accept `id_token` in `sign_in_with_credential` and sign in as `user`.
    pub fn register_credential(&self, id_token: &str, user: ProviderUser, is_new: Option<bool>) {
        self.credentials.write().insert(id_token.to_string(), ScriptedUser { user, is_new });
    }

    pub fn set_claims(&self, uid: &str, fields: serde_json::Map<String, serde_json::Value>) {
        self.claims.write().insert(uid.to_string(), fields);
    }

    pub fn fail_next_claims(&self, err: ProviderError) { self.claims_failures.lock().push_back(err); }

    pub fn fail_next_sign_out(&self, err: ProviderError) { self.sign_out_failures.lock().push_back(err); }

    /// Park the next claims refresh until the returned hold is released.
    pub fn hold_next_claims(&self) -> Hold {
        let (hold, parked) = hold_pair();
        self.claims_holds.lock().push_back(parked);
        hold
    }

    pub fn claims_calls(&self) -> usize { self.claims_calls.load(Ordering::SeqCst) }

    pub fn subscriber_count(&self) -> usize { self.handlers.read().len() }

    /// Switch the signed-in user without a sign-in flow (e.g. restored session).
    pub fn set_current(&self, user: Option<ProviderUser>) {
        *self.current.write() = user;
        self.emit();
    }

    /// Simulate a token refresh: re-announce the current user.
    pub fn refresh_token(&self) { self.emit(); }

    fn emit(&self) {
        let user = self.current.read().clone();
        let handlers: Vec<AuthChangeHandler> = self.handlers.read().iter().map(|(_, h)| h.clone()).collect();
        debug!(target: "usersync::identity", "memory provider emit user={:?} handlers={}", user.as_ref().map(|u| &u.uid), handlers.len());
        for h in handlers {
            h(user.clone());
        }
    }

    fn sign_in_as(&self, scripted: ScriptedUser, id_token: Option<&str>, access_token: Option<&str>) -> UserCredential {
        let cred = UserCredential {
            provider_id: PROVIDER_ID.to_string(),
            user: scripted.user.clone(),
            id_token: id_token.map(str::to_string),
            access_token: access_token.map(str::to_string),
            is_new_user: scripted.is_new,
        };
        self.set_current(Some(scripted.user));
        cred
    }
}

#[async_trait]
impl IdentityProvider for MemoryIdentityProvider {
    fn current_user(&self) -> Option<ProviderUser> { self.current.read().clone() }

    fn on_change(&self, handler: AuthChangeHandler) -> SubscriptionId {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.handlers.write().push((id, handler.clone()));
        let user = self.current.read().clone();
        handler(user);
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.handlers.write().retain(|(hid, _)| *hid != id);
    }

    async fn sign_in_interactive(&self) -> Result<UserCredential, ProviderError> {
        let next = self.interactive.lock().pop_front();
        match next {
            Some(Ok(scripted)) => Ok(self.sign_in_as(scripted, None, None)),
            Some(Err(e)) => Err(e),
            None => Err(ProviderError::Cancelled),
        }
    }

    async fn sign_in_with_credential(
        &self,
        id_token: Option<&str>,
        access_token: Option<&str>,
    ) -> Result<UserCredential, ProviderError> {
        let Some(token) = id_token else {
            return Err(ProviderError::InvalidCredential("missing id token".into()));
        };
        let scripted = self.credentials.read().get(token).cloned();
        match scripted {
            Some(s) => Ok(self.sign_in_as(s, Some(token), access_token)),
            None => Err(ProviderError::InvalidCredential("unknown id token".into())),
        }
    }

    async fn sign_out(&self) -> Result<(), ProviderError> {
        let failure = self.sign_out_failures.lock().pop_front();
        if let Some(e) = failure { return Err(e); }
        self.set_current(None);
        Ok(())
    }

    async fn fresh_claims(&self, user: &ProviderUser) -> Result<Claims, ProviderError> {
        self.claims_calls.fetch_add(1, Ordering::SeqCst);
        let parked = self.claims_holds.lock().pop_front();
        if let Some(p) = parked { p.wait().await; }
        let failure = self.claims_failures.lock().pop_front();
        if let Some(e) = failure { return Err(e); }
        let fields = self.claims.read().get(&user.uid).cloned().unwrap_or_default();
        Ok(Claims { issued_at: Some(Utc::now()), fields })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn subscribe_delivers_initial_state() {
        let p = MemoryIdentityProvider::new();
        p.set_current(Some(ProviderUser::new("u1")));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s2 = seen.clone();
        let id = p.on_change(Arc::new(move |u| s2.lock().push(u.map(|u| u.uid))));
        assert_eq!(*seen.lock(), vec![Some("u1".to_string())]);
        p.refresh_token();
        p.unsubscribe(id);
        p.set_current(None);
        assert_eq!(seen.lock().len(), 2);
    }

    #[tokio::test]
    async fn unscripted_interactive_counts_as_cancel() {
        let p = MemoryIdentityProvider::new();
        assert_eq!(p.sign_in_interactive().await.unwrap_err(), ProviderError::Cancelled);
    }
}
