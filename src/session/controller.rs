use std::future::Future;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::{Mutex, RwLock};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::observer::SessionObserver;
use super::signal::CompletionSignal;
use super::state::{AuthPhase, SessionState, UserState};
use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::identity::{AuthChangeHandler, IdentitySession, Principal, ProviderUser, Subscription, UserCredential};
use crate::notify::{Notice, Notifier, TracingNotifier};

/// Result of a successful sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginInformation {
    pub credential: UserCredential,
    pub user: ProviderUser,
    pub is_new_user: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOrLogout {
    LoggedIn(LoginInformation),
    LoggedOut,
}

struct CycleState {
    /// Sequence number of the most recently started cycle; 0 before the first event.
    seq: u64,
    signal: CompletionSignal,
}

/// New-account flag reported by a login, applied to the matching principal.
#[derive(Debug, Clone)]
struct NewAccountMark {
    uid: String,
    is_new: Option<bool>,
}

/// Owns the session state and keeps it in step with the identity provider.
///
/// Every provider change event starts its own reconciliation cycle: raw hook,
/// forced claims refresh, publish, settle, connected/disconnected hooks, then the
/// cycle's completion signal. Cycles are not coalesced. A cycle that finishes
/// after a newer one has started does not publish its result.
pub struct SessionController {
    identity: IdentitySession,
    config: Arc<SyncConfig>,
    state: UserState,
    phase: RwLock<AuthPhase>,
    cycle: Mutex<CycleState>,
    observers: RwLock<Vec<Arc<dyn SessionObserver>>>,
    new_account: Mutex<Option<NewAccountMark>>,
    notifier: Arc<dyn Notifier>,
    subscription: Mutex<Option<Subscription>>,
    runtime: OnceCell<Handle>,
}

impl SessionController {
    pub fn new(identity: IdentitySession, config: SyncConfig) -> Arc<Self> {
        Self::with_notifier(identity, config, Arc::new(TracingNotifier))
    }

    pub fn with_notifier(identity: IdentitySession, config: SyncConfig, notifier: Arc<dyn Notifier>) -> Arc<Self> {
        Arc::new(Self {
            identity,
            config: Arc::new(config),
            state: UserState::new(),
            phase: RwLock::new(AuthPhase::Uninitialized),
            cycle: Mutex::new(CycleState { seq: 0, signal: CompletionSignal::new() }),
            observers: RwLock::new(Vec::new()),
            new_account: Mutex::new(None),
            notifier,
            subscription: Mutex::new(None),
            runtime: OnceCell::new(),
        })
    }

    /// Register hooks. Observers added after `start` miss cycles already running.
    pub fn add_observer(&self, observer: Arc<dyn SessionObserver>) {
        let mut observers = self.observers.write();
        observers.retain(|o| o.is_alive());
        observers.push(observer);
    }

    /// Unregister `observer` (matched by identity). Returns whether it was registered.
    pub fn remove_observer(&self, observer: &Arc<dyn SessionObserver>) -> bool {
        let mut observers = self.observers.write();
        let before = observers.len();
        observers.retain(|o| !Arc::ptr_eq(o, observer));
        observers.len() != before
    }

    /// Live registered observers.
    pub fn observer_count(&self) -> usize {
        let mut observers = self.observers.write();
        observers.retain(|o| o.is_alive());
        observers.len()
    }

    /// Subscribe to the identity session. Must run inside a tokio runtime; the
    /// provider's initial callback starts the first cycle right away.
    pub fn start(self: &Arc<Self>) -> SyncResult<()> {
        let handle = Handle::try_current().map_err(|e| SyncError::Runtime(e.to_string()))?;
        let _ = self.runtime.set(handle);
        let mut sub = self.subscription.lock();
        if sub.is_some() { return Ok(()); }
        let weak = Arc::downgrade(self);
        let handler: AuthChangeHandler = Arc::new(move |user| {
            if let Some(this) = weak.upgrade() {
                this.on_identity_change(user);
            }
        });
        *sub = Some(self.identity.subscribe(handler));
        info!(target: "usersync::session", "session controller started");
        Ok(())
    }

    /// Stop listening to the identity session. Cycles already running finish.
    pub fn stop(&self) {
        if let Some(sub) = self.subscription.lock().take() {
            sub.unsubscribe();
            info!(target: "usersync::session", "session controller stopped");
        }
    }

    pub fn config(&self) -> &SyncConfig { &self.config }

    pub fn notifier(&self) -> Arc<dyn Notifier> { self.notifier.clone() }

    pub fn phase(&self) -> AuthPhase { *self.phase.read() }

    pub fn snapshot(&self) -> SessionState { self.state.snapshot() }

    /// Identifier of the connected principal, if any.
    pub fn principal_id(&self) -> Option<String> { self.state.snapshot().connected_id().map(str::to_string) }

    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> { self.state.subscribe() }

    /// Completes when the cycle that is current at call time has finished.
    /// Before the first provider event this waits for the first cycle.
    pub fn auth_state_changed_complete(&self) -> impl Future<Output = ()> + Send + 'static {
        self.cycle.lock().signal.wait()
    }

    pub async fn is_logged_in(&self) -> bool {
        self.state.update_complete().await;
        self.state.snapshot().connected
    }

    pub async fn login(&self) -> SyncResult<LoginInformation> {
        self.ensure_not_logged_in().await.map_err(|e| self.report("login", e))?;
        let cred = self.identity.sign_in_interactive().await.map_err(|e| self.report("login", e))?;
        Ok(self.finish_login(cred))
    }

    pub async fn login_with_external_credential(
        &self,
        id_token: Option<&str>,
        access_token: Option<&str>,
    ) -> SyncResult<LoginInformation> {
        self.ensure_not_logged_in().await.map_err(|e| self.report("login_with_external_credential", e))?;
        let cred = self
            .identity
            .sign_in_with_credential(id_token, access_token)
            .await
            .map_err(|e| self.report("login_with_external_credential", e))?;
        Ok(self.finish_login(cred))
    }

    pub async fn logout(&self) -> SyncResult<()> {
        if !self.is_logged_in().await {
            return Err(self.report("logout", SyncError::AlreadyLoggedOut));
        }
        if let Err(cause) = self.identity.sign_out().await {
            warn!(target: "usersync::session", "sign-out failed: {}", cause);
            return Err(self.report("logout", SyncError::SignOutFailed));
        }
        info!(target: "usersync::session", "signed out");
        Ok(())
    }

    /// Log in when disconnected, log out when connected.
    ///
    /// The connectedness check and the branch are separate steps: a state change
    /// landing in between makes the chosen branch fail with `AlreadyLoggedIn` or
    /// `AlreadyLoggedOut`.
    pub async fn login_or_logout(&self) -> SyncResult<LoginOrLogout> {
        if !self.is_logged_in().await {
            Ok(LoginOrLogout::LoggedIn(self.login().await?))
        } else {
            self.logout().await?;
            Ok(LoginOrLogout::LoggedOut)
        }
    }

    async fn ensure_not_logged_in(&self) -> SyncResult<()> {
        if self.is_logged_in().await {
            return Err(SyncError::AlreadyLoggedIn);
        }
        Ok(())
    }

    fn finish_login(&self, credential: UserCredential) -> LoginInformation {
        let uid = credential.user.uid.clone();
        let is_new = credential.is_new_user;
        {
            // Held across the patch so a cycle cannot publish in between.
            let mut mark = self.new_account.lock();
            *mark = Some(NewAccountMark { uid: uid.clone(), is_new });
            self.state.modify(|s| match s.principal.as_mut() {
                Some(p) if p.uid == uid && p.is_new_account != is_new => {
                    p.is_new_account = is_new;
                    true
                }
                _ => false,
            });
        }
        info!(target: "usersync::session", "signed in uid={} new_user={:?}", uid, is_new);
        LoginInformation { user: credential.user.clone(), is_new_user: is_new, credential }
    }

    fn report(&self, op: &str, err: SyncError) -> SyncError {
        warn!(target: "usersync::session", "{} failed: {} (code={})", op, err, err.code_str());
        self.notifier.notify(&Notice::error(err.code_str(), err.to_string()));
        err
    }

    fn observers_snapshot(&self) -> Vec<Arc<dyn SessionObserver>> {
        let mut observers = self.observers.write();
        observers.retain(|o| o.is_alive());
        observers.clone()
    }

    fn is_latest(&self, seq: u64) -> bool { self.cycle.lock().seq == seq }

    fn on_identity_change(self: &Arc<Self>, user: Option<ProviderUser>) {
        let (seq, signal) = {
            let mut c = self.cycle.lock();
            c.seq += 1;
            // The first cycle adopts the signal created with the controller, so
            // early waiters are woken by it.
            if c.seq > 1 {
                c.signal = CompletionSignal::new();
            }
            (c.seq, c.signal.clone())
        };
        *self.phase.write() = AuthPhase::Reconciling;
        debug!(target: "usersync::session", "cycle {} begin user={:?}", seq, user.as_ref().map(|u| &u.uid));
        for o in self.observers_snapshot() {
            o.on_raw_auth_changed(user.as_ref());
        }
        let Some(rt) = self.runtime.get() else {
            warn!(target: "usersync::session", "cycle {} dropped: controller not started", seq);
            return;
        };
        let this = self.clone();
        rt.spawn(async move { this.reconcile(seq, user, signal).await });
    }

    async fn reconcile(self: Arc<Self>, seq: u64, user: Option<ProviderUser>, signal: CompletionSignal) {
        let next = match &user {
            Some(u) => match self.identity.fresh_claims(u).await {
                Ok(claims) => SessionState::connected(Principal::from_claims(u, &claims, &self.config.premium_claim)),
                Err(e) => {
                    let e = self.report("claims refresh", e);
                    SessionState::failed(e.to_string())
                }
            },
            None => {
                *self.new_account.lock() = None;
                SessionState::anonymous()
            }
        };

        if self.is_latest(seq) {
            self.publish_with_mark(next);
        } else {
            debug!(target: "usersync::session", "cycle {} superseded; result not published", seq);
        }
        self.state.update_complete().await;

        let settled = self.state.snapshot();
        let observers = self.observers_snapshot();
        if settled.connected {
            info!(target: "usersync::session", "cycle {} connected uid={:?} premium={}", seq, settled.principal_id(),
                settled.principal.as_ref().map(|p| p.is_premium).unwrap_or(false));
            for o in observers.iter() {
                o.on_connected(&settled).await;
            }
        } else {
            info!(target: "usersync::session", "cycle {} disconnected", seq);
            for o in observers.iter() {
                o.on_disconnected(&settled).await;
            }
        }

        if self.is_latest(seq) {
            *self.phase.write() = if settled.connected { AuthPhase::Connected } else { AuthPhase::Disconnected };
        }
        signal.resolve();
    }

    /// Publish `next` with the login's new-account flag applied. The mark lock is
    /// held through the publish, pairing with `finish_login`.
    fn publish_with_mark(&self, mut next: SessionState) {
        let mark = self.new_account.lock();
        if let Some(p) = next.principal.as_mut() {
            p.is_new_account = match mark.as_ref() {
                Some(m) if m.uid == p.uid => m.is_new,
                _ => None,
            };
        }
        self.state.publish(next);
    }
}
