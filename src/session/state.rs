use serde::Serialize;
use tokio::sync::watch;

use crate::identity::Principal;

/// Reconciliation phase of a session controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AuthPhase {
    /// No identity event has been received yet.
    Uninitialized,
    Reconciling,
    Connected,
    Disconnected,
}

/// Session snapshot. `connected` holds iff a principal is present and the
/// reconciliation that produced it finished without error.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionState {
    pub principal: Option<Principal>,
    pub connected: bool,
    /// Why the last reconciliation ended disconnected, when it failed.
    pub last_error: Option<String>,
}

impl SessionState {
    pub fn anonymous() -> Self { Self::default() }

    pub fn connected(principal: Principal) -> Self {
        Self { principal: Some(principal), connected: true, last_error: None }
    }

    pub fn failed<S: Into<String>>(reason: S) -> Self {
        Self { principal: None, connected: false, last_error: Some(reason.into()) }
    }

    pub fn principal_id(&self) -> Option<&str> {
        self.principal.as_ref().map(|p| p.uid.as_str())
    }

    /// Identifier of the principal remote access may use right now.
    pub fn connected_id(&self) -> Option<&str> {
        if self.connected { self.principal_id() } else { None }
    }
}

/// Local holder of the session state. Writes are synchronous; observers read
/// through `watch` receivers.
pub(crate) struct UserState {
    tx: watch::Sender<SessionState>,
}

impl UserState {
    pub(crate) fn new() -> Self {
        let (tx, _rx) = watch::channel(SessionState::anonymous());
        Self { tx }
    }

    pub(crate) fn snapshot(&self) -> SessionState { self.tx.borrow().clone() }

    pub(crate) fn publish(&self, next: SessionState) { self.tx.send_replace(next); }

    pub(crate) fn modify<F: FnOnce(&mut SessionState) -> bool>(&self, f: F) { self.tx.send_if_modified(f); }

    pub(crate) fn subscribe(&self) -> watch::Receiver<SessionState> { self.tx.subscribe() }

    /// Yield once so tasks woken by the last write run before the caller reads.
    pub(crate) async fn update_complete(&self) { tokio::task::yield_now().await; }
}
