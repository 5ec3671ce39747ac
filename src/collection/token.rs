use std::collections::BTreeMap;

use tokio::sync::watch;
use tracing::debug;

use crate::error::{SyncError, SyncResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Preemption { Superseded, SessionChanged }

#[derive(Debug, Clone, Default)]
struct TokenState {
    next: u64,
    /// Live tickets by generation, with the reason each one was preempted.
    /// The first preemption sticks.
    live: BTreeMap<u64, Option<Preemption>>,
}

impl TokenState {
    fn preempt_all(&mut self, why: Preemption) -> bool {
        let mut changed = false;
        for reason in self.live.values_mut().filter(|r| r.is_none()) {
            *reason = Some(why);
            changed = true;
        }
        changed
    }

    fn has_current(&self) -> bool { self.live.values().any(Option::is_none) }
}

/// Pending-operation token for one class of mutation. Starting a new operation
/// preempts the outstanding one; it does not queue behind it.
pub(crate) struct PendingOperation {
    tx: watch::Sender<TokenState>,
}

/// Held by the running operation. Dropping it marks the operation finished.
pub(crate) struct Ticket<'a> {
    op: &'a PendingOperation,
    generation: u64,
}

impl PendingOperation {
    pub(crate) fn new() -> Self {
        let (tx, _rx) = watch::channel(TokenState::default());
        Self { tx }
    }

    pub(crate) fn begin(&self) -> Ticket<'_> {
        let mut generation = 0;
        self.tx.send_modify(|s| {
            s.next += 1;
            if s.preempt_all(Preemption::Superseded) {
                debug!(target: "usersync::collection", "pending ticket superseded by {}", s.next);
            }
            s.live.insert(s.next, None);
            generation = s.next;
        });
        Ticket { op: self, generation }
    }

    /// Invalidate the outstanding ticket, if any.
    pub(crate) fn cancel(&self) {
        self.tx.send_if_modified(|s| s.preempt_all(Preemption::SessionChanged));
    }

    pub(crate) fn is_outstanding(&self) -> bool { self.tx.borrow().has_current() }

    /// Resolves once no ticket is outstanding.
    pub(crate) async fn settled(&self) {
        let mut rx = self.tx.subscribe();
        let _ = rx.wait_for(|s| !s.has_current()).await;
    }
}

impl Ticket<'_> {
    /// Ok while this ticket is still the current one.
    pub(crate) fn check(&self, op: &'static str) -> SyncResult<()> {
        let reason = self.op.tx.borrow().live.get(&self.generation).copied().flatten();
        match reason {
            None => Ok(()),
            Some(Preemption::Superseded) => Err(SyncError::Superseded),
            Some(Preemption::SessionChanged) => Err(SyncError::SessionChanged { op }),
        }
    }
}

impl Drop for Ticket<'_> {
    fn drop(&mut self) {
        let generation = self.generation;
        self.op.tx.send_if_modified(|s| s.live.remove(&generation).is_some());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;

    #[test]
    fn newer_ticket_preempts_older() {
        let op = PendingOperation::new();
        let first = op.begin();
        let second = op.begin();
        assert_eq!(first.check("update"), Err(SyncError::Superseded));
        assert!(second.check("update").is_ok());
        drop(first);
        assert!(op.is_outstanding());
        drop(second);
        assert!(!op.is_outstanding());
    }

    #[test]
    fn cancel_reports_session_change() {
        let op = PendingOperation::new();
        let t = op.begin();
        op.cancel();
        assert_eq!(t.check("update"), Err(SyncError::SessionChanged { op: "update" }));
        assert!(!op.is_outstanding());
        let fresh = op.begin();
        assert!(fresh.check("update").is_ok());
    }

    #[test]
    fn cancelled_ticket_keeps_its_reason_after_a_newer_begin() {
        let op = PendingOperation::new();
        let t1 = op.begin();
        op.cancel();
        let t2 = op.begin();
        assert_eq!(t1.check("update"), Err(SyncError::SessionChanged { op: "update" }));
        assert!(t2.check("update").is_ok());
    }

    #[test]
    fn superseded_ticket_keeps_its_reason_after_cancel() {
        let op = PendingOperation::new();
        let t1 = op.begin();
        let t2 = op.begin();
        op.cancel();
        assert_eq!(t1.check("update"), Err(SyncError::Superseded));
        assert_eq!(t2.check("update"), Err(SyncError::SessionChanged { op: "update" }));
        drop(t1);
        drop(t2);
        assert!(op.tx.borrow().live.is_empty());
    }

    #[tokio::test]
    async fn settled_waits_for_outstanding_ticket() {
        let op = PendingOperation::new();
        assert!(op.settled().now_or_never().is_some());
        let t = op.begin();
        assert!(op.settled().now_or_never().is_none());
        drop(t);
        op.settled().await;
    }
}
