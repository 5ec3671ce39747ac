use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;

/// One-shot completion flag for a single reconciliation cycle.
/// Waiters keep the signal alive, so replacing the current signal never wakes
/// the waiters of an older one.
#[derive(Clone)]
pub struct CompletionSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl CompletionSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn resolve(&self) { self.tx.send_replace(true); }

    pub fn is_resolved(&self) -> bool { *self.tx.borrow() }

    pub fn wait(&self) -> impl Future<Output = ()> + Send + 'static {
        let keep = self.tx.clone();
        let mut rx = self.tx.subscribe();
        async move {
            let _ = rx.wait_for(|done| *done).await;
            drop(keep);
        }
    }
}

impl Default for CompletionSignal {
    fn default() -> Self { Self::new() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;

    #[tokio::test]
    async fn resolves_only_its_own_waiters() {
        let first = CompletionSignal::new();
        let second = CompletionSignal::new();
        let wait_first = first.wait();
        second.resolve();
        assert!(second.wait().now_or_never().is_some());
        assert!(!first.is_resolved());
        drop(second);
        first.resolve();
        wait_first.await;
    }

    #[tokio::test]
    async fn pending_until_resolved() {
        let s = CompletionSignal::new();
        assert!(s.wait().now_or_never().is_none());
        s.resolve();
        assert!(s.wait().now_or_never().is_some());
    }
}
