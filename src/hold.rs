//! Call parking for the in-memory collaborators.
//! A `Hold` lets a test stop the next call of some operation at its suspension
//! point, observe that it got there, and decide when it may finish.

use tokio::sync::oneshot;

/// Test-side handle. Dropping it releases the parked call.
pub struct Hold {
    entered: Option<oneshot::Receiver<()>>,
    release: Option<oneshot::Sender<()>>,
}

/// Collaborator-side half, consumed by the call it parks.
pub(crate) struct Parked {
    entered: oneshot::Sender<()>,
    release: oneshot::Receiver<()>,
}

pub(crate) fn hold_pair() -> (Hold, Parked) {
    let (entered_tx, entered_rx) = oneshot::channel();
    let (release_tx, release_rx) = oneshot::channel();
    (
        Hold { entered: Some(entered_rx), release: Some(release_tx) },
        Parked { entered: entered_tx, release: release_rx },
    )
}

impl Hold {
    /// Resolves once the parked call has reached the collaborator.
    pub async fn entered(&mut self) {
        if let Some(rx) = self.entered.take() {
            let _ = rx.await;
        }
    }

    pub fn release(mut self) {
        if let Some(tx) = self.release.take() {
            let _ = tx.send(());
        }
    }
}

impl Parked {
    pub(crate) async fn wait(self) {
        let _ = self.entered.send(());
        // A dropped Hold counts as a release.
        let _ = self.release.await;
    }
}
