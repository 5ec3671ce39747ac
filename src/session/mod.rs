//! Session controller: the authentication state machine that gates all remote access.

mod controller;
mod observer;
mod signal;
mod state;

pub use controller::{LoginInformation, LoginOrLogout, SessionController};
pub use observer::SessionObserver;
pub use signal::CompletionSignal;
pub use state::{AuthPhase, SessionState};
