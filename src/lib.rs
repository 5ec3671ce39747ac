pub mod config;
pub mod error;
pub mod identity;
pub mod session;
pub mod object;
pub mod store;
pub mod collection;
pub mod notify;
pub mod paths;
pub mod hold;

pub use collection::{CollectionController, ObjectKey};
pub use config::SyncConfig;
pub use error::{SyncError, SyncResult};
pub use object::DomainObject;
pub use session::{SessionController, SessionState};
pub use store::{Patch, RemoteStore};

// Test-only printing helper: expands to eprintln! during tests and debug builds.
// Usage in tests: tprintln!("debug: {}", value);
#[cfg(any(test, debug_assertions))]
#[macro_export]
macro_rules! tprintln {
    ($($arg:tt)*) => ( eprintln!($($arg)*) );
}

// In non-test builds, provide a no-op tprintln! so calls compile without effect.
#[cfg(not(any(test, debug_assertions)))]
#[macro_export]
macro_rules! tprintln {
    ($($arg:tt)*) => ({
        // Preserve formatting checks in release without producing code
        if false { let _ = format!($($arg)*); }
    });
}
