//! User-visible notification sink. Best-effort; implementors must not panic.

use parking_lot::Mutex;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel { Info, Error }

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    /// Stable error code when the notice reports a failure.
    pub code: Option<&'static str>,
    pub message: String,
}

impl Notice {
    pub fn error<S: Into<String>>(code: &'static str, message: S) -> Self {
        Self { level: NoticeLevel::Error, code: Some(code), message: message.into() }
    }
    pub fn info<S: Into<String>>(message: S) -> Self {
        Self { level: NoticeLevel::Info, code: None, message: message.into() }
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notice: &Notice);
}

/// Default sink: notices go to the log.
#[derive(Debug, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notice: &Notice) {
        match notice.level {
            NoticeLevel::Info => info!(target: "usersync::notice", "{}", notice.message),
            NoticeLevel::Error => warn!(target: "usersync::notice", "{} (code={})", notice.message, notice.code.unwrap_or("-")),
        }
    }
}

/// Keeps every notice in memory.
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl MemoryNotifier {
    pub fn new() -> Self { Self::default() }
    pub fn notices(&self) -> Vec<Notice> { self.notices.lock().clone() }
    pub fn codes(&self) -> Vec<&'static str> { self.notices.lock().iter().filter_map(|n| n.code).collect() }
    pub fn clear(&self) { self.notices.lock().clear(); }
}

impl Notifier for MemoryNotifier {
    fn notify(&self, notice: &Notice) { self.notices.lock().push(notice.clone()); }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_notifier_keeps_order_and_codes() {
        let n = MemoryNotifier::new();
        n.notify(&Notice::info("signed in"));
        n.notify(&Notice::error("not_found", "Something went wrong, check console."));
        assert_eq!(n.notices().len(), 2);
        assert_eq!(n.notices()[0].level, NoticeLevel::Info);
        assert_eq!(n.codes(), vec!["not_found"]);
        n.clear();
        assert!(n.notices().is_empty());
    }

    #[test]
    fn tracing_notifier_accepts_both_levels() {
        TracingNotifier.notify(&Notice::info("hello"));
        TracingNotifier.notify(&Notice::error("remote_error", "boom"));
    }
}
