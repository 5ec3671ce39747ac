//! Unified error model for the sync layer.
//! One enum is surfaced to callers of the session and collection controllers; the
//! collaborator boundaries (identity provider, remote store, deserialization) keep
//! their own small error types that convert into it.

use thiserror::Error;

/// Failure reported by an identity provider implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// The interactive consent flow was dismissed by the user.
    #[error("sign-in flow cancelled")]
    Cancelled,
    #[error("invalid credential: {0}")]
    InvalidCredential(String),
    #[error("provider transport failure: {0}")]
    Transport(String),
}

/// Failure reported by a remote document store implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    #[error("document not found: {0}")]
    DocumentNotFound(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("remote store unavailable: {0}")]
    Unavailable(String),
}

/// A remote document could not be turned into a typed domain object (or back).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot convert {handle} document '{id}': {reason}")]
pub struct DeserializationError {
    pub handle: String,
    pub id: String,
    pub reason: String,
}

impl DeserializationError {
    pub fn new<S: Into<String>>(handle: S, id: S, reason: impl std::fmt::Display) -> Self {
        Self { handle: handle.into(), id: id.into(), reason: reason.to_string() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error("user not connected")]
    NotAuthenticated,
    #[error("this {handle} already has an id ({id})")]
    AlreadyPersisted { handle: String, id: String },
    #[error("invalid {handle} id")]
    MissingIdentifier { handle: String },
    #[error("{handle} of id {id} can't be found")]
    NotFound { handle: String, id: String },
    #[error("already logged in")]
    AlreadyLoggedIn,
    #[error("already logged out")]
    AlreadyLoggedOut,
    #[error("sign-in cancelled by user")]
    UserCancelled,
    /// Sign-out failed; the provider's cause is logged, never carried.
    #[error("something went wrong")]
    SignOutFailed,
    #[error("identity provider error: {0}")]
    Provider(String),
    #[error("remote store error: {0}")]
    Remote(#[from] RemoteError),
    #[error(transparent)]
    Deserialization(#[from] DeserializationError),
    /// A newer `update` on the same collection took over before this one finished.
    #[error("update superseded by a newer update")]
    Superseded,
    /// The signed-in principal changed while the operation was in flight.
    #[error("session changed during {op}")]
    SessionChanged { op: &'static str },
    #[error("no async runtime available: {0}")]
    Runtime(String),
}

impl SyncError {
    pub fn code_str(&self) -> &'static str {
        match self {
            SyncError::NotAuthenticated => "not_authenticated",
            SyncError::AlreadyPersisted { .. } => "already_persisted",
            SyncError::MissingIdentifier { .. } => "missing_identifier",
            SyncError::NotFound { .. } => "not_found",
            SyncError::AlreadyLoggedIn => "already_logged_in",
            SyncError::AlreadyLoggedOut => "already_logged_out",
            SyncError::UserCancelled => "user_cancelled",
            SyncError::SignOutFailed => "sign_out_failed",
            SyncError::Provider(_) => "provider_error",
            SyncError::Remote(_) => "remote_error",
            SyncError::Deserialization(_) => "deserialization_error",
            SyncError::Superseded => "superseded",
            SyncError::SessionChanged { .. } => "session_changed",
            SyncError::Runtime(_) => "runtime_error",
        }
    }

    /// True when the operation was overtaken rather than failed.
    pub fn is_preempted(&self) -> bool {
        matches!(self, SyncError::Superseded | SyncError::SessionChanged { .. })
    }

    pub fn already_persisted<S: Into<String>>(handle: S, id: S) -> Self {
        SyncError::AlreadyPersisted { handle: handle.into(), id: id.into() }
    }
    pub fn missing_identifier<S: Into<String>>(handle: S) -> Self {
        SyncError::MissingIdentifier { handle: handle.into() }
    }
    pub fn not_found<S: Into<String>>(handle: S, id: S) -> Self {
        SyncError::NotFound { handle: handle.into(), id: id.into() }
    }
}

impl From<ProviderError> for SyncError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Cancelled => SyncError::UserCancelled,
            other => SyncError::Provider(other.to_string()),
        }
    }
}

pub type SyncResult<T> = Result<T, SyncError>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod error_tests;
