use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Raw user record as reported by the identity provider, before claims are fetched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProviderUser {
    pub uid: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl ProviderUser {
    pub fn new<S: Into<String>>(uid: S) -> Self { Self { uid: uid.into(), ..Default::default() } }
}

/// Token claims returned by a forced refresh.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    pub issued_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl Claims {
    /// A claim counts as granted only when it is literally boolean `true`.
    pub fn flag(&self, name: &str) -> bool {
        matches!(self.fields.get(name), Some(serde_json::Value::Bool(true)))
    }
}

/// The signed-in identity every remote path is scoped to.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Principal {
    pub uid: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub is_premium: bool,
    /// Set when the principal was built from a forced claims refresh.
    #[serde(default)]
    pub claims_fresh: bool,
    #[serde(default)]
    pub claims_issued_at: Option<DateTime<Utc>>,
    /// Unknown until a login reports it.
    #[serde(default)]
    pub is_new_account: Option<bool>,
}

impl Principal {
    /// Snapshot built from the provider user alone (no claims consulted).
    pub fn from_user(user: &ProviderUser) -> Self {
        Self {
            uid: user.uid.clone(),
            display_name: user.display_name.clone(),
            email: user.email.clone(),
            ..Default::default()
        }
    }

    pub fn from_claims(user: &ProviderUser, claims: &Claims, premium_claim: &str) -> Self {
        Self {
            is_premium: claims.flag(premium_claim),
            claims_fresh: true,
            claims_issued_at: claims.issued_at,
            ..Self::from_user(user)
        }
    }
}
