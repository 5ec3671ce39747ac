//! Sync layer configuration.
//! Resolution order: built-in defaults, then an optional JSON override file, then
//! `USERSYNC_*` environment variables.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const ENV_PREFIX: &str = "USERSYNC_";

/// Fully resolved settings shared by the session and collection controllers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncConfig {
    /// First path segment of every scoped collection, e.g. `users`.
    pub users_root: String,
    /// Appended to the singular collection handle to name the remote collection.
    pub collection_suffix: String,
    /// Claims field that must be boolean `true` for a premium principal.
    pub premium_claim: String,
    /// Text handed to the notifier when an operation fails.
    pub error_notice: String,
    /// Bound collections reload when a reconciliation ends connected.
    pub reload_on_connect: bool,
    /// Bound collections drop their cache when a reconciliation ends disconnected.
    pub clear_on_disconnect: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            users_root: "users".to_string(),
            collection_suffix: "s".to_string(),
            premium_claim: "isPremium".to_string(),
            error_notice: "Something went wrong, check console.".to_string(),
            reload_on_connect: true,
            clear_on_disconnect: true,
        }
    }
}

/// Partial settings, as read from a JSON file. Unspecified values inherit.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SyncConfigOverride {
    pub users_root: Option<String>,
    pub collection_suffix: Option<String>,
    pub premium_claim: Option<String>,
    pub error_notice: Option<String>,
    pub reload_on_connect: Option<bool>,
    pub clear_on_disconnect: Option<bool>,
}

impl SyncConfigOverride {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).with_context(|| format!("reading config '{}'", path.display()))?;
        let ov = serde_json::from_slice::<Self>(&bytes)
            .with_context(|| format!("parsing config '{}'", path.display()))?;
        Ok(ov)
    }

    /// Collect overrides from `USERSYNC_*` variables through `lookup`.
    /// Boolean values accept `1/0/true/false/yes/no`; anything else is ignored.
    pub fn from_env_with<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name)).filter(|v| !v.trim().is_empty());
        let flag = |name: &str| var(name).and_then(|v| parse_flag(&v));
        Self {
            users_root: var("USERS_ROOT"),
            collection_suffix: var("COLLECTION_SUFFIX"),
            premium_claim: var("PREMIUM_CLAIM"),
            error_notice: var("ERROR_NOTICE"),
            reload_on_connect: flag("RELOAD_ON_CONNECT"),
            clear_on_disconnect: flag("CLEAR_ON_DISCONNECT"),
        }
    }

    pub fn from_env() -> Self { Self::from_env_with(|k| std::env::var(k).ok()) }
}

fn parse_flag(v: &str) -> Option<bool> {
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl SyncConfig {
    /// Overlay `ov` on top of `self`; set fields win.
    pub fn with_override(mut self, ov: &SyncConfigOverride) -> Self {
        if let Some(v) = &ov.users_root { self.users_root = v.clone(); }
        if let Some(v) = &ov.collection_suffix { self.collection_suffix = v.clone(); }
        if let Some(v) = &ov.premium_claim { self.premium_claim = v.clone(); }
        if let Some(v) = &ov.error_notice { self.error_notice = v.clone(); }
        if let Some(v) = ov.reload_on_connect { self.reload_on_connect = v; }
        if let Some(v) = ov.clear_on_disconnect { self.clear_on_disconnect = v; }
        self
    }

    /// Build from defaults, then the optional file, then the environment.
    pub fn from_layers(file: Option<&SyncConfigOverride>, env: &SyncConfigOverride) -> Self {
        let mut cfg = SyncConfig::default();
        if let Some(f) = file { cfg = cfg.with_override(f); }
        cfg.with_override(env)
    }

    /// Load the effective config, reading `path` when given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(p) => Some(SyncConfigOverride::from_json_file(p)?),
            None => None,
        };
        let cfg = Self::from_layers(file.as_ref(), &SyncConfigOverride::from_env());
        debug!(target: "usersync::config", "effective config: {:?}", cfg);
        Ok(cfg)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
