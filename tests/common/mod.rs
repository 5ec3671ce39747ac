//! Shared fixtures: in-memory provider and store wired to a session controller.
#![allow(dead_code)]

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use usersync::collection::CollectionController;
use usersync::config::SyncConfig;
use usersync::identity::{IdentitySession, MemoryIdentityProvider, ProviderUser};
use usersync::notify::MemoryNotifier;
use usersync::session::SessionController;
use usersync::store::{Fields, MemoryRemoteStore};
use usersync::DomainObject;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    #[serde(default)]
    pub id: Option<String>,
    pub x: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl Post {
    pub fn new(x: i64) -> Self { Self { id: None, x, title: None } }
}

impl DomainObject for Post {
    fn id(&self) -> Option<&str> { self.id.as_deref() }
    fn set_id(&mut self, id: String) { self.id = Some(id); }
}

pub fn fields(v: Value) -> Fields { v.as_object().cloned().unwrap_or_default() }

pub struct Harness {
    pub provider: Arc<MemoryIdentityProvider>,
    pub remote: Arc<MemoryRemoteStore>,
    pub notifier: Arc<MemoryNotifier>,
    pub session: Arc<SessionController>,
}

impl Harness {
    pub fn new() -> Self { Self::with(MemoryRemoteStore::new(), SyncConfig::default()) }

    pub fn with_ids(ids: &[&str]) -> Self {
        Self::with(MemoryRemoteStore::with_ids(ids.iter().copied()), SyncConfig::default())
    }

    pub fn with(remote: MemoryRemoteStore, config: SyncConfig) -> Self {
        let provider = Arc::new(MemoryIdentityProvider::new());
        let notifier = Arc::new(MemoryNotifier::new());
        let session = SessionController::with_notifier(IdentitySession::new(provider.clone()), config, notifier.clone());
        Self { provider, remote: Arc::new(remote), notifier, session }
    }

    /// Signed in as `uid` before the controller subscribes (a restored session).
    pub fn restored(&self, uid: &str) {
        self.provider.set_current(Some(ProviderUser::new(uid)));
    }

    pub fn posts(&self) -> Arc<CollectionController<Post>> {
        CollectionController::attach(self.session.clone(), self.remote.clone(), "post")
    }

    pub fn seed_post(&self, uid: &str, id: &str, x: i64) {
        self.remote.seed(&format!("users/{}/posts", uid), id, fields(json!({ "x": x })));
    }

    pub async fn start(&self) {
        self.session.start().expect("start session");
        self.session.auth_state_changed_complete().await;
    }

    pub async fn settle(&self) { self.session.auth_state_changed_complete().await; }

    pub async fn sign_in(&self, uid: &str) {
        self.provider.script_interactive(ProviderUser::new(uid), Some(false));
        self.session.login().await.expect("login");
        self.settle().await;
    }

    pub async fn sign_out(&self) {
        self.session.logout().await.expect("logout");
        self.settle().await;
    }
}

pub fn ids(posts: &[Post]) -> Vec<String> {
    posts.iter().filter_map(|p| p.id.clone()).collect()
}
