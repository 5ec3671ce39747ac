use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use usersync::identity::{IdentitySession, MemoryIdentityProvider, ProviderUser};
use usersync::store::{MemoryRemoteStore, Patch};
use usersync::{CollectionController, DomainObject, SessionController, SyncConfig};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Post {
    #[serde(default)]
    id: Option<String>,
    x: i64,
}

impl DomainObject for Post {
    fn id(&self) -> Option<&str> { self.id.as_deref() }
    fn set_id(&mut self, id: String) { self.id = Some(id); }
}

fn summary(posts: &CollectionController<Post>) -> String {
    let items: Vec<String> = posts
        .get_all()
        .iter()
        .map(|p| format!("{}:x={}", p.id.as_deref().unwrap_or("?"), p.x))
        .collect();
    format!("[{}]", items.join(", "))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Init logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .context("building log filter")?;
    fmt().with_env_filter(filter).init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = SyncConfig::load(config_path.as_deref())?;
    info!(target: "usersync", "usersync demo starting: users_root='{}', config={:?}", config.users_root, config_path);

    let provider = Arc::new(MemoryIdentityProvider::new());
    let remote = Arc::new(MemoryRemoteStore::with_ids(["b"]));
    let collection = usersync::paths::collection_path(&config, "p1", "post");
    remote.seed(&collection, "a", json!({ "x": 1 }).as_object().cloned().unwrap_or_default());

    let session = SessionController::new(IdentitySession::new(provider.clone()), config);
    let posts: Arc<CollectionController<Post>> = CollectionController::attach(session.clone(), remote.clone(), "post");
    session.start()?;
    session.auth_state_changed_complete().await;

    provider.script_interactive(ProviderUser::new("p1"), Some(false));
    let login = session.login().await?;
    session.auth_state_changed_complete().await;
    info!(target: "usersync", "signed in as {} -> {}", login.user.uid, summary(&posts));

    let added = posts.add(Post { id: None, x: 2 }).await?;
    info!(target: "usersync", "added {:?} -> {}", added.id, summary(&posts));

    posts.update("a", Patch::new().set("x", 5)).await?;
    info!(target: "usersync", "updated a -> {}", summary(&posts));

    posts.remove("a").await?;
    info!(target: "usersync", "removed a -> {}", summary(&posts));

    session.logout().await?;
    session.auth_state_changed_complete().await;
    info!(target: "usersync", "signed out -> {} (remote still holds {:?})", summary(&posts), remote.ids(&collection));

    session.stop();
    Ok(())
}
