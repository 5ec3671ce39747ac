use super::*;
use crate::config::SyncConfig;
use crate::error::RemoteError;
use crate::identity::{IdentitySession, MemoryIdentityProvider, ProviderUser};
use crate::store::{MemoryRemoteStore, StoreOp};
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Note {
    #[serde(default)]
    id: Option<String>,
    text: String,
    #[serde(default)]
    pinned: Option<bool>,
}

impl DomainObject for Note {
    fn id(&self) -> Option<&str> { self.id.as_deref() }
    fn set_id(&mut self, id: String) { self.id = Some(id); }
}

fn note(text: &str) -> Note { Note { id: None, text: text.into(), pinned: None } }

async fn scope_for(uid: Option<&str>, remote: Arc<MemoryRemoteStore>) -> CollectionScope {
    let provider = Arc::new(MemoryIdentityProvider::new());
    provider.set_current(uid.map(ProviderUser::new));
    let session = SessionController::new(IdentitySession::new(provider), SyncConfig::default());
    session.start().unwrap();
    session.auth_state_changed_complete().await;
    CollectionScope::new(session, remote, "note")
}

#[tokio::test]
async fn disconnected_scope_never_reaches_remote() {
    let remote = Arc::new(MemoryRemoteStore::new());
    let scope = scope_for(None, remote.clone()).await;
    assert_eq!(fetch_all::<Note>(&scope).await.unwrap_err(), SyncError::NotAuthenticated);
    assert_eq!(create(&scope, note("a")).await.unwrap_err(), SyncError::NotAuthenticated);
    let mut persisted = note("b");
    persisted.id = Some("n1".into());
    assert_eq!(remove(&scope, &persisted).await.unwrap_err(), SyncError::NotAuthenticated);
    assert_eq!(update(&scope, "n1", &Patch::new().set("text", "c")).await.unwrap_err(), SyncError::NotAuthenticated);
    assert_eq!(remote.total_calls(), 0);
}

#[tokio::test]
async fn create_assigns_store_identifier_under_user_path() {
    let remote = Arc::new(MemoryRemoteStore::with_ids(["n1"]));
    let scope = scope_for(Some("u1"), remote.clone()).await;
    let created = create(&scope, note("hello")).await.unwrap();
    assert_eq!(created.id.as_deref(), Some("n1"));
    let doc = remote.get("users/u1/notes/n1").unwrap();
    assert_eq!(serde_json::Value::Object(doc.fields), json!({ "text": "hello" }));
}

#[tokio::test]
async fn create_with_identifier_is_rejected_without_remote_call() {
    let remote = Arc::new(MemoryRemoteStore::new());
    let scope = scope_for(Some("u1"), remote.clone()).await;
    let mut n = note("dup");
    n.id = Some("x".into());
    let err = create(&scope, n).await.unwrap_err();
    assert_eq!(err, SyncError::already_persisted("note", "x"));
    assert_eq!(remote.calls(StoreOp::Create), 0);
}

#[tokio::test]
async fn fetch_all_rehydrates_in_store_order() {
    let remote = Arc::new(MemoryRemoteStore::new());
    remote.seed("users/u1/notes", "b", json!({ "text": "second" }).as_object().cloned().unwrap());
    remote.seed("users/u1/notes", "a", json!({ "text": "first", "pinned": true }).as_object().cloned().unwrap());
    remote.seed("users/u2/notes", "z", json!({ "text": "other user" }).as_object().cloned().unwrap());
    let scope = scope_for(Some("u1"), remote.clone()).await;
    let all = fetch_all::<Note>(&scope).await.unwrap();
    assert_eq!(all.iter().map(|n| n.id.clone().unwrap()).collect::<Vec<_>>(), vec!["b", "a"]);
    assert_eq!(all[1].pinned, Some(true));
}

#[tokio::test]
async fn fetch_all_surfaces_bad_documents() {
    let remote = Arc::new(MemoryRemoteStore::new());
    remote.seed("users/u1/notes", "bad", json!({ "text": 12 }).as_object().cloned().unwrap());
    let scope = scope_for(Some("u1"), remote).await;
    let err = fetch_all::<Note>(&scope).await.unwrap_err();
    assert_eq!(err.code_str(), "deserialization_error");
}

#[tokio::test]
async fn remove_requires_identifier() {
    let remote = Arc::new(MemoryRemoteStore::new());
    let scope = scope_for(Some("u1"), remote.clone()).await;
    assert_eq!(remove(&scope, &note("x")).await.unwrap_err(), SyncError::missing_identifier("note"));
    assert_eq!(remote.calls(StoreOp::Delete), 0);
}

#[tokio::test]
async fn update_strips_undefined_and_skips_empty() {
    let remote = Arc::new(MemoryRemoteStore::new());
    remote.seed("users/u1/notes", "n1", json!({ "text": "a", "pinned": false }).as_object().cloned().unwrap());
    let scope = scope_for(Some("u1"), remote.clone()).await;

    update(&scope, "n1", &Patch::new().maybe::<_, bool>("pinned", None)).await.unwrap();
    assert_eq!(remote.calls(StoreOp::Update), 0);

    update(&scope, "n1", &Patch::new().set("text", "b").maybe::<_, bool>("pinned", None)).await.unwrap();
    let doc = remote.get("users/u1/notes/n1").unwrap();
    assert_eq!(serde_json::Value::Object(doc.fields), json!({ "text": "b", "pinned": false }));

    assert_eq!(update(&scope, "", &Patch::new().set("text", "c")).await.unwrap_err(), SyncError::missing_identifier("note"));
}

#[tokio::test]
async fn remote_failures_propagate() {
    let remote = Arc::new(MemoryRemoteStore::new());
    remote.fail_next(StoreOp::Delete, RemoteError::Unavailable("offline".into()));
    let scope = scope_for(Some("u1"), remote).await;
    let mut n = note("x");
    n.id = Some("n1".into());
    let err = remove(&scope, &n).await.unwrap_err();
    assert_eq!(err, SyncError::Remote(RemoteError::Unavailable("offline".into())));
}
