//! CRUD against the collection scoped to the connected principal.
//! Every function checks connectedness first and never touches the remote store
//! when a precondition fails.

use std::sync::Arc;

use tracing::debug;

use super::{Patch, RemoteStore};
use crate::error::{SyncError, SyncResult};
use crate::object::DomainObject;
use crate::paths::{collection_path, document_path};
use crate::session::SessionController;

/// Everything needed to address one collection: the session it is scoped by, the
/// remote store, and the singular collection handle (`post`, never `posts`).
#[derive(Clone)]
pub struct CollectionScope {
    session: Arc<SessionController>,
    remote: Arc<dyn RemoteStore>,
    handle: String,
}

impl CollectionScope {
    pub fn new<S: Into<String>>(session: Arc<SessionController>, remote: Arc<dyn RemoteStore>, handle: S) -> Self {
        Self { session, remote, handle: handle.into() }
    }

    pub fn handle(&self) -> &str { &self.handle }

    pub fn session(&self) -> &Arc<SessionController> { &self.session }

    pub fn remote(&self) -> &Arc<dyn RemoteStore> { &self.remote }

    /// Collection path for the connected principal.
    pub fn path(&self) -> SyncResult<String> {
        let uid = self.session.principal_id().ok_or(SyncError::NotAuthenticated)?;
        Ok(collection_path(self.session.config(), &uid, &self.handle))
    }
}

pub async fn fetch_all<T: DomainObject>(scope: &CollectionScope) -> SyncResult<Vec<T>> {
    let path = scope.path()?;
    let docs = scope.remote.list(&path).await?;
    debug!(target: "usersync::store", "fetch_all path={} docs={}", path, docs.len());
    let mut out = Vec::with_capacity(docs.len());
    for doc in docs {
        out.push(T::from_document(&scope.handle, doc)?);
    }
    Ok(out)
}

/// Persist a new object and return it carrying the store-assigned identifier.
pub async fn create<T: DomainObject>(scope: &CollectionScope, mut object: T) -> SyncResult<T> {
    let path = scope.path()?;
    if let Some(id) = object.id() {
        return Err(SyncError::already_persisted(scope.handle.as_str(), id));
    }
    let fields = object.to_fields(&scope.handle)?;
    let id = scope.remote.create(&path, fields).await?;
    debug!(target: "usersync::store", "create path={} id={}", path, id);
    object.set_id(id);
    Ok(object)
}

pub async fn remove<T: DomainObject>(scope: &CollectionScope, object: &T) -> SyncResult<()> {
    let path = scope.path()?;
    let id = match object.id() {
        Some(id) if !id.is_empty() => id,
        _ => return Err(SyncError::missing_identifier(scope.handle.as_str())),
    };
    let doc = document_path(&path, id);
    scope.remote.delete(&doc).await?;
    debug!(target: "usersync::store", "remove doc={}", doc);
    Ok(())
}

/// Partial update of `object_id`. A patch with no defined entries succeeds
/// without a remote call.
pub async fn update(scope: &CollectionScope, object_id: &str, patch: &Patch) -> SyncResult<()> {
    let path = scope.path()?;
    if object_id.is_empty() {
        return Err(SyncError::missing_identifier(scope.handle.as_str()));
    }
    let fields = patch.cleaned();
    if fields.is_empty() {
        debug!(target: "usersync::store", "update id={} skipped: nothing defined", object_id);
        return Ok(());
    }
    let doc = document_path(&path, object_id);
    debug!(target: "usersync::store", "update doc={} fields={:?}", doc, fields.keys().collect::<Vec<_>>());
    scope.remote.update(&doc, fields).await?;
    Ok(())
}

#[cfg(test)]
#[path = "scoped_tests.rs"]
mod scoped_tests;
