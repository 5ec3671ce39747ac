//! In-process remote store used by tests and the demo binary.
//! Collections keep insertion order. Identifiers come from a scripted queue when
//! one is set, otherwise from random UUIDs.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tracing::debug;
use uuid::Uuid;

use super::{Document, Fields, RemoteStore};
use crate::error::RemoteError;
use crate::hold::{hold_pair, Hold, Parked};
use crate::paths::split_document_path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp { List, Create, Update, Delete }

#[derive(Default)]
pub struct MemoryRemoteStore {
    collections: RwLock<HashMap<String, Vec<Document>>>,
    ids: Mutex<VecDeque<String>>,
    calls: Mutex<HashMap<StoreOp, usize>>,
    failures: Mutex<HashMap<StoreOp, VecDeque<RemoteError>>>,
    holds: Mutex<HashMap<StoreOp, VecDeque<Parked>>>,
}

impl MemoryRemoteStore {
    pub fn new() -> Self { Self::default() }

    /// Hand out these identifiers, in order, before falling back to UUIDs.
    pub fn with_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let s = Self::default();
        s.ids.lock().extend(ids.into_iter().map(Into::into));
        s
    }

    /// Insert a document directly, bypassing call accounting.
    pub fn seed(&self, collection: &str, id: &str, fields: Fields) {
        self.collections
            .write()
            .entry(collection.to_string())
            .or_default()
            .push(Document { id: id.to_string(), fields });
    }

    pub fn documents(&self, collection: &str) -> Vec<Document> {
        self.collections.read().get(collection).cloned().unwrap_or_default()
    }

    pub fn ids(&self, collection: &str) -> Vec<String> {
        self.documents(collection).into_iter().map(|d| d.id).collect()
    }

    pub fn get(&self, document: &str) -> Option<Document> {
        let (col, id) = split_document_path(document)?;
        self.collections.read().get(col)?.iter().find(|d| d.id == id).cloned()
    }

    pub fn calls(&self, op: StoreOp) -> usize { self.calls.lock().get(&op).copied().unwrap_or(0) }

    pub fn total_calls(&self) -> usize { self.calls.lock().values().sum() }

    /// The next call of `op` fails with `err` (after any hold is released).
    pub fn fail_next(&self, op: StoreOp, err: RemoteError) {
        self.failures.lock().entry(op).or_default().push_back(err);
    }

    /// Park the next call of `op` until the returned hold is released.
    pub fn hold_next(&self, op: StoreOp) -> Hold {
        let (hold, parked) = hold_pair();
        self.holds.lock().entry(op).or_default().push_back(parked);
        hold
    }

    fn next_id(&self) -> String {
        self.ids.lock().pop_front().unwrap_or_else(|| Uuid::new_v4().simple().to_string()[..20].to_string())
    }

    async fn enter(&self, op: StoreOp) -> Result<(), RemoteError> {
        *self.calls.lock().entry(op).or_insert(0) += 1;
        let parked = self.holds.lock().get_mut(&op).and_then(|q| q.pop_front());
        if let Some(p) = parked { p.wait().await; }
        let failure = self.failures.lock().get_mut(&op).and_then(|q| q.pop_front());
        match failure {
            Some(e) => {
                debug!(target: "usersync::store", "memory store {:?} injected failure: {}", op, e);
                Err(e)
            }
            None => Ok(()),
        }
    }
}

fn bad_path(path: &str) -> RemoteError { RemoteError::PermissionDenied(format!("invalid document path '{}'", path)) }

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn list(&self, collection: &str) -> Result<Vec<Document>, RemoteError> {
        self.enter(StoreOp::List).await?;
        Ok(self.documents(collection))
    }

    async fn create(&self, collection: &str, fields: Fields) -> Result<String, RemoteError> {
        self.enter(StoreOp::Create).await?;
        let id = self.next_id();
        self.seed(collection, &id, fields);
        debug!(target: "usersync::store", "memory store created {}/{}", collection, id);
        Ok(id)
    }

    async fn update(&self, document: &str, fields: Fields) -> Result<(), RemoteError> {
        self.enter(StoreOp::Update).await?;
        let (col, id) = split_document_path(document).ok_or_else(|| bad_path(document))?;
        let mut cols = self.collections.write();
        let doc = cols
            .get_mut(col)
            .and_then(|docs| docs.iter_mut().find(|d| d.id == id))
            .ok_or_else(|| RemoteError::DocumentNotFound(document.to_string()))?;
        for (k, v) in fields {
            doc.fields.insert(k, v);
        }
        Ok(())
    }

    async fn delete(&self, document: &str) -> Result<(), RemoteError> {
        self.enter(StoreOp::Delete).await?;
        let (col, id) = split_document_path(document).ok_or_else(|| bad_path(document))?;
        // Deleting a missing document succeeds.
        if let Some(docs) = self.collections.write().get_mut(col) {
            docs.retain(|d| d.id != id);
        }
        Ok(())
    }
}
