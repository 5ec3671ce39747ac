use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::token::PendingOperation;
use crate::error::{SyncError, SyncResult};
use crate::notify::{Notice, Notifier};
use crate::object::DomainObject;
use crate::session::{SessionController, SessionObserver, SessionState};
use crate::store::{scoped, CollectionScope, Patch, RemoteStore};

/// Lookup key for `remove`: a bare identifier or a cached object.
pub enum ObjectKey<'a, T> {
    Id(&'a str),
    Object(&'a T),
}

impl<'a, T> From<&'a str> for ObjectKey<'a, T> {
    fn from(id: &'a str) -> Self { ObjectKey::Id(id) }
}

impl<'a, T> From<&'a String> for ObjectKey<'a, T> {
    fn from(id: &'a String) -> Self { ObjectKey::Id(id.as_str()) }
}

impl<'a, T: DomainObject> From<&'a T> for ObjectKey<'a, T> {
    fn from(object: &'a T) -> Self { ObjectKey::Object(object) }
}

struct Cache<T> {
    objects: Arc<Vec<T>>,
    /// Principal the cached objects belong to.
    owner: Option<String>,
    /// Bumped whenever the cache is discarded.
    generation: u64,
    /// Bumped by every committed change.
    mutations: u64,
}

/// Listings overtaken by a concurrent mutation are re-fetched this many times
/// before `load` gives up with `Superseded`.
const LOAD_ATTEMPTS: usize = 3;

/// Local cache of one scoped collection plus the operations that keep it in step
/// with the remote store.
///
/// The cache is only replaced after the remote call it reflects has succeeded,
/// and always as a whole: observers get a new `Arc` and a new revision.
pub struct CollectionController<T: DomainObject> {
    scope: CollectionScope,
    cache: RwLock<Cache<T>>,
    updates: PendingOperation,
    revision: watch::Sender<u64>,
    notifier: Arc<dyn Notifier>,
    bound: AtomicBool,
}

impl<T: DomainObject> CollectionController<T> {
    /// `handle` is the singular collection name, e.g. `post`.
    pub fn new(session: Arc<SessionController>, remote: Arc<dyn RemoteStore>, handle: &str) -> Arc<Self> {
        let notifier = session.notifier();
        Self::with_notifier(session, remote, handle, notifier)
    }

    pub fn with_notifier(
        session: Arc<SessionController>,
        remote: Arc<dyn RemoteStore>,
        handle: &str,
        notifier: Arc<dyn Notifier>,
    ) -> Arc<Self> {
        if handle.is_empty() || handle.ends_with(session.config().collection_suffix.as_str()) {
            warn!(target: "usersync::collection", "collection handle '{}' should be a non-empty singular name", handle);
        }
        let (revision, _rx) = watch::channel(0);
        Arc::new(Self {
            scope: CollectionScope::new(session, remote, handle),
            cache: RwLock::new(Cache { objects: Arc::new(Vec::new()), owner: None, generation: 0, mutations: 0 }),
            updates: PendingOperation::new(),
            revision,
            notifier,
            bound: AtomicBool::new(false),
        })
    }

    /// Build and bind to the session in one step.
    pub fn attach(session: Arc<SessionController>, remote: Arc<dyn RemoteStore>, handle: &str) -> Arc<Self> {
        let ctrl = Self::new(session, remote, handle);
        ctrl.bind();
        ctrl
    }

    /// Follow the session: reload when a cycle ends connected, clear when it
    /// ends disconnected. Binding twice is a no-op.
    pub fn bind(self: &Arc<Self>) {
        if self.bound.swap(true, Ordering::SeqCst) {
            debug!(target: "usersync::collection", "{} already bound", self.handle());
            return;
        }
        let binding = CollectionBinding { ctrl: Arc::downgrade(self) };
        self.scope.session().add_observer(Arc::new(binding));
    }

    pub fn handle(&self) -> &str { self.scope.handle() }

    /// Copy of the cached objects, in order.
    pub fn get_all(&self) -> Vec<T> { self.cache.read().objects.as_ref().clone() }

    /// Shared immutable view; a new `Arc` is installed on every change.
    pub fn snapshot(&self) -> Arc<Vec<T>> { self.cache.read().objects.clone() }

    pub fn get_by_id(&self, id: &str) -> Option<T> {
        self.cache.read().objects.iter().find(|o| o.id() == Some(id)).cloned()
    }

    pub fn len(&self) -> usize { self.cache.read().objects.len() }

    pub fn is_empty(&self) -> bool { self.cache.read().objects.is_empty() }

    pub fn owner(&self) -> Option<String> { self.cache.read().owner.clone() }

    /// Cache revision counter, bumped on every change.
    pub fn subscribe(&self) -> watch::Receiver<u64> { self.revision.subscribe() }

    /// Resolves once no `update` is in flight.
    pub async fn update_complete(&self) { self.updates.settled().await; }

    /// Replace the whole cache with the remote collection. On error the previous
    /// cache is kept.
    ///
    /// A listing taken before another operation committed would drop that change,
    /// so it is discarded and fetched again.
    pub async fn load(&self) -> SyncResult<()> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let (generation, uid) = self.begin_op();
            let seen = self.cache.read().mutations;
            let objects = scoped::fetch_all::<T>(&self.scope).await.map_err(|e| self.report("load", e))?;
            let count = objects.len();
            let res = self.commit("load", generation, uid.as_deref(), |cache| {
                if cache.mutations != seen {
                    return Err(SyncError::Superseded);
                }
                cache.objects = Arc::new(objects);
                cache.owner = uid.clone();
                Ok(())
            });
            match res {
                Ok(()) => {
                    debug!(target: "usersync::collection", "{} load ok count={} attempt={}", self.handle(), count, attempt);
                    return Ok(());
                }
                Err(SyncError::Superseded) if attempt < LOAD_ATTEMPTS => {
                    debug!(target: "usersync::collection", "{} listing overtaken by a local change, fetching again", self.handle());
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Persist `object` and append the stored version (with its identifier).
    pub async fn add(&self, object: T) -> SyncResult<T> {
        let (generation, uid) = self.begin_op();
        let created = scoped::create(&self.scope, object).await.map_err(|e| self.report("add", e))?;
        self.commit("add", generation, uid.as_deref(), |cache| {
            let mut next = cache.objects.as_ref().clone();
            match next.iter().position(|o| o.id() == created.id()) {
                Some(pos) => next[pos] = created.clone(),
                None => next.push(created.clone()),
            }
            cache.objects = Arc::new(next);
            Ok(())
        })?;
        Ok(created)
    }

    /// Delete by identifier or by cached object. Unknown identifiers fail with
    /// `NotFound` before any remote call.
    pub async fn remove<'k, K: Into<ObjectKey<'k, T>>>(&self, key: K) -> SyncResult<()> {
        let id = match key.into() {
            ObjectKey::Id(id) => id.to_string(),
            ObjectKey::Object(o) => match o.id() {
                Some(id) => id.to_string(),
                None => return Err(self.report("remove", SyncError::missing_identifier(self.handle()))),
            },
        };
        let target = self.get_by_id(&id);
        let Some(target) = target else {
            return Err(self.report("remove", SyncError::not_found(self.handle(), id.as_str())));
        };
        let (generation, uid) = self.begin_op();
        scoped::remove(&self.scope, &target).await.map_err(|e| self.report("remove", e))?;
        self.commit("remove", generation, uid.as_deref(), |cache| {
            let next: Vec<T> = cache.objects.iter().filter(|o| o.id() != Some(id.as_str())).cloned().collect();
            cache.objects = Arc::new(next);
            Ok(())
        })
    }

    /// Partial update of a cached object.
    ///
    /// Overlapping calls preempt rather than queue: the most recent call wins and
    /// earlier callers get `Superseded` (or `SessionChanged` when the session moved
    /// on). After the remote write succeeds the patch is merged into the cached
    /// object and the cache is swapped to signal the change.
    pub async fn update(&self, object_id: &str, patch: Patch) -> SyncResult<()> {
        let ticket = self.updates.begin();
        let (generation, uid) = self.begin_op();
        scoped::update(&self.scope, object_id, &patch).await.map_err(|e| self.report("update", e))?;
        ticket.check("update").map_err(|e| self.report("update", e))?;
        let fields = patch.cleaned();
        if fields.is_empty() {
            return Ok(());
        }
        let handle = self.handle().to_string();
        self.commit("update", generation, uid.as_deref(), |cache| {
            let mut next = cache.objects.as_ref().clone();
            if let Some(obj) = next.iter_mut().find(|o| o.id() == Some(object_id)) {
                obj.apply_patch(&handle, &fields)?;
            } else {
                debug!(target: "usersync::collection", "{} update id={} not cached", handle, object_id);
            }
            cache.objects = Arc::new(next);
            Ok(())
        })
    }

    /// Discard the cache and invalidate any pending update.
    pub fn clear(&self) {
        {
            let mut cache = self.cache.write();
            cache.generation += 1;
            cache.objects = Arc::new(Vec::new());
            cache.owner = None;
        }
        self.updates.cancel();
        self.bump();
        debug!(target: "usersync::collection", "{} cache cleared", self.handle());
    }

    fn begin_op(&self) -> (u64, Option<String>) {
        (self.cache.read().generation, self.scope.session().principal_id())
    }

    /// Apply `f` unless the cache was discarded or the principal changed since the
    /// operation began. `f` must leave the cache untouched when it fails.
    fn commit<F>(&self, op: &'static str, generation: u64, uid: Option<&str>, f: F) -> SyncResult<()>
    where
        F: FnOnce(&mut Cache<T>) -> SyncResult<()>,
    {
        let current_uid = self.scope.session().principal_id();
        {
            let mut cache = self.cache.write();
            if cache.generation != generation || current_uid.as_deref() != uid {
                drop(cache);
                return Err(self.report(op, SyncError::SessionChanged { op }));
            }
            if let Err(e) = f(&mut *cache) {
                drop(cache);
                return Err(self.report(op, e));
            }
            cache.mutations += 1;
        }
        self.bump();
        Ok(())
    }

    fn bump(&self) { self.revision.send_modify(|r| *r += 1); }

    fn report(&self, op: &str, err: SyncError) -> SyncError {
        if err.is_preempted() {
            debug!(target: "usersync::collection", "{} {} preempted: {}", self.handle(), op, err);
            return err;
        }
        error!(target: "usersync::collection", "{} {} failed: {} (code={})", self.handle(), op, err, err.code_str());
        let message = self.scope.session().config().error_notice.clone();
        self.notifier.notify(&Notice::error(err.code_str(), message));
        err
    }

    async fn on_session_connected(&self, state: &SessionState) {
        if !self.scope.session().config().reload_on_connect { return; }
        if self.owner().as_deref() != state.principal_id() {
            self.clear();
        }
        info!(target: "usersync::collection", "{} reloading for uid={:?}", self.handle(), state.principal_id());
        // Failures are already reported by load.
        let _ = self.load().await;
    }

    fn on_session_disconnected(&self) {
        if self.scope.session().config().clear_on_disconnect {
            self.clear();
        }
    }
}

struct CollectionBinding<T: DomainObject> {
    ctrl: Weak<CollectionController<T>>,
}

#[async_trait]
impl<T: DomainObject> SessionObserver for CollectionBinding<T> {
    fn is_alive(&self) -> bool { self.ctrl.strong_count() > 0 }

    async fn on_connected(&self, state: &SessionState) {
        if let Some(ctrl) = self.ctrl.upgrade() {
            ctrl.on_session_connected(state).await;
        }
    }

    async fn on_disconnected(&self, _state: &SessionState) {
        if let Some(ctrl) = self.ctrl.upgrade() {
            ctrl.on_session_disconnected();
        }
    }
}
