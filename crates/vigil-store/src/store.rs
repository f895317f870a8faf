#![forbid(unsafe_code)]

//! The store shell.
//!
//! A [`Store`] owns one observed root object, its effect record, its listener
//! list and the action gate. Mutations are legal inside an action; outside
//! one they are rejected in strict mode and recorded without notification in
//! relaxed mode.
//!
//! # State machine
//!
//! ```text
//!   Idle ──action enter──▶ InAction ──outermost exit──▶ Idle + flush
//!              ▲              │
//!              └─nested enter/exit (depth counter, no flush)
//! ```
//!
//! # Invariants
//!
//! 1. A flush happens exactly once per outermost action exit, after the action
//!    body returns (also when it returns an error).
//! 2. Listeners run in registration order and see the drained record; the
//!    store's record is empty while they run.
//! 3. A flush with nothing recorded calls no listener.
//! 4. A rejected mutation changes neither the state nor the effect record.
//!
//! # Failure Modes
//!
//! - A panic inside an action unwinds through the scope guard, which restores
//!   the depth counter. Recorded effects stay pending until the next flush.
//! - `dispatch` inside an action delivers nothing and returns `false`.
//! - After listeners run, registry tokens no live observer declares are
//!   reclaimed. A token that only appears in another relaxed store's
//!   undispatched record can be reclaimed too; its path text is unchanged but
//!   it no longer resolves.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::{debug, trace, warn};
use vigil_core::{
    EffectRecord, Interceptor, MutationKind, ObjectProxy, ObserveError, ObserveOptions, Path,
    PathCursor, SharedEffects, SharedRegistry, Value, WrapperCache, observe_container,
    value::ObjectRef,
};

use crate::actions::{ActionResult, ActionTree, BoundAction, BoundActions};
use crate::error::{Result, StoreError};
use crate::observer::Observer;
use crate::options::StoreOptions;
use crate::plugin::{PluginEvents, PluginSet};

type Listener = Rc<dyn Fn(&EffectRecord)>;

/// Whether a store is inside an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    InAction,
}

pub(crate) struct StoreInner {
    name: String,
    options: StoreOptions,
    state: ObjectProxy,
    effects: SharedEffects,
    cursor: PathCursor,
    cache: WrapperCache,
    registry: SharedRegistry,
    depth: Cell<usize>,
    listeners: RefCell<Vec<(u64, Listener)>>,
    next_listener: Cell<u64>,
    read_frames: RefCell<Vec<Vec<Path>>>,
    plugins: PluginSet,
    actions: BoundActions,
}

impl StoreInner {
    /// Run `f` inside an action scope; flush on the outermost exit.
    pub(crate) fn run_action<R>(&self, label: &str, f: impl FnOnce(&ObjectProxy) -> R) -> R {
        let scope = ActionScope::enter(self, label);
        let out = f(&self.state);
        if scope.exit() {
            self.flush();
        }
        out
    }

    /// Drain the effect record and hand it to every listener.
    ///
    /// Inside an action nothing is drained; the outermost exit delivers the
    /// whole batch.
    pub(crate) fn flush(&self) -> bool {
        if self.depth.get() > 0 {
            trace!(store = %self.name, depth = self.depth.get(), "store.flush_deferred");
            return false;
        }
        let record = self.effects.borrow_mut().drain();
        if record.is_empty() {
            return false;
        }
        let listeners: Vec<Listener> = self
            .listeners
            .borrow()
            .iter()
            .map(|(_, l)| Rc::clone(l))
            .collect();
        debug!(
            store = %self.name,
            listeners = listeners.len(),
            added = record.added().len(),
            removed = record.removed().len(),
            modified = record.modified().len(),
            "store.flush"
        );
        for listener in &listeners {
            listener(&record);
        }
        self.registry.borrow_mut().sweep_idle();
        true
    }

    fn record_read(&self, path: &Path) {
        let mut frames = self.read_frames.borrow_mut();
        for frame in frames.iter_mut() {
            frame.push(path.clone());
        }
    }

    pub(crate) fn push_read_frame(&self) {
        self.read_frames.borrow_mut().push(Vec::new());
    }

    pub(crate) fn pop_read_frame(&self) -> Vec<Path> {
        self.read_frames.borrow_mut().pop().unwrap_or_default()
    }

    pub(crate) fn registry(&self) -> &SharedRegistry {
        &self.registry
    }
}

/// Depth guard of one action invocation.
struct ActionScope<'a> {
    store: &'a StoreInner,
}

impl<'a> ActionScope<'a> {
    fn enter(store: &'a StoreInner, label: &str) -> Self {
        let depth = store.depth.get() + 1;
        store.depth.set(depth);
        trace!(store = %store.name, action = label, depth, "action.enter");
        Self { store }
    }

    /// Leave the scope. Returns whether this was the outermost one.
    fn exit(self) -> bool {
        let outermost = self.store.depth.get() == 1;
        drop(self);
        outermost
    }
}

impl Drop for ActionScope<'_> {
    fn drop(&mut self) {
        let depth = self.store.depth.get().saturating_sub(1);
        self.store.depth.set(depth);
        trace!(store = %self.store.name, depth, "action.exit");
    }
}

/// Interceptor connecting a store's state to its gate, read frames and
/// plugins.
struct StoreHooks {
    store: Weak<StoreInner>,
}

impl Interceptor for StoreHooks {
    fn on_read(&self, value: &Value, path: &Path) {
        let Some(store) = self.store.upgrade() else {
            return;
        };
        store.record_read(path);
        store
            .plugins
            .emit(PluginEvents::GET, |p| p.on_get(&store.name, value, path));
    }

    fn on_size_read(&self, path: &Path) {
        if let Some(store) = self.store.upgrade() {
            store.record_read(path);
        }
    }

    fn check_mutation(&self, kind: MutationKind, path: &Path) -> std::result::Result<(), ObserveError> {
        let Some(store) = self.store.upgrade() else {
            return Ok(());
        };
        if store.options.strict_mode && store.depth.get() == 0 {
            warn!(
                store = %store.name,
                path = %path,
                kind = kind.as_str(),
                "store.strict_violation"
            );
            return Err(ObserveError::strict_mode(&store.name, path.joined()));
        }
        Ok(())
    }

    fn on_write(&self, value: &Value, path: &Path, old: &Value, target: &Value) {
        if let Some(store) = self.store.upgrade() {
            store.plugins.emit(PluginEvents::CHANGE, |p| {
                p.on_change(&store.name, value, path, target, old);
            });
        }
    }

    fn on_insert(&self, value: &Value, path: &Path, target: &Value) {
        if let Some(store) = self.store.upgrade() {
            store.plugins.emit(PluginEvents::ADD, |p| {
                p.on_add(&store.name, value, path, target);
            });
        }
    }

    fn on_remove(&self, path: &Path, target: &Value) {
        if let Some(store) = self.store.upgrade() {
            store.plugins.emit(PluginEvents::DELETE, |p| {
                p.on_delete(&store.name, path, target);
            });
        }
    }
}

/// Handle to a store. Cloning shares the store.
#[derive(Clone)]
pub struct Store {
    inner: Rc<StoreInner>,
}

/// Non-owning store handle, for plugins that keep a reference to their store.
#[derive(Clone)]
pub struct WeakStore {
    inner: Weak<StoreInner>,
}

impl WeakStore {
    #[must_use]
    pub fn upgrade(&self) -> Option<Store> {
        self.inner.upgrade().map(|inner| Store { inner })
    }
}

impl Store {
    pub(crate) fn new(
        name: String,
        root: ObjectRef,
        actions: ActionTree,
        options: StoreOptions,
        registry: SharedRegistry,
        plugins: PluginSet,
    ) -> Self {
        let effects = EffectRecord::shared();
        let cursor = PathCursor::new();
        let cache = WrapperCache::new();
        let inner = Rc::new_cyclic(|weak: &Weak<StoreInner>| {
            let hooks = Rc::new(StoreHooks {
                store: Weak::clone(weak),
            });
            let observe_options = ObserveOptions::new(hooks)
                .with_cache(cache.clone())
                .with_registry(Rc::clone(&registry))
                .with_effects(Rc::clone(&effects))
                .with_cursor(cursor.clone())
                .with_proxy_set_deep(options.proxy_set_deep);
            let state = observe_container(&root, observe_options);
            let actions = BoundActions::new(Weak::clone(weak), &name, actions);
            StoreInner {
                name,
                options,
                state,
                effects,
                cursor,
                cache,
                registry,
                depth: Cell::new(0),
                listeners: RefCell::new(Vec::new()),
                next_listener: Cell::new(0),
                read_frames: RefCell::new(Vec::new()),
                plugins,
                actions,
            }
        });
        Self { inner }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    #[must_use]
    pub fn options(&self) -> StoreOptions {
        self.inner.options
    }

    /// The observed root.
    #[must_use]
    pub fn state(&self) -> ObjectProxy {
        self.inner.state.clone()
    }

    /// The store's bound actions.
    #[must_use]
    pub fn actions(&self) -> &BoundActions {
        &self.inner.actions
    }

    /// Bind one action by dotted path.
    pub fn action(&self, path: &str) -> Result<BoundAction> {
        self.inner
            .actions
            .get(path)
            .ok_or_else(|| StoreError::UnknownAction {
                path: path.to_owned(),
            })
    }

    /// Call an action by dotted path.
    pub fn call(&self, path: &str, args: &[Value]) -> ActionResult {
        self.inner.actions.call(path, args)
    }

    /// Run an ad-hoc closure as an action.
    pub fn act<R>(&self, f: impl FnOnce(&ObjectProxy) -> R) -> R {
        self.inner.run_action("<inline>", f)
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        if self.inner.depth.get() == 0 {
            Phase::Idle
        } else {
            Phase::InAction
        }
    }

    /// Number of nested actions currently running.
    #[must_use]
    pub fn action_depth(&self) -> usize {
        self.inner.depth.get()
    }

    /// Register a listener for flushed effect records.
    pub fn subscribe(&self, listener: impl Fn(&EffectRecord) + 'static) -> Subscription {
        let id = self.inner.next_listener.get();
        self.inner.next_listener.set(id + 1);
        self.inner
            .listeners
            .borrow_mut()
            .push((id, Rc::new(listener)));
        Subscription {
            store: Rc::downgrade(&self.inner),
            id,
        }
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.borrow().len()
    }

    /// Notify listeners of everything recorded since the last flush.
    ///
    /// Returns whether anything was delivered. Inside an action this is a
    /// no-op: the outermost action exit delivers the batch.
    pub fn dispatch(&self) -> bool {
        self.inner.flush()
    }

    /// Effects recorded but not yet flushed.
    #[must_use]
    pub fn pending_effects(&self) -> EffectRecord {
        self.inner.effects.borrow().clone()
    }

    /// A fresh read tracker for this store.
    #[must_use]
    pub fn observer(&self) -> Observer {
        Observer::new(self.clone())
    }

    /// Path of the most recent tracked read.
    #[must_use]
    pub fn last_observed_path(&self) -> Option<Path> {
        self.inner.cursor.get()
    }

    #[must_use]
    pub fn registry(&self) -> SharedRegistry {
        Rc::clone(&self.inner.registry)
    }

    /// Number of live wrappers created for this store's state.
    #[must_use]
    pub fn wrapper_count(&self) -> usize {
        self.inner.cache.len()
    }

    /// The state rendered as JSON.
    #[must_use]
    pub fn snapshot(&self) -> serde_json::Value {
        self.inner.state.to_value().to_json()
    }

    #[must_use]
    pub fn downgrade(&self) -> WeakStore {
        WeakStore {
            inner: Rc::downgrade(&self.inner),
        }
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Store) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn inner(&self) -> &Rc<StoreInner> {
        &self.inner
    }

    pub(crate) fn plugins(&self) -> &PluginSet {
        &self.inner.plugins
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("name", &self.inner.name)
            .field("options", &self.inner.options)
            .field("phase", &self.phase())
            .field("listeners", &self.listener_count())
            .finish_non_exhaustive()
    }
}

/// RAII listener registration; dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes the listener"]
pub struct Subscription {
    store: Weak<StoreInner>,
    id: u64,
}

impl Subscription {
    /// Unsubscribe now.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(store) = self.store.upgrade() {
            store.listeners.borrow_mut().retain(|(id, _)| *id != self.id);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::StoreConfig;
    use crate::runtime::Runtime;
    use vigil_core::object;

    fn store_with(config: StoreConfig) -> Store {
        Runtime::new().create_store(config).unwrap()
    }

    #[test]
    fn phase_tracks_nesting() {
        let store = store_with(StoreConfig::new(object! {}));
        assert_eq!(store.phase(), Phase::Idle);
        store.act(|_| {
            assert_eq!(store.phase(), Phase::InAction);
            store.act(|_| assert_eq!(store.action_depth(), 2));
            assert_eq!(store.action_depth(), 1);
        });
        assert_eq!(store.phase(), Phase::Idle);
    }

    #[test]
    fn strict_rejects_outside_actions() {
        let store = store_with(StoreConfig::new(object! { "n" => 1 }));
        let err = store.state().set("n", 2).unwrap_err();
        assert!(err.is_strict_mode_violation());
        assert_eq!(store.state().get("n").as_f64(), Some(1.0));
        assert!(store.pending_effects().is_empty());
    }

    #[test]
    fn empty_flush_notifies_nobody() {
        let store = store_with(StoreConfig::new(object! {}));
        let calls = Rc::new(Cell::new(0));
        let seen = Rc::clone(&calls);
        let _sub = store.subscribe(move |_| seen.set(seen.get() + 1));
        store.act(|_| {});
        assert!(!store.dispatch());
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn dropping_subscription_unsubscribes() {
        let store = store_with(StoreConfig::new(object! { "n" => 0 }));
        let calls = Rc::new(Cell::new(0));
        let seen = Rc::clone(&calls);
        let sub = store.subscribe(move |_| seen.set(seen.get() + 1));
        assert_eq!(store.listener_count(), 1);

        store.act(|s| s.set("n", 1)).unwrap();
        sub.unsubscribe();
        store.act(|s| s.set("n", 2)).unwrap();

        assert_eq!(calls.get(), 1);
        assert_eq!(store.listener_count(), 0);
    }

    #[test]
    fn panicking_action_restores_depth() {
        let store = store_with(StoreConfig::new(object! {}));
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _: () = store.act(|_| panic!("boom"));
        }));
        assert!(result.is_err());
        assert_eq!(store.phase(), Phase::Idle);
    }

    #[test]
    fn snapshot_renders_json() {
        let store = store_with(StoreConfig::new(object! { "a" => 1 }));
        assert_eq!(store.snapshot(), serde_json::json!({"a": 1}));
    }
}
