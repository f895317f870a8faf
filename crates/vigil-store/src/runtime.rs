#![forbid(unsafe_code)]

//! Store registry and runtime-wide plugins.
//!
//! A [`Runtime`] owns the key registry shared by its stores, the named store
//! table and the plugins applied to every store it creates. One runtime per
//! thread is available through [`Runtime::global`] and the free functions at
//! the bottom of this module.
//!
//! # Creation order
//!
//! 1. Runtime plugins, then the config's plugins, rewrite the init via
//!    `before_init`.
//! 2. The init state is checked to be an object.
//! 3. The store is built and registered under its name.
//! 4. Every plugin's `on_init` runs, in the same order.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use tracing::debug;
use vigil_core::{KeyRegistry, SharedRegistry, Value};

use crate::error::{Result, StoreError};
use crate::options::StoreConfig;
use crate::plugin::{IgnoreGuard, Plugin, PluginEvents, PluginSet, StoreInit};
use crate::store::Store;

struct RuntimeInner {
    registry: SharedRegistry,
    stores: RefCell<IndexMap<String, Store>>,
    plugins: RefCell<Vec<Rc<dyn Plugin>>>,
    ignored: Rc<Cell<PluginEvents>>,
    next_anonymous: Cell<u64>,
}

/// Store registry. Cloning shares the runtime.
#[derive(Clone)]
pub struct Runtime {
    inner: Rc<RuntimeInner>,
}

thread_local! {
    static GLOBAL: Runtime = Runtime::new();
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RuntimeInner {
                registry: KeyRegistry::shared(),
                stores: RefCell::new(IndexMap::new()),
                plugins: RefCell::new(Vec::new()),
                ignored: Rc::new(Cell::new(PluginEvents::empty())),
                next_anonymous: Cell::new(0),
            }),
        }
    }

    /// This thread's default runtime.
    #[must_use]
    pub fn global() -> Self {
        GLOBAL.with(Runtime::clone)
    }

    /// Build and register a store.
    ///
    /// # Errors
    ///
    /// [`StoreError::InvalidInitState`] when the (plugin-rewritten) init state
    /// is not an object; [`StoreError::DuplicateStore`] when the name is taken.
    pub fn create_store(&self, config: StoreConfig) -> Result<Store> {
        let StoreConfig {
            name,
            init_state,
            actions,
            plugins: local,
            options,
        } = config;

        let mut plugins: Vec<Rc<dyn Plugin>> = self.inner.plugins.borrow().clone();
        plugins.extend(local);

        let init = plugins.iter().fold(
            StoreInit {
                init_state,
                actions,
            },
            |init, plugin| plugin.before_init(init),
        );
        let StoreInit {
            init_state,
            actions,
        } = init;
        let root = match init_state {
            Value::Object(root) => root,
            other => {
                return Err(StoreError::InvalidInitState {
                    found: other.type_name(),
                });
            }
        };

        let name = match name {
            Some(name) => name,
            None => self.anonymous_name(),
        };
        if self.inner.stores.borrow().contains_key(&name) {
            return Err(StoreError::DuplicateStore { name });
        }

        let plugin_set = PluginSet::new(plugins, Rc::clone(&self.inner.ignored));
        let store = Store::new(
            name.clone(),
            root,
            actions,
            options,
            Rc::clone(&self.inner.registry),
            plugin_set,
        );
        self.inner
            .stores
            .borrow_mut()
            .insert(name.clone(), store.clone());
        debug!(
            store = %name,
            strict = options.strict_mode,
            plugins = store.plugins().len(),
            actions = store.actions().paths().len(),
            "store.create"
        );

        for plugin in store.plugins().all() {
            plugin.on_init(&store);
        }
        Ok(store)
    }

    fn anonymous_name(&self) -> String {
        let stores = self.inner.stores.borrow();
        loop {
            let n = self.inner.next_anonymous.get();
            self.inner.next_anonymous.set(n + 1);
            let name = format!("store-{n}");
            if !stores.contains_key(&name) {
                return name;
            }
        }
    }

    #[must_use]
    pub fn store(&self, name: &str) -> Option<Store> {
        self.inner.stores.borrow().get(name).cloned()
    }

    /// Like [`Runtime::store`], failing with [`StoreError::UnknownStore`].
    pub fn get_store(&self, name: &str) -> Result<Store> {
        self.store(name).ok_or_else(|| StoreError::UnknownStore {
            name: name.to_owned(),
        })
    }

    /// Unregister a store. Existing handles keep working.
    pub fn remove_store(&self, name: &str) -> Option<Store> {
        let removed = self.inner.stores.borrow_mut().shift_remove(name);
        if removed.is_some() {
            debug!(store = name, "store.remove");
        }
        removed
    }

    /// Registered names in creation order.
    #[must_use]
    pub fn store_names(&self) -> Vec<String> {
        self.inner.stores.borrow().keys().cloned().collect()
    }

    /// Flush one store. Returns whether listeners were notified.
    pub fn dispatch(&self, name: &str) -> Result<bool> {
        Ok(self.get_store(name)?.dispatch())
    }

    /// Flush every store. Returns how many notified listeners.
    pub fn dispatch_all(&self) -> usize {
        let stores: Vec<Store> = self.inner.stores.borrow().values().cloned().collect();
        stores.iter().filter(|store| store.dispatch()).count()
    }

    /// Add a plugin applied to stores created from now on.
    pub fn use_plugin(&self, plugin: impl Plugin + 'static) {
        self.use_plugin_rc(Rc::new(plugin));
    }

    pub fn use_plugin_rc(&self, plugin: Rc<dyn Plugin>) {
        debug!(plugin = plugin.name(), "runtime.use_plugin");
        self.inner.plugins.borrow_mut().push(plugin);
    }

    /// Suppress the given plugin events on every store of this runtime while
    /// `f` runs.
    pub fn ignore<R>(&self, events: PluginEvents, f: impl FnOnce() -> R) -> R {
        let _guard = IgnoreGuard::new(Rc::clone(&self.inner.ignored), events);
        f()
    }

    #[must_use]
    pub fn registry(&self) -> SharedRegistry {
        Rc::clone(&self.inner.registry)
    }

    /// Drop every store, plugin and token.
    pub fn reset(&self) {
        self.inner.stores.borrow_mut().clear();
        self.inner.plugins.borrow_mut().clear();
        self.inner.registry.borrow_mut().reset();
        self.inner.next_anonymous.set(0);
        self.inner.ignored.set(PluginEvents::empty());
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("stores", &self.store_names())
            .field("plugins", &self.inner.plugins.borrow().len())
            .finish()
    }
}

/// Create a store on this thread's runtime.
pub fn create_store(config: StoreConfig) -> Result<Store> {
    Runtime::global().create_store(config)
}

/// Flush a named store on this thread's runtime.
pub fn dispatch(name: &str) -> Result<bool> {
    Runtime::global().dispatch(name)
}

/// Flush every store on this thread's runtime.
pub fn dispatch_all() -> usize {
    Runtime::global().dispatch_all()
}

/// Register a plugin on this thread's runtime.
pub fn use_plugin(plugin: impl Plugin + 'static) {
    Runtime::global().use_plugin(plugin);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::ActionTree;
    use vigil_core::object;

    #[test]
    fn names_are_generated_and_unique() {
        let rt = Runtime::new();
        let a = rt.create_store(StoreConfig::new(object! {})).unwrap();
        let b = rt.create_store(StoreConfig::new(object! {})).unwrap();
        assert_ne!(a.name(), b.name());
        assert_eq!(rt.store_names(), vec!["store-0", "store-1"]);
    }

    #[test]
    fn generated_names_skip_taken_ones() {
        let rt = Runtime::new();
        rt.create_store(StoreConfig::new(object! {}).with_name("store-0"))
            .unwrap();
        let b = rt.create_store(StoreConfig::new(object! {})).unwrap();
        assert_eq!(b.name(), "store-1");
    }

    #[test]
    fn duplicate_name_is_rejected() {
        let rt = Runtime::new();
        rt.create_store(StoreConfig::new(object! {}).with_name("app"))
            .unwrap();
        let err = rt
            .create_store(StoreConfig::new(object! {}).with_name("app"))
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateStore { .. }));
    }

    #[test]
    fn non_object_state_is_rejected() {
        let rt = Runtime::new();
        let err = rt.create_store(StoreConfig::new(Value::array(vec![]))).unwrap_err();
        assert!(matches!(err, StoreError::InvalidInitState { found: "array" }));
        assert!(rt.store_names().is_empty());
    }

    #[test]
    fn before_init_can_rewrite_state_and_actions() {
        struct Seed;
        impl Plugin for Seed {
            fn before_init(&self, mut init: StoreInit) -> StoreInit {
                init.init_state = object! { "seeded" => true };
                init.actions = ActionTree::new()
                    .with_action("ping", |_, _| Ok(Value::from("pong")));
                init
            }
        }

        let rt = Runtime::new();
        rt.use_plugin(Seed);
        let store = rt.create_store(StoreConfig::new(Value::Null)).unwrap();
        assert_eq!(store.state().get("seeded").as_bool(), Some(true));
        let out = store.call("ping", &[]).unwrap();
        assert_eq!(out.as_str(), Some("pong"));
    }

    #[test]
    fn on_init_sees_registered_store() {
        struct Check(Runtime, Rc<Cell<bool>>);
        impl Plugin for Check {
            fn on_init(&self, store: &Store) {
                self.1.set(self.0.store(store.name()).is_some());
            }
        }

        let rt = Runtime::new();
        let seen = Rc::new(Cell::new(false));
        rt.create_store(
            StoreConfig::new(object! {}).with_plugin(Check(rt.clone(), Rc::clone(&seen))),
        )
        .unwrap();
        assert!(seen.get());
    }

    #[test]
    fn dispatch_unknown_store_fails() {
        let rt = Runtime::new();
        assert!(matches!(
            rt.dispatch("nope"),
            Err(StoreError::UnknownStore { .. })
        ));
    }

    #[test]
    fn reset_clears_everything() {
        let rt = Runtime::new();
        rt.create_store(StoreConfig::new(object! {})).unwrap();
        rt.reset();
        assert!(rt.store_names().is_empty());
        assert_eq!(rt.registry().borrow().token_count(), 0);
    }
}
