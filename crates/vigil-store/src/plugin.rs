#![forbid(unsafe_code)]

//! Plugin hooks.
//!
//! Plugins observe store construction and every intercepted operation. Hooks
//! fire synchronously, once per operation, in registration order:
//! runtime-wide plugins first, then the store's own.
//!
//! Event kinds can be suppressed for the duration of a closure with
//! [`Runtime::ignore`](crate::runtime::Runtime::ignore).

use std::cell::Cell;
use std::rc::Rc;

use bitflags::bitflags;
use vigil_core::{Path, Value};

use crate::actions::ActionTree;
use crate::store::Store;

bitflags! {
    /// Plugin event kinds, used as a suppression mask.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PluginEvents: u8 {
        const GET = 1 << 0;
        const ADD = 1 << 1;
        const CHANGE = 1 << 2;
        const DELETE = 1 << 3;
    }
}

/// What a store is about to be built from. Plugins may rewrite it.
#[derive(Debug, Clone)]
pub struct StoreInit {
    pub init_state: Value,
    pub actions: ActionTree,
}

/// Store lifecycle and operation hooks. Every method defaults to a no-op.
pub trait Plugin {
    /// Name used in logs.
    fn name(&self) -> &str {
        "plugin"
    }

    /// Transform the initial state and actions before the store exists.
    fn before_init(&self, init: StoreInit) -> StoreInit {
        init
    }

    /// The store was created and registered.
    fn on_init(&self, _store: &Store) {}

    fn on_get(&self, _store: &str, _value: &Value, _path: &Path) {}

    fn on_add(&self, _store: &str, _value: &Value, _path: &Path, _target: &Value) {}

    fn on_change(&self, _store: &str, _value: &Value, _path: &Path, _target: &Value, _old: &Value) {
    }

    fn on_delete(&self, _store: &str, _path: &Path, _target: &Value) {}
}

/// The plugins of one store plus the shared suppression mask.
#[derive(Clone)]
pub(crate) struct PluginSet {
    plugins: Rc<[Rc<dyn Plugin>]>,
    ignored: Rc<Cell<PluginEvents>>,
}

impl PluginSet {
    pub(crate) fn new(plugins: Vec<Rc<dyn Plugin>>, ignored: Rc<Cell<PluginEvents>>) -> Self {
        Self {
            plugins: plugins.into(),
            ignored,
        }
    }

    pub(crate) fn all(&self) -> &[Rc<dyn Plugin>] {
        &self.plugins
    }

    pub(crate) fn len(&self) -> usize {
        self.plugins.len()
    }

    /// Call `f` on every plugin unless `event` is suppressed.
    pub(crate) fn emit(&self, event: PluginEvents, f: impl Fn(&dyn Plugin)) {
        if self.plugins.is_empty() || self.ignored.get().intersects(event) {
            return;
        }
        for plugin in self.plugins.iter() {
            f(plugin.as_ref());
        }
    }
}

/// Adds events to a suppression mask, restoring the previous mask on drop.
pub(crate) struct IgnoreGuard {
    mask: Rc<Cell<PluginEvents>>,
    previous: PluginEvents,
}

impl IgnoreGuard {
    pub(crate) fn new(mask: Rc<Cell<PluginEvents>>, events: PluginEvents) -> Self {
        let previous = mask.get();
        mask.set(previous | events);
        Self { mask, previous }
    }
}

impl Drop for IgnoreGuard {
    fn drop(&mut self) {
        self.mask.set(self.previous);
    }
}
