#![forbid(unsafe_code)]

//! Store configuration.

use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use vigil_core::{ObjectProxy, Value};

use crate::actions::{ActionResult, ActionTree};
use crate::error::Result;
use crate::plugin::Plugin;

/// Mutation policy of a store.
///
/// Deserializes from the camelCase JSON form (`{"strictMode": false}`); absent
/// fields take their defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StoreOptions {
    /// Reject mutations outside actions.
    pub strict_mode: bool,
    /// Wrap container members of Sets on access.
    pub proxy_set_deep: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            strict_mode: true,
            proxy_set_deep: false,
        }
    }
}

impl StoreOptions {
    /// Strict mode, shallow Sets.
    #[must_use]
    pub fn strict() -> Self {
        Self::default()
    }

    /// Mutations allowed anywhere; notification waits for a dispatch.
    #[must_use]
    pub fn relaxed() -> Self {
        Self {
            strict_mode: false,
            ..Self::default()
        }
    }

    /// Parse from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    #[must_use]
    pub fn with_strict_mode(mut self, enabled: bool) -> Self {
        self.strict_mode = enabled;
        self
    }

    #[must_use]
    pub fn with_proxy_set_deep(mut self, enabled: bool) -> Self {
        self.proxy_set_deep = enabled;
        self
    }
}

/// Everything needed to create a store.
#[derive(Clone)]
pub struct StoreConfig {
    pub name: Option<String>,
    pub init_state: Value,
    pub actions: ActionTree,
    pub plugins: Vec<Rc<dyn Plugin>>,
    pub options: StoreOptions,
}

impl StoreConfig {
    /// Config with the given root state and defaults for everything else.
    #[must_use]
    pub fn new(init_state: impl Into<Value>) -> Self {
        Self {
            name: None,
            init_state: init_state.into(),
            actions: ActionTree::new(),
            plugins: Vec::new(),
            options: StoreOptions::default(),
        }
    }

    /// Register the store under `name` instead of a generated one.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_actions(mut self, actions: ActionTree) -> Self {
        self.actions = actions;
        self
    }

    /// Add one top-level action.
    #[must_use]
    pub fn with_action<F>(mut self, name: impl Into<String>, action: F) -> Self
    where
        F: Fn(&ObjectProxy, &[Value]) -> ActionResult + 'static,
    {
        self.actions.insert_action(name, action);
        self
    }

    /// Add a store-local plugin, fired after runtime-wide plugins.
    #[must_use]
    pub fn with_plugin(mut self, plugin: impl Plugin + 'static) -> Self {
        self.plugins.push(Rc::new(plugin));
        self
    }

    #[must_use]
    pub fn with_options(mut self, options: StoreOptions) -> Self {
        self.options = options;
        self
    }
}

impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("name", &self.name)
            .field("init_state", &self.init_state)
            .field("actions", &self.actions)
            .field("plugins", &self.plugins.len())
            .field("options", &self.options)
            .finish()
    }
}
