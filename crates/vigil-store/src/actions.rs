#![forbid(unsafe_code)]

//! Action definitions and bound action handles.
//!
//! An [`ActionTree`] is the user's (possibly nested) table of action
//! functions. Once a store exists, [`BoundActions`] resolves entries by name
//! or dotted path (`"user.rename"`) and runs them inside the store's action
//! scope, with the observed root passed in front of the caller's arguments.

use std::error::Error;
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use vigil_core::{ObjectProxy, Value};

use crate::error::StoreError;
use crate::store::StoreInner;

/// Error type of an action body. Returned to the caller unchanged.
pub type ActionError = Box<dyn Error>;

pub type ActionResult = Result<Value, ActionError>;

/// An action body: the observed root plus the caller's arguments.
pub type ActionFn = Rc<dyn Fn(&ObjectProxy, &[Value]) -> ActionResult>;

/// Separator of nested action names.
pub const ACTION_PATH_SEPARATOR: char = '.';

#[derive(Clone)]
pub enum ActionNode {
    Action(ActionFn),
    Group(ActionTree),
}

/// Named action functions, nested by group.
#[derive(Clone, Default)]
pub struct ActionTree {
    nodes: IndexMap<String, ActionNode>,
}

impl ActionTree {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_action<F>(mut self, name: impl Into<String>, action: F) -> Self
    where
        F: Fn(&ObjectProxy, &[Value]) -> ActionResult + 'static,
    {
        self.insert_action(name, action);
        self
    }

    #[must_use]
    pub fn with_group(mut self, name: impl Into<String>, group: ActionTree) -> Self {
        self.insert_group(name, group);
        self
    }

    /// Add or replace an action.
    pub fn insert_action<F>(&mut self, name: impl Into<String>, action: F)
    where
        F: Fn(&ObjectProxy, &[Value]) -> ActionResult + 'static,
    {
        self.nodes
            .insert(name.into(), ActionNode::Action(Rc::new(action)));
    }

    /// Add or replace a group.
    pub fn insert_group(&mut self, name: impl Into<String>, group: ActionTree) {
        self.nodes.insert(name.into(), ActionNode::Group(group));
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ActionNode> {
        self.nodes.get(name)
    }

    /// Look up an action by dotted path.
    #[must_use]
    pub fn resolve(&self, path: &str) -> Option<&ActionFn> {
        let mut tree = self;
        let mut segments = path.split(ACTION_PATH_SEPARATOR).peekable();
        while let Some(segment) = segments.next() {
            match (tree.nodes.get(segment)?, segments.peek()) {
                (ActionNode::Action(f), None) => return Some(f),
                (ActionNode::Group(group), Some(_)) => tree = group,
                _ => return None,
            }
        }
        None
    }

    /// Dotted paths of every action, depth first in insertion order.
    #[must_use]
    pub fn paths(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_paths("", &mut out);
        out
    }

    fn collect_paths(&self, prefix: &str, out: &mut Vec<String>) {
        for (name, node) in &self.nodes {
            let path = if prefix.is_empty() {
                name.clone()
            } else {
                format!("{prefix}{ACTION_PATH_SEPARATOR}{name}")
            };
            match node {
                ActionNode::Action(_) => out.push(path),
                ActionNode::Group(group) => group.collect_paths(&path, out),
            }
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl fmt::Debug for ActionTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.paths()).finish()
    }
}

/// One action bound to its store.
#[derive(Clone)]
pub struct BoundAction {
    store: Weak<StoreInner>,
    store_name: Rc<str>,
    path: String,
    action: ActionFn,
}

impl BoundAction {
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Run the action with `args`.
    pub fn call(&self, args: &[Value]) -> ActionResult {
        let Some(store) = self.store.upgrade() else {
            return Err(Box::new(StoreError::UnknownStore {
                name: self.store_name.to_string(),
            }));
        };
        store.run_action(&self.path, |state| (self.action)(state, args))
    }
}

impl fmt::Debug for BoundAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundAction")
            .field("store", &self.store_name)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// The action table of a store.
#[derive(Clone)]
pub struct BoundActions {
    store: Weak<StoreInner>,
    store_name: Rc<str>,
    tree: ActionTree,
}

impl BoundActions {
    pub(crate) fn new(store: Weak<StoreInner>, store_name: &str, tree: ActionTree) -> Self {
        Self {
            store,
            store_name: Rc::from(store_name),
            tree,
        }
    }

    /// Bind the action at `path`.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<BoundAction> {
        self.tree.resolve(path).map(|action| BoundAction {
            store: Weak::clone(&self.store),
            store_name: Rc::clone(&self.store_name),
            path: path.to_owned(),
            action: Rc::clone(action),
        })
    }

    /// Run the action at `path` with `args`.
    ///
    /// An unknown path fails with [`StoreError::UnknownAction`]; errors from
    /// the action body are returned as they are.
    pub fn call(&self, path: &str, args: &[Value]) -> ActionResult {
        match self.get(path) {
            Some(action) => action.call(args),
            None => Err(Box::new(StoreError::UnknownAction {
                path: path.to_owned(),
            })),
        }
    }

    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.tree.resolve(path).is_some()
    }

    #[must_use]
    pub fn paths(&self) -> Vec<String> {
        self.tree.paths()
    }

    #[must_use]
    pub fn tree(&self) -> &ActionTree {
        &self.tree
    }
}

impl fmt::Debug for BoundActions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundActions")
            .field("store", &self.store_name)
            .field("actions", &self.tree)
            .finish()
    }
}
