#![forbid(unsafe_code)]

//! Store shell: named stores over an observed root object, with action
//! gating, batched listener notification, plugin hooks and read tracking.
//!
//! # Example
//!
//! ```
//! use vigil_core::object;
//! use vigil_store::{Runtime, StoreConfig};
//!
//! let rt = Runtime::new();
//! let store = rt
//!     .create_store(StoreConfig::new(object! { "count" => 0 }).with_action(
//!         "increment",
//!         |state, _| {
//!             let n = state.get("count").as_f64().unwrap_or(0.0);
//!             state.set("count", n + 1.0)?;
//!             Ok(vigil_core::Value::Undefined)
//!         },
//!     ))
//!     .unwrap();
//!
//! assert!(store.state().set("count", 5).is_err());
//! store.call("increment", &[]).unwrap();
//! assert_eq!(store.state().get("count").as_f64(), Some(1.0));
//! ```

pub mod actions;
pub mod error;
pub mod observer;
pub mod options;
pub mod plugin;
pub mod runtime;
pub mod store;

pub use actions::{
    ACTION_PATH_SEPARATOR, ActionError, ActionFn, ActionNode, ActionResult, ActionTree,
    BoundAction, BoundActions,
};
pub use error::{Result, StoreError};
pub use observer::{Observer, ReadSet};
pub use options::{StoreConfig, StoreOptions};
pub use plugin::{Plugin, PluginEvents, StoreInit};
pub use runtime::{Runtime, create_store, dispatch, dispatch_all, use_plugin};
pub use store::{Phase, Store, Subscription, WeakStore};
