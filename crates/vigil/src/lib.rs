#![forbid(unsafe_code)]

//! Vigil public facade crate.
//!
//! Re-exports the observation core and, with the `store` feature, the store
//! shell.

pub use vigil_core::{
    EffectKind, EffectRecord, Interceptor, MutationKind, ObserveError, ObserveOptions, Observed,
    Path, Value, array, object, observe,
};
#[cfg(feature = "store")]
pub use vigil_store::{
    ActionTree, Plugin, PluginEvents, Runtime, Store, StoreConfig, StoreError, StoreOptions,
    create_store, dispatch, use_plugin,
};

pub mod prelude {
    pub use vigil_core as core;
    #[cfg(feature = "store")]
    pub use vigil_store as store;

    pub use vigil_core::{
        ArrayProxy, EffectRecord, MapProxy, ObjectProxy, Observed, Path, SetProxy, Value,
        WeakMapProxy, WeakSetProxy, array, object,
    };
    #[cfg(feature = "store")]
    pub use vigil_store::{
        ActionResult, ActionTree, Observer, Plugin, Runtime, Store, StoreConfig, StoreOptions,
    };
}

#[cfg(all(test, feature = "store"))]
mod tests {
    use super::prelude::*;

    #[test]
    fn prelude_covers_a_store_round_trip() {
        let store = Runtime::new()
            .create_store(StoreConfig::new(object! { "n" => 1 }).with_action(
                "double",
                |state: &ObjectProxy, _: &[Value]| -> ActionResult {
                    let n = state.get("n").as_f64().unwrap_or(0.0);
                    state.set("n", n * 2.0)?;
                    Ok(Value::Undefined)
                },
            ))
            .unwrap();
        store.call("double", &[]).unwrap();
        assert_eq!(store.state().get("n").as_f64(), Some(2.0));
    }
}
