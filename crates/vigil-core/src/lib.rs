#![forbid(unsafe_code)]

//! Core: dynamic state values, key identity registry, container adapters,
//! observation engine, and effect aggregation.

pub mod adapter;
pub mod effect;
pub mod error;
pub mod json;
pub mod observe;
pub mod path;
pub mod registry;
pub mod value;

pub use adapter::{Interceptor, MutationKind, NoopInterceptor};
pub use effect::{EffectKind, EffectRecord, SharedEffects};
pub use error::{ObserveError, Result};
pub use observe::{
    ArrayProxy, ContainerKind, MapProxy, ObjectProxy, ObserveOptions, Observed, PathCursor, Proxy,
    SetProxy, WeakMapProxy, WeakSetProxy, WrapperCache, observe, observe_container,
};
pub use path::Path;
pub use registry::{KeyRegistry, ObserverId, SharedRegistry, SweepStats};
pub use value::{ContainerId, MapKey, PropKey, Shared, Symbol, Value};
