#![forbid(unsafe_code)]

//! The observation engine.
//!
//! [`observe`] wraps a state graph in [`Proxy`] handles. A proxy stands in for
//! one container and routes every operation through the engine's
//! [`Interceptor`], recording mutations into an [`EffectRecord`] on the way.
//!
//! # Architecture
//!
//! All proxies produced by one `observe` call share an [`Engine`]: the
//! interceptor, the key registry, the effect record, the wrapper cache and
//! the "last observed path" cursor. Nested containers are wrapped lazily, the
//! first time a proxy method hands them out, and inherit the engine of the
//! proxy they came from.
//!
//! The [`WrapperCache`] maps container ids to weak wrapper handles. A proxy is
//! registered before it is returned, so walking a cyclic graph reaches the
//! cached wrapper on the second visit instead of allocating a new one.
//!
//! # Invariants
//!
//! 1. While a wrapper is alive, observing the same container through the same
//!    cache yields that wrapper (`ptr_eq`).
//! 2. Primitives pass through unchanged.
//! 3. No `RefCell` borrow of container data is held while an interceptor
//!    callback runs; callbacks may freely read and mutate the graph.
//!
//! # Failure Modes
//!
//! - A mutation rejected by [`Interceptor::check_mutation`] returns the error
//!   and leaves the container untouched.
//! - A cached wrapper keeps the path it was created with. A container
//!   reachable through two paths reports the path of whichever read created
//!   its live wrapper. The cache holds wrappers weakly, so once every handle
//!   to that wrapper is dropped the next read wraps the container afresh at
//!   the path it was reached through. Whether a moved container reports its
//!   old or new path therefore depends on whether a caller still holds a
//!   handle to it.
//!
//! [`EffectRecord`]: crate::effect::EffectRecord
//! [`Interceptor::check_mutation`]: crate::adapter::Interceptor::check_mutation

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use ahash::AHashMap;

use crate::adapter::{Interceptor, MutationKind, NoopInterceptor};
use crate::effect::{EffectKind, SharedEffects};
use crate::error::{ObserveError, Result};
use crate::path::{Path, SIZE_SEGMENT};
use crate::registry::{KeyRegistry, SharedRegistry};
use crate::value::{
    ArrayData, ContainerId, MapData, ObjectData, PropKey, SetData, Shared, Value, WeakMapData,
    WeakSetData,
};

// ─── Wrapper cache ───────────────────────────────────────────────────────────

const PRUNE_FLOOR: usize = 64;

#[derive(Default)]
struct CacheState {
    entries: AHashMap<ContainerId, Weak<dyn Any>>,
    prune_at: usize,
}

/// Container id → wrapper association.
///
/// Holds wrappers weakly: the cache never keeps a wrapper (or its container)
/// alive. Cloning shares the cache.
#[derive(Clone, Default)]
pub struct WrapperCache {
    state: Rc<RefCell<CacheState>>,
}

impl WrapperCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lookup<T: 'static>(&self, id: ContainerId) -> Option<Proxy<T>> {
        let any = self.state.borrow().entries.get(&id)?.upgrade()?;
        Rc::downcast::<ProxyInner<T>>(any)
            .ok()
            .map(|inner| Proxy { inner })
    }

    fn insert<T: 'static>(&self, proxy: &Proxy<T>) {
        let any: Rc<dyn Any> = proxy.inner.clone();
        let mut state = self.state.borrow_mut();
        state.entries.insert(proxy.id(), Rc::downgrade(&any));
        if state.entries.len() >= state.prune_at.max(PRUNE_FLOOR) {
            state.entries.retain(|_, weak| weak.strong_count() > 0);
            state.prune_at = state.entries.len() * 2;
        }
    }

    /// Number of wrappers still alive.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state
            .borrow()
            .entries
            .values()
            .filter(|w| w.strong_count() > 0)
            .count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget every wrapper. Live wrappers keep working but are no longer
    /// returned by lookups.
    pub fn clear(&self) {
        let mut state = self.state.borrow_mut();
        state.entries.clear();
        state.prune_at = 0;
    }
}

impl fmt::Debug for WrapperCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WrapperCache")
            .field("live", &self.len())
            .finish()
    }
}

// ─── Path cursor ─────────────────────────────────────────────────────────────

/// Shared pointer to the most recently observed path.
#[derive(Debug, Clone, Default)]
pub struct PathCursor(Rc<RefCell<Option<Path>>>);

impl PathCursor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, path: Path) {
        *self.0.borrow_mut() = Some(path);
    }

    #[must_use]
    pub fn get(&self) -> Option<Path> {
        self.0.borrow().clone()
    }

    pub fn take(&self) -> Option<Path> {
        self.0.borrow_mut().take()
    }
}

// ─── Options ─────────────────────────────────────────────────────────────────

/// Parameters of one [`observe`] call.
#[derive(Clone)]
pub struct ObserveOptions {
    interceptor: Rc<dyn Interceptor>,
    keys_stack: Path,
    cache: Option<WrapperCache>,
    proxy_set_deep: bool,
    registry: Option<SharedRegistry>,
    effects: Option<SharedEffects>,
    cursor: Option<PathCursor>,
}

impl ObserveOptions {
    /// Options routing every callback to `interceptor`.
    #[must_use]
    pub fn new(interceptor: Rc<dyn Interceptor>) -> Self {
        Self {
            interceptor,
            keys_stack: Path::root(),
            cache: None,
            proxy_set_deep: false,
            registry: None,
            effects: None,
            cursor: None,
        }
    }

    /// Path prefix of the observed value.
    #[must_use]
    pub fn with_keys_stack(mut self, keys_stack: Path) -> Self {
        self.keys_stack = keys_stack;
        self
    }

    /// Share a wrapper cache across calls. A fresh cache is used otherwise.
    #[must_use]
    pub fn with_cache(mut self, cache: WrapperCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Wrap Set members that are containers.
    #[must_use]
    pub fn with_proxy_set_deep(mut self, deep: bool) -> Self {
        self.proxy_set_deep = deep;
        self
    }

    /// Registry used to tokenize non-string keys. A private one otherwise.
    #[must_use]
    pub fn with_registry(mut self, registry: SharedRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Effect record that receives every write, insert and remove.
    #[must_use]
    pub fn with_effects(mut self, effects: SharedEffects) -> Self {
        self.effects = Some(effects);
        self
    }

    /// Cursor updated on every read.
    #[must_use]
    pub fn with_cursor(mut self, cursor: PathCursor) -> Self {
        self.cursor = Some(cursor);
        self
    }
}

impl Default for ObserveOptions {
    fn default() -> Self {
        Self::new(Rc::new(NoopInterceptor))
    }
}

impl fmt::Debug for ObserveOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserveOptions")
            .field("keys_stack", &self.keys_stack)
            .field("proxy_set_deep", &self.proxy_set_deep)
            .field("shared_cache", &self.cache.is_some())
            .field("effects", &self.effects.is_some())
            .finish_non_exhaustive()
    }
}

// ─── Engine ──────────────────────────────────────────────────────────────────

/// State shared by every proxy of one observation.
pub(crate) struct Engine {
    interceptor: Rc<dyn Interceptor>,
    registry: SharedRegistry,
    effects: Option<SharedEffects>,
    cache: WrapperCache,
    cursor: PathCursor,
    proxy_set_deep: bool,
}

impl Engine {
    fn from_options(options: ObserveOptions) -> (Rc<Self>, Path) {
        let engine = Self {
            interceptor: options.interceptor,
            registry: options.registry.unwrap_or_else(KeyRegistry::shared),
            effects: options.effects,
            cache: options.cache.unwrap_or_default(),
            cursor: options.cursor.unwrap_or_default(),
            proxy_set_deep: options.proxy_set_deep,
        };
        (Rc::new(engine), options.keys_stack)
    }

    pub(crate) fn proxy_set_deep(&self) -> bool {
        self.proxy_set_deep
    }

    /// Wrap `value` if it is a container.
    pub(crate) fn wrap(self: &Rc<Self>, value: Value, path: Path) -> Observed {
        match value {
            Value::Object(c) => Observed::Object(self.proxy(c, path)),
            Value::Array(c) => Observed::Array(self.proxy(c, path)),
            Value::Map(c) => Observed::Map(self.proxy(c, path)),
            Value::Set(c) => Observed::Set(self.proxy(c, path)),
            Value::WeakMap(c) => Observed::WeakMap(self.proxy(c, path)),
            Value::WeakSet(c) => Observed::WeakSet(self.proxy(c, path)),
            other => Observed::Value(other),
        }
    }

    pub(crate) fn proxy<T: 'static>(self: &Rc<Self>, target: Shared<T>, path: Path) -> Proxy<T> {
        if let Some(hit) = self.cache.lookup::<T>(target.id()) {
            return hit;
        }
        let proxy = Proxy {
            inner: Rc::new(ProxyInner {
                target,
                path,
                engine: Rc::clone(self),
            }),
        };
        self.cache.insert(&proxy);
        proxy
    }

    /// Path segment for `key` in `container`, `None` for ignored keys.
    pub(crate) fn identify(&self, container: ContainerId, key: &Value) -> Option<String> {
        self.registry.borrow_mut().identify(container, key)
    }

    pub(crate) fn identify_prop(&self, container: ContainerId, key: &PropKey) -> Option<String> {
        self.registry.borrow_mut().identify_prop(container, key)
    }

    pub(crate) fn read(&self, value: &Value, path: &Path) {
        self.cursor.set(path.clone());
        self.interceptor.on_read(value, path);
    }

    /// `container` is the path of the Map or Set.
    pub(crate) fn size_read(&self, container: &Path) {
        let path = container.child(SIZE_SEGMENT);
        self.cursor.set(path.clone());
        self.interceptor.on_size_read(&path);
    }

    pub(crate) fn check(&self, kind: MutationKind, path: &Path) -> Result<()> {
        self.interceptor.check_mutation(kind, path)
    }

    fn record(&self, kind: EffectKind, path: &Path) {
        if let Some(effects) = &self.effects {
            effects.borrow_mut().record(kind, path);
        }
    }

    pub(crate) fn wrote(&self, value: &Value, path: &Path, old: &Value, target: &Value) {
        self.record(EffectKind::Modify, path);
        self.interceptor.on_write(value, path, old, target);
    }

    pub(crate) fn inserted(&self, value: &Value, path: &Path, target: &Value) {
        self.record(EffectKind::Add, path);
        self.interceptor.on_insert(value, path, target);
    }

    pub(crate) fn removed(&self, path: &Path, target: &Value) {
        self.record(EffectKind::Remove, path);
        self.interceptor.on_remove(path, target);
    }

    /// Emit the size-change write for a Map or Set, if the size moved.
    pub(crate) fn size_changed(&self, container: &Path, old: usize, new: usize, target: &Value) {
        if old != new {
            let path = container.child(SIZE_SEGMENT);
            self.wrote(&Value::from(new), &path, &Value::from(old), target);
        }
    }
}

// ─── Proxies ─────────────────────────────────────────────────────────────────

struct ProxyInner<T> {
    target: Shared<T>,
    path: Path,
    engine: Rc<Engine>,
}

/// Intercepting handle for one container.
///
/// Cloning shares the wrapper. Per-kind operations live in
/// [`crate::adapter`].
pub struct Proxy<T> {
    inner: Rc<ProxyInner<T>>,
}

pub type ObjectProxy = Proxy<ObjectData>;
pub type ArrayProxy = Proxy<ArrayData>;
pub type MapProxy = Proxy<MapData>;
pub type SetProxy = Proxy<SetData>;
pub type WeakMapProxy = Proxy<WeakMapData>;
pub type WeakSetProxy = Proxy<WeakSetData>;

impl<T> Proxy<T> {
    /// Path from the root to this container.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Identity of the wrapped container.
    #[must_use]
    pub fn id(&self) -> ContainerId {
        self.inner.target.id()
    }

    /// Whether both handles are the same wrapper.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// The unwrapped container. Operations on it bypass interception.
    #[must_use]
    pub fn raw(&self) -> Shared<T> {
        self.inner.target.clone()
    }

    /// Path of the most recent read through this proxy's engine.
    #[must_use]
    pub fn last_observed_path(&self) -> Option<Path> {
        self.inner.engine.cursor.get()
    }

    pub(crate) fn target(&self) -> &Shared<T> {
        &self.inner.target
    }

    pub(crate) fn engine(&self) -> &Rc<Engine> {
        &self.inner.engine
    }
}

impl<T> Clone for Proxy<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: ContainerKind> fmt::Debug for Proxy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Proxy")
            .field("kind", &T::KIND)
            .field("id", &self.id())
            .field("path", &self.path().joined())
            .finish()
    }
}

impl<T: ContainerKind> Proxy<T> {
    /// The wrapped container as a raw [`Value`].
    #[must_use]
    pub fn to_value(&self) -> Value {
        T::to_value(self.target().clone())
    }
}

/// Ties each container data type to its [`Value`] and [`Observed`] variant.
pub trait ContainerKind: Sized + 'static {
    const KIND: &'static str;

    fn to_value(shared: Shared<Self>) -> Value;

    fn to_observed(proxy: Proxy<Self>) -> Observed;

    fn from_observed(observed: Observed) -> std::result::Result<Proxy<Self>, Observed>;
}

macro_rules! container_kind {
    ($data:ty, $variant:ident, $kind:literal) => {
        impl ContainerKind for $data {
            const KIND: &'static str = $kind;

            fn to_value(shared: Shared<Self>) -> Value {
                Value::$variant(shared)
            }

            fn to_observed(proxy: Proxy<Self>) -> Observed {
                Observed::$variant(proxy)
            }

            fn from_observed(observed: Observed) -> std::result::Result<Proxy<Self>, Observed> {
                match observed {
                    Observed::$variant(proxy) => Ok(proxy),
                    other => Err(other),
                }
            }
        }
    };
}

container_kind!(ObjectData, Object, "object");
container_kind!(ArrayData, Array, "array");
container_kind!(MapData, Map, "map");
container_kind!(SetData, Set, "set");
container_kind!(WeakMapData, WeakMap, "weakmap");
container_kind!(WeakSetData, WeakSet, "weakset");

// ─── Observed values ─────────────────────────────────────────────────────────

/// Result of reading through a proxy: a primitive or a wrapped container.
#[derive(Clone)]
pub enum Observed {
    Value(Value),
    Object(ObjectProxy),
    Array(ArrayProxy),
    Map(MapProxy),
    Set(SetProxy),
    WeakMap(WeakMapProxy),
    WeakSet(WeakSetProxy),
}

macro_rules! observed_accessors {
    ($($as_fn:ident, $into_fn:ident, $variant:ident, $proxy:ty, $kind:literal;)+) => {
        impl Observed {
            $(
                #[must_use]
                pub fn $as_fn(&self) -> Option<&$proxy> {
                    match self {
                        Self::$variant(proxy) => Some(proxy),
                        _ => None,
                    }
                }

                /// Unwrap the proxy, or fail with [`ObserveError::TypeMismatch`].
                pub fn $into_fn(self) -> Result<$proxy> {
                    match self {
                        Self::$variant(proxy) => Ok(proxy),
                        other => Err(ObserveError::TypeMismatch {
                            expected: $kind,
                            found: other.type_name(),
                        }),
                    }
                }
            )+
        }
    };
}

observed_accessors! {
    as_object, into_object, Object, ObjectProxy, "object";
    as_array, into_array, Array, ArrayProxy, "array";
    as_map, into_map, Map, MapProxy, "map";
    as_set, into_set, Set, SetProxy, "set";
    as_weak_map, into_weak_map, WeakMap, WeakMapProxy, "weakmap";
    as_weak_set, into_weak_set, WeakSet, WeakSetProxy, "weakset";
}

impl Observed {
    /// The underlying value, unwrapped.
    #[must_use]
    pub fn raw(&self) -> Value {
        match self {
            Self::Value(v) => v.clone(),
            Self::Object(p) => p.to_value(),
            Self::Array(p) => p.to_value(),
            Self::Map(p) => p.to_value(),
            Self::Set(p) => p.to_value(),
            Self::WeakMap(p) => p.to_value(),
            Self::WeakSet(p) => p.to_value(),
        }
    }

    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Value(v) => v.type_name(),
            Self::Object(_) => ObjectData::KIND,
            Self::Array(_) => ArrayData::KIND,
            Self::Map(_) => MapData::KIND,
            Self::Set(_) => SetData::KIND,
            Self::WeakMap(_) => WeakMapData::KIND,
            Self::WeakSet(_) => WeakSetData::KIND,
        }
    }

    /// Path of the wrapper, `None` for primitives.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Value(_) => None,
            Self::Object(p) => Some(p.path()),
            Self::Array(p) => Some(p.path()),
            Self::Map(p) => Some(p.path()),
            Self::Set(p) => Some(p.path()),
            Self::WeakMap(p) => Some(p.path()),
            Self::WeakSet(p) => Some(p.path()),
        }
    }

    /// Same wrapper (containers) or identical value (primitives).
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Value(a), Self::Value(b)) => a.is_identical(b),
            (Self::Object(a), Self::Object(b)) => a.ptr_eq(b),
            (Self::Array(a), Self::Array(b)) => a.ptr_eq(b),
            (Self::Map(a), Self::Map(b)) => a.ptr_eq(b),
            (Self::Set(a), Self::Set(b)) => a.ptr_eq(b),
            (Self::WeakMap(a), Self::WeakMap(b)) => a.ptr_eq(b),
            (Self::WeakSet(a), Self::WeakSet(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    #[must_use]
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value(v) => Some(v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        self.as_value().and_then(Value::as_str)
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        self.as_value().and_then(Value::as_f64)
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        self.as_value().and_then(Value::as_bool)
    }

    #[must_use]
    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Value(Value::Undefined))
    }

    /// Convert into a typed proxy, handing the value back on mismatch.
    pub fn downcast<T: ContainerKind>(self) -> std::result::Result<Proxy<T>, Observed> {
        T::from_observed(self)
    }
}

impl fmt::Debug for Observed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => write!(f, "{v:?}"),
            Self::Object(p) => write!(f, "{p:?}"),
            Self::Array(p) => write!(f, "{p:?}"),
            Self::Map(p) => write!(f, "{p:?}"),
            Self::Set(p) => write!(f, "{p:?}"),
            Self::WeakMap(p) => write!(f, "{p:?}"),
            Self::WeakSet(p) => write!(f, "{p:?}"),
        }
    }
}

impl From<Observed> for Value {
    fn from(observed: Observed) -> Self {
        observed.raw()
    }
}

impl From<&Observed> for Value {
    fn from(observed: &Observed) -> Self {
        observed.raw()
    }
}

impl<T: ContainerKind> From<Proxy<T>> for Value {
    fn from(proxy: Proxy<T>) -> Self {
        proxy.to_value()
    }
}

impl<T: ContainerKind> From<&Proxy<T>> for Value {
    fn from(proxy: &Proxy<T>) -> Self {
        proxy.to_value()
    }
}

// ─── Entry points ────────────────────────────────────────────────────────────

/// Wrap `source` for observation.
///
/// Containers come back as proxies rooted at the options' `keys_stack`;
/// anything else is returned unchanged.
pub fn observe(source: &Value, options: ObserveOptions) -> Observed {
    let (engine, path) = Engine::from_options(options);
    engine.wrap(source.clone(), path)
}

/// Typed variant of [`observe`] for a container handle.
pub fn observe_container<T: ContainerKind>(target: &Shared<T>, options: ObserveOptions) -> Proxy<T> {
    let (engine, path) = Engine::from_options(options);
    engine.proxy(target.clone(), path)
}
