#![forbid(unsafe_code)]

//! Dynamic state values.
//!
//! State graphs are built from [`Value`]: primitives plus six container kinds
//! (object, array, map, set, weak map, weak set). Containers are shared
//! handles with reference semantics: cloning a `Value::Object` clones the
//! handle, never the data, so the same container can be reachable from many
//! places in the graph (including from itself).
//!
//! # Identity
//!
//! Every container receives a process-unique [`ContainerId`] when it is
//! constructed. Ids are monotonic and never reused, which makes them usable as
//! stable handles in side tables (wrapper cache, key registry, weak maps).
//!
//! # Equality
//!
//! [`Value::is_identical`] is the single equality test used by the adapters:
//! primitives compare by value (`NaN` equals `NaN`, `-0` equals `+0`),
//! symbols and containers compare by identity. [`MapKey`] hashes consistently
//! with it, so Map keys and Set members follow the same rule.

use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use ahash::AHashMap;
use indexmap::{IndexMap, IndexSet};

// ─── Container ids ───────────────────────────────────────────────────────────

static NEXT_CONTAINER_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a container instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContainerId(u64);

impl ContainerId {
    fn next() -> Self {
        Self(NEXT_CONTAINER_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw id value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ─── Symbols ─────────────────────────────────────────────────────────────────

const WELL_KNOWN_ITERATOR: u64 = 1;
const WELL_KNOWN_ASYNC_ITERATOR: u64 = 2;
const WELL_KNOWN_TO_PRIMITIVE: u64 = 3;
const WELL_KNOWN_TO_STRING_TAG: u64 = 4;
const WELL_KNOWN_HAS_INSTANCE: u64 = 5;
const WELL_KNOWN_COUNT: u64 = 5;

static NEXT_SYMBOL_ID: AtomicU64 = AtomicU64::new(WELL_KNOWN_COUNT + 1);

/// An opaque, globally unique property key.
///
/// Two symbols are equal only if they were produced by the same constructor
/// call (or are the same well-known symbol). The description is informational.
#[derive(Clone)]
pub struct Symbol {
    id: u64,
    description: Option<Rc<str>>,
}

impl Symbol {
    /// Create a fresh symbol with a description.
    #[must_use]
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            id: NEXT_SYMBOL_ID.fetch_add(1, Ordering::Relaxed),
            description: Some(Rc::from(description.into())),
        }
    }

    /// Create a fresh symbol without a description.
    #[must_use]
    pub fn anonymous() -> Self {
        Self {
            id: NEXT_SYMBOL_ID.fetch_add(1, Ordering::Relaxed),
            description: None,
        }
    }

    fn well_known(id: u64, description: &str) -> Self {
        Self {
            id,
            description: Some(Rc::from(description)),
        }
    }

    /// Iteration protocol marker.
    #[must_use]
    pub fn iterator() -> Self {
        Self::well_known(WELL_KNOWN_ITERATOR, "Symbol.iterator")
    }

    /// Async iteration protocol marker.
    #[must_use]
    pub fn async_iterator() -> Self {
        Self::well_known(WELL_KNOWN_ASYNC_ITERATOR, "Symbol.asyncIterator")
    }

    /// Primitive-coercion hook.
    #[must_use]
    pub fn to_primitive() -> Self {
        Self::well_known(WELL_KNOWN_TO_PRIMITIVE, "Symbol.toPrimitive")
    }

    /// String-tag coercion hook.
    #[must_use]
    pub fn to_string_tag() -> Self {
        Self::well_known(WELL_KNOWN_TO_STRING_TAG, "Symbol.toStringTag")
    }

    /// Instance-check hook.
    #[must_use]
    pub fn has_instance() -> Self {
        Self::well_known(WELL_KNOWN_HAS_INSTANCE, "Symbol.hasInstance")
    }

    /// Raw symbol id.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Optional description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Whether this is one of the fixed well-known symbols.
    #[must_use]
    pub fn is_well_known(&self) -> bool {
        self.id <= WELL_KNOWN_COUNT
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Symbol {}

impl Hash for Symbol {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.description {
            Some(d) => write!(f, "Symbol({d})"),
            None => write!(f, "Symbol(#{})", self.id),
        }
    }
}

// ─── Property keys ───────────────────────────────────────────────────────────

/// Key of a plain-object property.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropKey {
    Str(Rc<str>),
    Symbol(Symbol),
}

impl PropKey {
    /// The key as a [`Value`].
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Str(s) => Value::String(Rc::clone(s)),
            Self::Symbol(sym) => Value::Symbol(sym.clone()),
        }
    }

    /// String form, if this is a string key.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            Self::Symbol(_) => None,
        }
    }
}

impl From<&str> for PropKey {
    fn from(s: &str) -> Self {
        Self::Str(Rc::from(s))
    }
}

impl From<String> for PropKey {
    fn from(s: String) -> Self {
        Self::Str(Rc::from(s))
    }
}

impl From<&String> for PropKey {
    fn from(s: &String) -> Self {
        Self::Str(Rc::from(s.as_str()))
    }
}

impl From<Symbol> for PropKey {
    fn from(sym: Symbol) -> Self {
        Self::Symbol(sym)
    }
}

impl From<&Symbol> for PropKey {
    fn from(sym: &Symbol) -> Self {
        Self::Symbol(sym.clone())
    }
}

impl fmt::Display for PropKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => f.write_str(s),
            Self::Symbol(sym) => write!(f, "{sym:?}"),
        }
    }
}

// ─── Shared container handles ────────────────────────────────────────────────

struct Node<T> {
    id: ContainerId,
    data: RefCell<T>,
}

/// Shared handle to a container's data.
///
/// Cloning shares the same underlying container.
pub struct Shared<T> {
    node: Rc<Node<T>>,
}

impl<T> Shared<T> {
    /// Allocate a new container with a fresh [`ContainerId`].
    #[must_use]
    pub fn new(data: T) -> Self {
        Self {
            node: Rc::new(Node {
                id: ContainerId::next(),
                data: RefCell::new(data),
            }),
        }
    }

    /// Identity of this container.
    #[inline]
    #[must_use]
    pub fn id(&self) -> ContainerId {
        self.node.id
    }

    /// Borrow the container data.
    ///
    /// # Panics
    ///
    /// Panics if the data is currently mutably borrowed.
    pub fn borrow(&self) -> Ref<'_, T> {
        self.node.data.borrow()
    }

    /// Mutably borrow the container data.
    ///
    /// # Panics
    ///
    /// Panics if the data is currently borrowed.
    pub fn borrow_mut(&self) -> RefMut<'_, T> {
        self.node.data.borrow_mut()
    }

    /// Whether two handles point at the same container.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.node, &other.node)
    }

    /// Create a non-owning handle.
    #[must_use]
    pub fn downgrade(&self) -> WeakShared<T> {
        WeakShared {
            id: self.node.id,
            node: Rc::downgrade(&self.node),
        }
    }
}

impl<T> Clone for Shared<T> {
    fn clone(&self) -> Self {
        Self {
            node: Rc::clone(&self.node),
        }
    }
}

/// Non-owning handle to a container.
pub struct WeakShared<T> {
    id: ContainerId,
    node: Weak<Node<T>>,
}

impl<T> WeakShared<T> {
    /// Identity of the referenced container (valid even after it is dropped).
    #[must_use]
    pub fn id(&self) -> ContainerId {
        self.id
    }

    /// Upgrade to an owning handle if the container is still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<Shared<T>> {
        self.node.upgrade().map(|node| Shared { node })
    }

    /// Whether the container is still alive.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.node.strong_count() > 0
    }
}

impl<T> Clone for WeakShared<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            node: Weak::clone(&self.node),
        }
    }
}

// ─── Container data ──────────────────────────────────────────────────────────

/// Plain-object storage (insertion ordered).
pub type ObjectData = IndexMap<PropKey, Value>;
/// Array storage.
pub type ArrayData = Vec<Value>;
/// Map storage (insertion ordered, SameValueZero keys).
pub type MapData = IndexMap<MapKey, Value>;
/// Set storage (insertion ordered, SameValueZero members).
pub type SetData = IndexSet<MapKey>;

pub type ObjectRef = Shared<ObjectData>;
pub type ArrayRef = Shared<ArrayData>;
pub type MapRef = Shared<MapData>;
pub type SetRef = Shared<SetData>;
pub type WeakMapRef = Shared<WeakMapData>;
pub type WeakSetRef = Shared<WeakSetData>;

/// Non-owning reference to any container, used as a weak-collection key.
#[derive(Clone)]
pub enum WeakContainer {
    Object(WeakShared<ObjectData>),
    Array(WeakShared<ArrayData>),
    Map(WeakShared<MapData>),
    Set(WeakShared<SetData>),
    WeakMap(WeakShared<WeakMapData>),
    WeakSet(WeakShared<WeakSetData>),
}

impl WeakContainer {
    /// Identity of the referenced container.
    #[must_use]
    pub fn id(&self) -> ContainerId {
        match self {
            Self::Object(w) => w.id(),
            Self::Array(w) => w.id(),
            Self::Map(w) => w.id(),
            Self::Set(w) => w.id(),
            Self::WeakMap(w) => w.id(),
            Self::WeakSet(w) => w.id(),
        }
    }

    /// Whether the referenced container is still alive.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        match self {
            Self::Object(w) => w.is_alive(),
            Self::Array(w) => w.is_alive(),
            Self::Map(w) => w.is_alive(),
            Self::Set(w) => w.is_alive(),
            Self::WeakMap(w) => w.is_alive(),
            Self::WeakSet(w) => w.is_alive(),
        }
    }

    /// Recover the container as a value, if still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<Value> {
        match self {
            Self::Object(w) => w.upgrade().map(Value::Object),
            Self::Array(w) => w.upgrade().map(Value::Array),
            Self::Map(w) => w.upgrade().map(Value::Map),
            Self::Set(w) => w.upgrade().map(Value::Set),
            Self::WeakMap(w) => w.upgrade().map(Value::WeakMap),
            Self::WeakSet(w) => w.upgrade().map(Value::WeakSet),
        }
    }
}

/// Weak-keyed map storage.
///
/// Keys are held through [`WeakContainer`] handles, so an entry never keeps
/// its key alive. Entries whose key has been dropped are invisible to lookups
/// and are pruned lazily on mutation.
#[derive(Default)]
pub struct WeakMapData {
    entries: AHashMap<ContainerId, (WeakContainer, Value)>,
}

impl WeakMapData {
    /// Value stored for a live key.
    #[must_use]
    pub fn get(&self, key: ContainerId) -> Option<&Value> {
        self.entries
            .get(&key)
            .filter(|(weak, _)| weak.is_alive())
            .map(|(_, value)| value)
    }

    /// Whether a live entry exists for `key`.
    #[must_use]
    pub fn contains(&self, key: ContainerId) -> bool {
        self.get(key).is_some()
    }

    /// Insert or replace, returning the previous value.
    pub fn insert(&mut self, key: WeakContainer, value: Value) -> Option<Value> {
        self.prune();
        self.entries
            .insert(key.id(), (key, value))
            .map(|(_, old)| old)
    }

    /// Remove a live entry, returning its value.
    pub fn remove(&mut self, key: ContainerId) -> Option<Value> {
        self.prune();
        self.entries.remove(&key).map(|(_, value)| value)
    }

    /// Number of entries whose key is still alive.
    #[must_use]
    pub fn live_len(&self) -> usize {
        self.entries.values().filter(|(w, _)| w.is_alive()).count()
    }

    /// Drop entries whose key has been dropped.
    pub fn prune(&mut self) {
        self.entries.retain(|_, (weak, _)| weak.is_alive());
    }
}

/// Weak-keyed set storage. Same liveness rules as [`WeakMapData`].
#[derive(Default)]
pub struct WeakSetData {
    entries: AHashMap<ContainerId, WeakContainer>,
}

impl WeakSetData {
    /// Whether a live member with this id exists.
    #[must_use]
    pub fn contains(&self, key: ContainerId) -> bool {
        self.entries.get(&key).is_some_and(WeakContainer::is_alive)
    }

    /// Insert a member. Returns `true` if it was not already present.
    pub fn insert(&mut self, key: WeakContainer) -> bool {
        self.prune();
        self.entries.insert(key.id(), key).is_none()
    }

    /// Remove a member. Returns `true` if it was present.
    pub fn remove(&mut self, key: ContainerId) -> bool {
        self.prune();
        self.entries.remove(&key).is_some()
    }

    /// Number of members still alive.
    #[must_use]
    pub fn live_len(&self) -> usize {
        self.entries.values().filter(|w| w.is_alive()).count()
    }

    /// Drop members that have been dropped.
    pub fn prune(&mut self) {
        self.entries.retain(|_, weak| weak.is_alive());
    }
}

// ─── Value ───────────────────────────────────────────────────────────────────

/// A dynamic state value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    Symbol(Symbol),
    Object(ObjectRef),
    Array(ArrayRef),
    Map(MapRef),
    Set(SetRef),
    WeakMap(WeakMapRef),
    WeakSet(WeakSetRef),
}

impl Value {
    /// New empty plain object.
    #[must_use]
    pub fn object() -> Self {
        Self::Object(Shared::new(ObjectData::new()))
    }

    /// New plain object from key/value pairs.
    pub fn object_from<K, I>(entries: I) -> Self
    where
        K: Into<PropKey>,
        I: IntoIterator<Item = (K, Value)>,
    {
        let data: ObjectData = entries.into_iter().map(|(k, v)| (k.into(), v)).collect();
        Self::Object(Shared::new(data))
    }

    /// New array from items.
    pub fn array(items: impl IntoIterator<Item = Value>) -> Self {
        Self::Array(Shared::new(items.into_iter().collect()))
    }

    /// New empty Map.
    #[must_use]
    pub fn map() -> Self {
        Self::Map(Shared::new(MapData::new()))
    }

    /// New Map from key/value pairs (later duplicates win, first position kept).
    pub fn map_from(entries: impl IntoIterator<Item = (Value, Value)>) -> Self {
        let data: MapData = entries
            .into_iter()
            .map(|(k, v)| (MapKey::new(k), v))
            .collect();
        Self::Map(Shared::new(data))
    }

    /// New empty Set.
    #[must_use]
    pub fn set() -> Self {
        Self::Set(Shared::new(SetData::new()))
    }

    /// New Set from members (duplicates collapse).
    pub fn set_from(members: impl IntoIterator<Item = Value>) -> Self {
        let data: SetData = members.into_iter().map(MapKey::new).collect();
        Self::Set(Shared::new(data))
    }

    /// New empty WeakMap.
    #[must_use]
    pub fn weak_map() -> Self {
        Self::WeakMap(Shared::new(WeakMapData::default()))
    }

    /// New empty WeakSet.
    #[must_use]
    pub fn weak_set() -> Self {
        Self::WeakSet(Shared::new(WeakSetData::default()))
    }

    /// Short lowercase name of the variant (for errors and logs).
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Symbol(_) => "symbol",
            Self::Object(_) => "object",
            Self::Array(_) => "array",
            Self::Map(_) => "map",
            Self::Set(_) => "set",
            Self::WeakMap(_) => "weakmap",
            Self::WeakSet(_) => "weakset",
        }
    }

    /// Whether this value is one of the six container kinds.
    #[must_use]
    pub fn is_container(&self) -> bool {
        self.container_id().is_some()
    }

    /// Identity of the container, if this is one.
    #[must_use]
    pub fn container_id(&self) -> Option<ContainerId> {
        match self {
            Self::Object(c) => Some(c.id()),
            Self::Array(c) => Some(c.id()),
            Self::Map(c) => Some(c.id()),
            Self::Set(c) => Some(c.id()),
            Self::WeakMap(c) => Some(c.id()),
            Self::WeakSet(c) => Some(c.id()),
            _ => None,
        }
    }

    /// Non-owning handle to the container, if this is one.
    #[must_use]
    pub fn downgrade(&self) -> Option<WeakContainer> {
        match self {
            Self::Object(c) => Some(WeakContainer::Object(c.downgrade())),
            Self::Array(c) => Some(WeakContainer::Array(c.downgrade())),
            Self::Map(c) => Some(WeakContainer::Map(c.downgrade())),
            Self::Set(c) => Some(WeakContainer::Set(c.downgrade())),
            Self::WeakMap(c) => Some(WeakContainer::WeakMap(c.downgrade())),
            Self::WeakSet(c) => Some(WeakContainer::WeakSet(c.downgrade())),
            _ => None,
        }
    }

    /// Identity comparison used for change detection.
    ///
    /// Primitives compare by value (`NaN` is identical to `NaN`, `-0` to `+0`),
    /// symbols and containers by identity.
    #[must_use]
    pub fn is_identical(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined) | (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Symbol(a), Self::Symbol(b)) => a == b,
            _ => match (self.container_id(), other.container_id()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }

    #[must_use]
    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_symbol(&self) -> Option<&Symbol> {
        match self {
            Self::Symbol(s) => Some(s),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.is_identical(other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Containers print shallowly: graphs may be cyclic.
        match self {
            Self::Undefined => f.write_str("undefined"),
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s:?}"),
            Self::Symbol(s) => write!(f, "{s:?}"),
            Self::Object(c) => write!(f, "Object#{}({} keys)", c.id(), c.borrow().len()),
            Self::Array(c) => write!(f, "Array#{}({} items)", c.id(), c.borrow().len()),
            Self::Map(c) => write!(f, "Map#{}({} entries)", c.id(), c.borrow().len()),
            Self::Set(c) => write!(f, "Set#{}({} members)", c.id(), c.borrow().len()),
            Self::WeakMap(c) => write!(f, "WeakMap#{}", c.id()),
            Self::WeakSet(c) => write!(f, "WeakSet#{}", c.id()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Number(n as f64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Self::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(Rc::from(s))
    }
}

impl From<Symbol> for Value {
    fn from(s: Symbol) -> Self {
        Self::Symbol(s)
    }
}

impl From<&Symbol> for Value {
    fn from(s: &Symbol) -> Self {
        Self::Symbol(s.clone())
    }
}

impl From<&Value> for Value {
    fn from(v: &Value) -> Self {
        v.clone()
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

// ─── Map keys ────────────────────────────────────────────────────────────────

/// A value used as a Map key or Set member.
///
/// Equality and hashing follow SameValueZero: numbers by value with `NaN`
/// equal to itself and `-0` equal to `+0`, strings by content, symbols and
/// containers by identity.
#[derive(Debug, Clone)]
pub struct MapKey(Value);

impl MapKey {
    /// Wrap a value as a key, normalising `-0` to `+0`.
    #[must_use]
    pub fn new(value: Value) -> Self {
        match value {
            Value::Number(n) if n == 0.0 => Self(Value::Number(0.0)),
            other => Self(other),
        }
    }

    /// The wrapped value.
    #[must_use]
    pub fn value(&self) -> &Value {
        &self.0
    }

    /// Unwrap the value.
    #[must_use]
    pub fn into_value(self) -> Value {
        self.0
    }
}

impl PartialEq for MapKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.is_identical(&other.0)
    }
}

impl Eq for MapKey {}

impl Hash for MapKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(&self.0).hash(state);
        match &self.0 {
            Value::Undefined | Value::Null => {}
            Value::Bool(b) => b.hash(state),
            Value::Number(n) => {
                let bits = if n.is_nan() {
                    f64::NAN.to_bits()
                } else if *n == 0.0 {
                    0.0f64.to_bits()
                } else {
                    n.to_bits()
                };
                bits.hash(state);
            }
            Value::String(s) => s.hash(state),
            Value::Symbol(s) => s.hash(state),
            other => other.container_id().hash(state),
        }
    }
}

impl From<Value> for MapKey {
    fn from(value: Value) -> Self {
        Self::new(value)
    }
}

// ─── Construction macros ─────────────────────────────────────────────────────

/// Build a plain-object [`Value`].
///
/// ```
/// use vigil_core::{object, array};
///
/// let state = object! {
///     "name" => "a",
///     "tags" => array!["x", "y"],
/// };
/// assert_eq!(state.type_name(), "object");
/// ```
#[macro_export]
macro_rules! object {
    () => {
        $crate::value::Value::object()
    };
    ($($key:expr => $val:expr),+ $(,)?) => {{
        let entries: ::std::vec::Vec<($crate::value::PropKey, $crate::value::Value)> =
            ::std::vec![$(($crate::value::PropKey::from($key), $crate::value::Value::from($val))),+];
        $crate::value::Value::object_from(entries)
    }};
}

/// Build an array [`Value`].
#[macro_export]
macro_rules! array {
    ($($val:expr),* $(,)?) => {{
        let items: ::std::vec::Vec<$crate::value::Value> =
            ::std::vec![$($crate::value::Value::from($val)),*];
        $crate::value::Value::array(items)
    }};
}
