#![forbid(unsafe_code)]

//! Key identity registry.
//!
//! Paths are sequences of strings, but Map keys, Set members and symbol
//! properties are not strings. The registry turns each `(container, key)`
//! pair into a stable string token and remembers how to map the token back to
//! the original key.
//!
//! # Token format
//!
//! `@<container id>:<key id>`. String keys never get a token: they are used
//! verbatim. Well-known symbols are ignored entirely ([`KeyRegistry::identify`]
//! returns `None`).
//!
//! # Reclaim
//!
//! Tokens are kept only while some observer still uses them. Observers
//! declare their token set after every tracked read
//! ([`mark_used_tokens`](KeyRegistry::mark_used_tokens)). Declaring, releasing
//! an observer, and [`sweep_idle`](KeyRegistry::sweep_idle) all run a
//! [`sweep`](KeyRegistry::sweep) that drops every token no live observer
//! declared, then every key id no remaining token refers to. A key seen again
//! after its id was reclaimed gets a new id, hence a new token.
//!
//! Sweeps triggered this way wait while a tracked read is in progress
//! ([`begin_tracking`](KeyRegistry::begin_tracking)): the tokens such a read
//! has met are not declared yet. The declaration that closes the outermost
//! tracked read sweeps.
//!
//! # Invariants
//!
//! 1. While a token is declared by a live observer, `identify` returns that
//!    same token for its `(container, key)` pair and `resolve` maps it back.
//! 2. `forward` and `reverse` always contain exactly the same tokens.
//! 3. Every key id referenced by a token is present in `key_ids`.
//! 4. Outside tracked reads, after any declaration or release the registry
//!    holds only tokens some live observer declares.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use ahash::{AHashMap, AHashSet};
use tracing::trace;

use crate::value::{ContainerId, MapKey, PropKey, Value, WeakContainer};

/// Prefix that marks a path segment as a registry token.
pub const TOKEN_PREFIX: char = '@';

/// Separator between the container id and key id inside a token.
pub const TOKEN_SEPARATOR: char = ':';

/// Registry handle shared between stores and engines.
pub type SharedRegistry = Rc<RefCell<KeyRegistry>>;

static NEXT_OBSERVER_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a consumer that declares token usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(u64);

impl ObserverId {
    /// Allocate a fresh, process-unique observer id.
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_OBSERVER_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// What a sweep reclaimed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    pub tokens_reclaimed: usize,
    pub keys_reclaimed: usize,
}

/// Identity a key id is assigned to. Containers are keyed by id so the
/// registry never holds them strongly.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum KeyIdentity {
    Container(ContainerId),
    Primitive(MapKey),
}

#[derive(Clone)]
enum StoredKey {
    Primitive(Value),
    Container(WeakContainer),
}

impl StoredKey {
    fn get(&self) -> Option<Value> {
        match self {
            Self::Primitive(value) => Some(value.clone()),
            Self::Container(weak) => weak.upgrade(),
        }
    }
}

impl fmt::Debug for StoredKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primitive(value) => write!(f, "{value:?}"),
            Self::Container(weak) => write!(f, "Weak#{}", weak.id()),
        }
    }
}

#[derive(Debug, Clone)]
struct TokenEntry {
    container: ContainerId,
    key_id: u64,
    key: StoredKey,
}

/// Assigns and recalls string tokens for non-string keys.
#[derive(Debug, Default)]
pub struct KeyRegistry {
    next_key_id: u64,
    key_ids: AHashMap<KeyIdentity, u64>,
    forward: AHashMap<(ContainerId, u64), String>,
    reverse: AHashMap<String, TokenEntry>,
    usage: AHashMap<ObserverId, AHashSet<String>>,
    tracking: usize,
}

impl KeyRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry behind a shared handle.
    #[must_use]
    pub fn shared() -> SharedRegistry {
        Rc::new(RefCell::new(Self::new()))
    }

    /// Whether accesses through `key` are invisible to the engine.
    #[must_use]
    pub fn is_ignored(key: &Value) -> bool {
        matches!(key, Value::Symbol(sym) if sym.is_well_known())
    }

    /// Path segment for `key` inside `container`.
    ///
    /// Strings are returned unchanged, well-known symbols yield `None`, every
    /// other key is mapped to a token.
    pub fn identify(&mut self, container: ContainerId, key: &Value) -> Option<String> {
        match key {
            Value::String(s) => return Some(s.to_string()),
            _ if Self::is_ignored(key) => return None,
            _ => {}
        }

        let key_id = self.key_id(key);
        if let Some(token) = self.forward.get(&(container, key_id)) {
            return Some(token.clone());
        }

        let token = format!("{TOKEN_PREFIX}{container}{TOKEN_SEPARATOR}{key_id}");
        self.forward.insert((container, key_id), token.clone());
        self.reverse.insert(
            token.clone(),
            TokenEntry {
                container,
                key_id,
                key: match key.downgrade() {
                    Some(weak) => StoredKey::Container(weak),
                    None => StoredKey::Primitive(key.clone()),
                },
            },
        );
        Some(token)
    }

    /// [`identify`](Self::identify) for plain-object property keys.
    pub fn identify_prop(&mut self, container: ContainerId, key: &PropKey) -> Option<String> {
        match key {
            PropKey::Str(s) => Some(s.to_string()),
            PropKey::Symbol(_) => self.identify(container, &key.to_value()),
        }
    }

    fn key_id(&mut self, key: &Value) -> u64 {
        let identity = match key.container_id() {
            Some(id) => KeyIdentity::Container(id),
            None => KeyIdentity::Primitive(MapKey::new(key.clone())),
        };
        if let Some(id) = self.key_ids.get(&identity) {
            return *id;
        }
        self.next_key_id += 1;
        let id = self.next_key_id;
        self.key_ids.insert(identity, id);
        id
    }

    /// Original key for a token, if the token is still registered and its
    /// key (when a container) is still alive.
    #[must_use]
    pub fn resolve(&self, token: &str) -> Option<Value> {
        self.reverse.get(token).and_then(|entry| entry.key.get())
    }

    /// Container a token was issued for.
    #[must_use]
    pub fn container_of(&self, token: &str) -> Option<ContainerId> {
        self.reverse.get(token).map(|entry| entry.container)
    }

    /// Whether `segment` is a currently registered token.
    #[must_use]
    pub fn is_token(&self, segment: &str) -> bool {
        segment.starts_with(TOKEN_PREFIX) && self.reverse.contains_key(segment)
    }

    /// Replace the token set declared by `observer`.
    ///
    /// Segments that are not registered tokens are skipped.
    pub fn mark_used_tokens<I, S>(&mut self, observer: ObserverId, tokens: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let used: AHashSet<String> = tokens
            .into_iter()
            .filter(|t| self.is_token(t.as_ref()))
            .map(|t| t.as_ref().to_owned())
            .collect();
        self.usage.insert(observer, used);
        self.sweep_idle();
    }

    /// Tokens currently declared by `observer`.
    #[must_use]
    pub fn used_tokens(&self, observer: ObserverId) -> Option<&AHashSet<String>> {
        self.usage.get(&observer)
    }

    /// Forget `observer` and reclaim whatever no other observer uses.
    ///
    /// Inside a tracked read the sweep is left to the closing declaration and
    /// the returned stats are empty.
    pub fn release_observer(&mut self, observer: ObserverId) -> SweepStats {
        self.usage.remove(&observer);
        self.sweep_idle().unwrap_or_default()
    }

    /// Open a tracked read. Sweeps wait until every open read is closed.
    pub fn begin_tracking(&mut self) {
        self.tracking += 1;
    }

    /// Close a tracked read opened by [`begin_tracking`](Self::begin_tracking).
    pub fn end_tracking(&mut self) {
        self.tracking = self.tracking.saturating_sub(1);
    }

    #[must_use]
    pub fn is_tracking(&self) -> bool {
        self.tracking > 0
    }

    /// [`sweep`](Self::sweep) unless a tracked read is open.
    pub fn sweep_idle(&mut self) -> Option<SweepStats> {
        if self.is_tracking() {
            return None;
        }
        Some(self.sweep())
    }

    /// Drop every token not declared by a live observer, then every key id no
    /// longer referenced by a remaining token.
    pub fn sweep(&mut self) -> SweepStats {
        let live: AHashSet<&str> = self
            .usage
            .values()
            .flat_map(|tokens| tokens.iter().map(String::as_str))
            .collect();

        let before_tokens = self.reverse.len();
        self.reverse.retain(|token, _| live.contains(token.as_str()));
        self.forward.retain(|_, token| live.contains(token.as_str()));

        let referenced: AHashSet<u64> = self.reverse.values().map(|e| e.key_id).collect();
        let before_keys = self.key_ids.len();
        self.key_ids.retain(|_, id| referenced.contains(id));

        let stats = SweepStats {
            tokens_reclaimed: before_tokens - self.reverse.len(),
            keys_reclaimed: before_keys - self.key_ids.len(),
        };
        trace!(
            tokens_reclaimed = stats.tokens_reclaimed,
            keys_reclaimed = stats.keys_reclaimed,
            tokens_live = self.reverse.len(),
            "registry.sweep"
        );
        stats
    }

    #[must_use]
    pub fn token_count(&self) -> usize {
        self.reverse.len()
    }

    #[must_use]
    pub fn key_count(&self) -> usize {
        self.key_ids.len()
    }

    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.usage.len()
    }

    /// Forget everything. Existing tokens stop resolving.
    pub fn reset(&mut self) {
        self.key_ids.clear();
        self.forward.clear();
        self.reverse.clear();
        self.usage.clear();
        self.tracking = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Symbol;

    fn container() -> ContainerId {
        Value::map().container_id().unwrap()
    }

    #[test]
    fn strings_pass_through() {
        let mut reg = KeyRegistry::new();
        let c = container();
        assert_eq!(reg.identify(c, &Value::from("name")).as_deref(), Some("name"));
        assert_eq!(reg.token_count(), 0);
    }

    #[test]
    fn well_known_symbols_are_ignored() {
        let mut reg = KeyRegistry::new();
        let c = container();
        assert_eq!(reg.identify(c, &Value::from(Symbol::iterator())), None);
        assert_eq!(reg.identify(c, &Value::from(Symbol::to_primitive())), None);
        assert_eq!(reg.token_count(), 0);
    }

    #[test]
    fn same_pair_same_token() {
        let mut reg = KeyRegistry::new();
        let c = container();
        let sym = Value::from(Symbol::new("k"));
        let a = reg.identify(c, &sym).unwrap();
        let b = reg.identify(c, &sym).unwrap();
        assert_eq!(a, b);
        assert!(a.starts_with(TOKEN_PREFIX));
        assert_eq!(reg.resolve(&a), Some(sym.clone()));
        assert_eq!(reg.container_of(&a), Some(c));
    }

    #[test]
    fn same_key_different_containers_differ() {
        let mut reg = KeyRegistry::new();
        let key = Value::object();
        let a = reg.identify(container(), &key).unwrap();
        let b = reg.identify(container(), &key).unwrap();
        assert_ne!(a, b);
        assert_eq!(reg.key_count(), 1, "key id is shared across containers");
    }

    #[test]
    fn numeric_keys_follow_same_value_zero() {
        let mut reg = KeyRegistry::new();
        let c = container();
        let a = reg.identify(c, &Value::Number(0.0)).unwrap();
        let b = reg.identify(c, &Value::Number(-0.0)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn sweep_keeps_declared_tokens() {
        let mut reg = KeyRegistry::new();
        let c = container();
        let kept_key = Value::from(Symbol::new("kept"));
        let dropped_key = Value::from(Symbol::new("dropped"));
        let kept = reg.identify(c, &kept_key).unwrap();
        let dropped = reg.identify(c, &dropped_key).unwrap();

        let observer = ObserverId::next();
        reg.begin_tracking();
        reg.mark_used_tokens(observer, [kept.as_str(), "plain"]);
        assert_eq!(reg.used_tokens(observer).unwrap().len(), 1);
        assert!(reg.is_token(&dropped), "no sweep while tracking");
        reg.end_tracking();

        let stats = reg.sweep();
        assert_eq!(stats.tokens_reclaimed, 1);
        assert_eq!(stats.keys_reclaimed, 1);
        assert_eq!(reg.resolve(&kept), Some(kept_key.clone()));
        assert_eq!(reg.resolve(&dropped), None);
    }

    #[test]
    fn declaring_reclaims_tokens_of_deleted_keys() {
        let mut reg = KeyRegistry::new();
        let c = container();
        let observer = ObserverId::next();
        for i in 0..100 {
            let token = reg.identify(c, &Value::from(i)).unwrap();
            assert!(reg.is_token(&token));
            reg.mark_used_tokens(observer, ["size"]);
            assert_eq!(reg.token_count(), 0);
        }
        assert_eq!(reg.key_count(), 0);
        assert_eq!(reg.observer_count(), 1);
    }

    #[test]
    fn release_inside_tracking_defers_the_sweep() {
        let mut reg = KeyRegistry::new();
        let c = container();
        let pending = reg.identify(c, &Value::from(1)).unwrap();
        let leaver = ObserverId::next();
        let reader = ObserverId::next();

        reg.begin_tracking();
        assert_eq!(reg.release_observer(leaver), SweepStats::default());
        assert!(reg.is_token(&pending));
        assert_eq!(reg.sweep_idle(), None);
        reg.end_tracking();

        reg.mark_used_tokens(reader, [&pending]);
        assert!(reg.is_token(&pending));
        assert!(reg.sweep_idle().is_some());
        assert_eq!(reg.token_count(), 1);
    }

    #[test]
    fn release_reclaims_and_reissues() {
        let mut reg = KeyRegistry::new();
        let c = container();
        let key = Value::from(Symbol::new("k"));
        let token = reg.identify(c, &key).unwrap();

        let observer = ObserverId::next();
        reg.mark_used_tokens(observer, [&token]);
        let stats = reg.release_observer(observer);
        assert_eq!(stats.tokens_reclaimed, 1);
        assert_eq!(reg.resolve(&token), None);
        assert_eq!(reg.key_count(), 0);

        let fresh = reg.identify(c, &key).unwrap();
        assert_ne!(fresh, token, "reclaimed key gets a new id");
        assert_eq!(reg.resolve(&fresh), Some(key.clone()));
    }

    #[test]
    fn shared_token_survives_one_release() {
        let mut reg = KeyRegistry::new();
        let c = container();
        let token = reg.identify(c, &Value::from(Symbol::new("k"))).unwrap();
        let a = ObserverId::next();
        let b = ObserverId::next();
        reg.mark_used_tokens(a, [&token]);
        reg.mark_used_tokens(b, [&token]);

        reg.release_observer(a);
        assert!(reg.is_token(&token));
        reg.release_observer(b);
        assert!(!reg.is_token(&token));
    }

    #[test]
    fn mark_replaces_previous_set() {
        let mut reg = KeyRegistry::new();
        let c = container();
        let observer = ObserverId::next();
        let t1 = reg.identify(c, &Value::from(1)).unwrap();
        reg.mark_used_tokens(observer, [&t1]);
        let t2 = reg.identify(c, &Value::from(2)).unwrap();
        reg.mark_used_tokens(observer, [&t2]);
        assert!(!reg.is_token(&t1));
        assert!(reg.is_token(&t2));
    }

    #[test]
    fn container_keys_are_held_weakly() {
        let mut reg = KeyRegistry::new();
        let key = Value::object();
        let token = reg.identify(container(), &key).unwrap();
        assert!(reg.resolve(&token).is_some());
        drop(key);
        assert_eq!(reg.resolve(&token), None);
        assert!(reg.container_of(&token).is_some());
    }

    #[test]
    fn reset_forgets_everything() {
        let mut reg = KeyRegistry::new();
        let token = reg.identify(container(), &Value::from(true)).unwrap();
        reg.mark_used_tokens(ObserverId::next(), [&token]);
        reg.reset();
        assert_eq!(reg.token_count(), 0);
        assert_eq!(reg.observer_count(), 0);
        assert_eq!(reg.resolve(&token), None);
    }
}
