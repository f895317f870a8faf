#![forbid(unsafe_code)]

//! Read tracking.
//!
//! An [`Observer`] runs a closure against a store's state and remembers the
//! paths it read. Tokens among those paths are declared to the key registry
//! under the observer's id, which keeps them alive until the next track or
//! until the observer is dropped.
//!
//! # Invariants
//!
//! 1. `reads()` reflects exactly the most recent `track` call.
//! 2. After `track`, the registry's usage set for this observer equals the
//!    tokens in `reads().tokens()`.
//! 3. Dropping an observer releases its tokens and sweeps the registry.
//! 4. Tokens met during a `track` survive until that `track` declares them,
//!    even if a nested observer declares or is dropped meanwhile.

use std::cell::RefCell;
use std::fmt;

use indexmap::IndexSet;
use tracing::trace;
use vigil_core::{EffectRecord, ObjectProxy, ObserverId, Path};

use crate::store::{Store, StoreInner};

/// Paths read during one tracked call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadSet {
    paths: IndexSet<String>,
    tokens: IndexSet<String>,
}

impl ReadSet {
    /// Joined paths in first-read order.
    #[must_use]
    pub fn paths(&self) -> &IndexSet<String> {
        &self.paths
    }

    /// Registry tokens appearing in any read path.
    #[must_use]
    pub fn tokens(&self) -> &IndexSet<String> {
        &self.tokens
    }

    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.paths.contains(path)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Whether a flushed batch touched anything read here.
    #[must_use]
    pub fn intersects(&self, effects: &EffectRecord) -> bool {
        effects.intersects(self.paths.iter().map(String::as_str))
    }
}

/// Pops the read frame and closes the registry's tracking window, also when
/// the tracked closure unwinds.
struct FrameGuard<'a> {
    store: &'a StoreInner,
    popped: bool,
}

impl<'a> FrameGuard<'a> {
    fn open(store: &'a StoreInner) -> Self {
        store.push_read_frame();
        store.registry().borrow_mut().begin_tracking();
        Self {
            store,
            popped: false,
        }
    }

    fn finish(mut self) -> Vec<Path> {
        self.popped = true;
        self.store.registry().borrow_mut().end_tracking();
        self.store.pop_read_frame()
    }
}

impl Drop for FrameGuard<'_> {
    fn drop(&mut self) {
        if !self.popped {
            self.store.registry().borrow_mut().end_tracking();
            let _ = self.store.pop_read_frame();
        }
    }
}

/// Records what a computation reads from a store.
pub struct Observer {
    id: ObserverId,
    store: Store,
    reads: RefCell<ReadSet>,
}

impl Observer {
    pub(crate) fn new(store: Store) -> Self {
        Self {
            id: ObserverId::next(),
            store,
            reads: RefCell::new(ReadSet::default()),
        }
    }

    #[must_use]
    pub fn id(&self) -> ObserverId {
        self.id
    }

    #[must_use]
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Run `f` against the state, replacing the recorded read set.
    pub fn track<R>(&self, f: impl FnOnce(&ObjectProxy) -> R) -> R {
        let inner = self.store.inner();
        let guard = FrameGuard::open(inner);
        let state = self.store.state();
        let out = f(&state);
        let frame = guard.finish();

        let registry = inner.registry();
        let mut reads = ReadSet::default();
        {
            let registry = registry.borrow();
            for path in &frame {
                for segment in path.segments() {
                    if registry.is_token(segment) {
                        reads.tokens.insert(segment.clone());
                    }
                }
                reads.paths.insert(path.joined());
            }
        }
        registry
            .borrow_mut()
            .mark_used_tokens(self.id, reads.tokens.iter());
        trace!(
            store = self.store.name(),
            observer = self.id.raw(),
            paths = reads.paths.len(),
            tokens = reads.tokens.len(),
            "observer.track"
        );
        *self.reads.borrow_mut() = reads;
        out
    }

    /// Read set of the most recent `track`.
    #[must_use]
    pub fn reads(&self) -> ReadSet {
        self.reads.borrow().clone()
    }

    /// Whether `effects` touched anything the last `track` read.
    #[must_use]
    pub fn is_affected_by(&self, effects: &EffectRecord) -> bool {
        self.reads.borrow().intersects(effects)
    }
}

impl Drop for Observer {
    fn drop(&mut self) {
        let stats = self
            .store
            .inner()
            .registry()
            .borrow_mut()
            .release_observer(self.id);
        trace!(
            observer = self.id.raw(),
            tokens_reclaimed = stats.tokens_reclaimed,
            "observer.release"
        );
    }
}

impl fmt::Debug for Observer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observer")
            .field("id", &self.id)
            .field("store", &self.store.name())
            .field("reads", &self.reads.borrow().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::StoreConfig;
    use crate::runtime::Runtime;
    use vigil_core::{Value, object};

    #[test]
    fn track_replaces_reads() {
        let store = Runtime::new()
            .create_store(StoreConfig::new(object! { "a" => 1, "b" => 2 }))
            .unwrap();
        let observer = store.observer();

        observer.track(|s| s.get("a"));
        assert!(observer.reads().contains("a"));

        observer.track(|s| s.get("b"));
        assert!(!observer.reads().contains("a"));
        assert!(observer.reads().contains("b"));
    }

    #[test]
    fn untracked_reads_are_not_recorded() {
        let store = Runtime::new()
            .create_store(StoreConfig::new(object! { "a" => 1 }))
            .unwrap();
        let observer = store.observer();
        let _ = store.state().get("a");
        observer.track(|_| ());
        assert!(observer.reads().is_empty());
    }

    #[test]
    fn nested_tracking_records_in_both() {
        let store = Runtime::new()
            .create_store(StoreConfig::new(object! { "a" => 1, "b" => 2 }))
            .unwrap();
        let outer = store.observer();
        let inner = store.observer();
        outer.track(|s| {
            let _ = s.get("a");
            inner.track(|s| s.get("b"));
        });
        assert_eq!(outer.reads().len(), 2);
        assert_eq!(inner.reads().len(), 1);
    }

    #[test]
    fn nested_declaration_keeps_outer_tokens() {
        let key = Value::object();
        let store = Runtime::new()
            .create_store(StoreConfig::new(
                object! { "map" => Value::map_from([(key.clone(), Value::from(1))]) },
            ))
            .unwrap();
        let outer = store.observer();
        let inner = store.observer();

        outer.track(|s| {
            let _ = s.get("map").into_map().unwrap().get(&key);
            inner.track(|s| s.get("map"));
            drop(store.observer());
        });

        let tokens = outer.reads().tokens().clone();
        assert_eq!(tokens.len(), 1);
        let registry = store.registry();
        assert!(registry.borrow().is_token(&tokens[0]));
        assert!(!registry.borrow().is_tracking());
        assert!(registry.borrow().resolve(&tokens[0]).unwrap().is_identical(&key));
    }
}
