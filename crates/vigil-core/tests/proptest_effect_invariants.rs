#![forbid(unsafe_code)]

//! Property-based invariant tests for adapters and effect aggregation.
//!
//! 1. Map/Set size equals the naive model after any op sequence.
//! 2. Each op emits exactly one size write when the size changes, none
//!    otherwise.
//! 3. Object writes classify as insert/modify/no-op against a naive model.
//! 4. Every recorded add also records its parent.

use std::cell::Cell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use proptest::prelude::*;
use vigil_core::effect::EffectRecord;
use vigil_core::path::Path;
use vigil_core::{Interceptor, ObserveOptions, Value, observe};

// ── Strategies ──────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum Op {
    Put(u8, u8),
    Delete(u8),
    Clear,
}

fn ops() -> impl Strategy<Value = Vec<Op>> {
    proptest::collection::vec(
        prop_oneof![
            6 => (0u8..12, 0u8..4).prop_map(|(k, v)| Op::Put(k, v)),
            3 => (0u8..12).prop_map(Op::Delete),
            1 => Just(Op::Clear),
        ],
        0..60,
    )
}

// ── Helpers ─────────────────────────────────────────────────────────────

#[derive(Default)]
struct SizeWrites(Cell<usize>);

impl Interceptor for SizeWrites {
    fn on_write(&self, _value: &Value, path: &Path, _old: &Value, _target: &Value) {
        if path.last() == Some("size") {
            self.0.set(self.0.get() + 1);
        }
    }
}

fn counted(value: &Value) -> (vigil_core::Observed, Rc<SizeWrites>) {
    let counter = Rc::new(SizeWrites::default());
    let observed = observe(value, ObserveOptions::new(counter.clone()));
    (observed, counter)
}

// ═════════════════════════════════════════════════════════════════════════
// 1/2. Map size tracking
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn map_size_matches_model(ops in ops()) {
        let (map, counter) = counted(&Value::map());
        let map = map.into_map().unwrap();
        let mut model: BTreeMap<u8, u8> = BTreeMap::new();

        for op in &ops {
            let before_len = model.len();
            let before_writes = counter.0.get();
            match op {
                Op::Put(k, v) => {
                    map.set(f64::from(*k), f64::from(*v)).unwrap();
                    model.insert(*k, *v);
                }
                Op::Delete(k) => {
                    let existed = map.delete(f64::from(*k)).unwrap();
                    prop_assert_eq!(existed, model.remove(k).is_some());
                }
                Op::Clear => {
                    map.clear().unwrap();
                    model.clear();
                }
            }
            let expected = usize::from(before_len != model.len());
            prop_assert_eq!(counter.0.get() - before_writes, expected, "op {:?}", op);
            prop_assert_eq!(map.size(), model.len());
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 1/2. Set size tracking
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn set_size_matches_model(ops in ops()) {
        let (set, counter) = counted(&Value::set());
        let set = set.into_set().unwrap();
        let mut model: BTreeSet<u8> = BTreeSet::new();

        for op in &ops {
            let before_len = model.len();
            let before_writes = counter.0.get();
            match op {
                Op::Put(k, _) => {
                    let added = set.add(f64::from(*k)).unwrap();
                    prop_assert_eq!(added, model.insert(*k));
                }
                Op::Delete(k) => {
                    let existed = set.delete(f64::from(*k)).unwrap();
                    prop_assert_eq!(existed, model.remove(k));
                }
                Op::Clear => {
                    set.clear().unwrap();
                    model.clear();
                }
            }
            let expected = usize::from(before_len != model.len());
            prop_assert_eq!(counter.0.get() - before_writes, expected, "op {:?}", op);
            prop_assert_eq!(set.size(), model.len());
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 3/4. Object classification and parent marking
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn object_writes_classify_against_model(
        writes in proptest::collection::vec((0u8..6, 0u8..3), 0..40),
    ) {
        let effects = EffectRecord::shared();
        let state = Value::object();
        let root = observe(&state, ObserveOptions::default().with_effects(effects.clone()))
            .into_object()
            .unwrap();
        prop_assert!(root.set("inner", Value::object()).is_ok());
        let _ = effects.borrow_mut().drain();
        let obj = root.get("inner").into_object().unwrap();

        let mut model: BTreeMap<u8, u8> = BTreeMap::new();
        for (k, v) in &writes {
            let key = format!("k{k}");
            let path = format!("inner.{key}");
            let prior = model.insert(*k, *v);
            obj.set(key.as_str(), f64::from(*v)).unwrap();

            let record = effects.borrow_mut().drain();
            match prior {
                None => {
                    prop_assert!(record.added().contains(&path));
                    prop_assert!(record.added().contains("inner"));
                    prop_assert!(record.modified().is_empty());
                }
                Some(old) if old == *v => {
                    prop_assert!(record.is_empty());
                }
                Some(_) => {
                    prop_assert!(record.modified().contains(&path));
                    prop_assert!(record.added().is_empty());
                }
            }
        }
    }
}
