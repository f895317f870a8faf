#![forbid(unsafe_code)]

//! Property-based invariant tests for store batching.
//!
//! 1. Each outermost action that changes something notifies exactly once.
//! 2. Actions that change nothing notify nobody.
//! 3. The delivered record equals the naive model of the batch, however the
//!    batch is split across nested actions.
//! 4. Strict mode leaves state untouched outside actions.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use proptest::prelude::*;
use vigil_core::{EffectRecord, Value, object};
use vigil_store::{Runtime, Store, StoreConfig, Subscription};

// ── Strategies ──────────────────────────────────────────────────────────

/// One outermost action: writes, and the index at which a nested action
/// takes over the remaining writes.
#[derive(Debug, Clone)]
struct Batch {
    writes: Vec<(u8, u8)>,
    split: usize,
}

fn batches() -> impl Strategy<Value = Vec<Batch>> {
    proptest::collection::vec(
        proptest::collection::vec((0u8..6, 0u8..3), 0..8).prop_flat_map(|writes| {
            let len = writes.len();
            (Just(writes), 0..=len).prop_map(|(writes, split)| Batch { writes, split })
        }),
        1..12,
    )
}

// ── Helpers ─────────────────────────────────────────────────────────────

fn key(k: u8) -> String {
    format!("k{k}")
}

type Seen = Rc<RefCell<Vec<EffectRecord>>>;

fn store() -> (Store, Seen, Subscription) {
    let store = Runtime::new()
        .create_store(StoreConfig::new(object! {}))
        .unwrap();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    let sub = store.subscribe(move |r| sink.borrow_mut().push(r.clone()));
    (store, seen, sub)
}

#[derive(Default)]
struct Expected {
    added: BTreeSet<String>,
    modified: BTreeSet<String>,
}

fn apply_model(model: &mut BTreeMap<u8, u8>, writes: &[(u8, u8)]) -> Expected {
    let mut out = Expected::default();
    for &(k, v) in writes {
        match model.insert(k, v) {
            None => {
                out.added.insert(key(k));
                out.added.insert(String::new());
            }
            Some(old) if old != v => {
                out.modified.insert(key(k));
            }
            Some(_) => {}
        }
    }
    out
}

// ═══════════════════════════════════════════════════════════════════════
// Batching
// ═══════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn one_notification_per_changing_action(batches in batches()) {
        let (store, seen, _sub) = store();
        let mut model = BTreeMap::new();
        let mut expected_notifications = 0;

        for batch in &batches {
            let expected = apply_model(&mut model, &batch.writes);
            let changes = !expected.added.is_empty() || !expected.modified.is_empty();
            let before = seen.borrow().len();

            let (outer, inner) = batch.writes.split_at(batch.split);
            store.act(|state| {
                for &(k, v) in outer {
                    state.set(key(k), u32::from(v)).unwrap();
                }
                store.act(|state| {
                    for &(k, v) in inner {
                        state.set(key(k), u32::from(v)).unwrap();
                    }
                });
            });

            if changes {
                expected_notifications += 1;
                let seen = seen.borrow();
                prop_assert_eq!(seen.len(), before + 1);
                let record = &seen[before];
                let added: BTreeSet<String> = record.added().iter().cloned().collect();
                let modified: BTreeSet<String> = record.modified().iter().cloned().collect();
                prop_assert_eq!(added, expected.added);
                prop_assert_eq!(modified, expected.modified);
                prop_assert!(record.removed().is_empty());
            } else {
                prop_assert_eq!(seen.borrow().len(), before);
            }
        }
        prop_assert_eq!(seen.borrow().len(), expected_notifications);
        prop_assert_eq!(store.action_depth(), 0);
    }

    #[test]
    fn strict_rejections_leave_state_untouched(writes in proptest::collection::vec((0u8..6, 0u8..3), 1..10)) {
        let (store, seen, _sub) = store();
        store.act(|state| state.set("k0", 0)).unwrap();
        let before = store.snapshot();

        for (k, v) in writes {
            let result = store.state().set(key(k), u32::from(v));
            let unchanged = k == 0 && v == 0;
            prop_assert_eq!(result.is_ok(), unchanged);
        }
        prop_assert_eq!(store.snapshot(), before);
        prop_assert!(store.pending_effects().is_empty());
        prop_assert_eq!(seen.borrow().len(), 1);
        prop_assert_eq!(store.state().get("k0").raw(), Value::from(0));
    }
}
