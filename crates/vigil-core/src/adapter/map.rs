#![forbid(unsafe_code)]

//! Map adapter.
//!
//! Entries live under the registry token of their key (string keys are used
//! verbatim). Every operation that changes the entry count also writes the
//! `size` segment exactly once.
//!
//! # Invariants
//!
//! 1. `set` of an absent key is an insert, of a present key with a different
//!    value a write, of an identical value nothing.
//! 2. `clear` on a non-empty map removes its own path, then each entry.
//! 3. Operations on absent keys (`delete`, `clear` on empty) emit nothing.
//!
//! # Failure Modes
//!
//! - The string key `"size"` is used verbatim, so its entry path equals the
//!   map's size path. Readers of that entry are notified on every size change
//!   and readers of `size` on every write to that entry.

use crate::adapter::MutationKind;
use crate::error::Result;
use crate::observe::{MapProxy, Observed};
use crate::path::Path;
use crate::value::{MapKey, Value};

impl MapProxy {
    fn entry_path(&self, key: &Value) -> Option<Path> {
        let segment = self.engine().identify(self.id(), key)?;
        Some(self.path().child(segment))
    }

    fn raw_get(&self, key: &Value) -> Option<Value> {
        self.target().borrow().get(&MapKey::new(key.clone())).cloned()
    }

    /// Entry count, tracked as a read of `size`.
    pub fn size(&self) -> usize {
        self.engine().size_read(self.path());
        self.target().borrow().len()
    }

    /// Read an entry; container values come back wrapped.
    pub fn get(&self, key: impl Into<Value>) -> Observed {
        let key = key.into();
        let Some(path) = self.entry_path(&key) else {
            return Observed::Value(self.raw_get(&key).unwrap_or_default());
        };
        let Some(value) = self.raw_get(&key) else {
            return Observed::Value(Value::Undefined);
        };
        self.engine().read(&value, &path);
        self.engine().wrap(value, path)
    }

    /// Membership test, tracked as a read of the entry path.
    pub fn has(&self, key: impl Into<Value>) -> bool {
        let key = key.into();
        let value = self.raw_get(&key);
        if let Some(path) = self.entry_path(&key) {
            self.engine()
                .read(value.as_ref().unwrap_or(&Value::Undefined), &path);
        }
        value.is_some()
    }

    /// Insert or replace an entry.
    pub fn set(&self, key: impl Into<Value>, value: impl Into<Value>) -> Result<()> {
        let key = key.into();
        let value = value.into();
        let engine = self.engine();
        let Some(path) = self.entry_path(&key) else {
            self.target().borrow_mut().insert(MapKey::new(key), value);
            return Ok(());
        };
        let old = self.raw_get(&key);
        match old {
            None => {
                engine.check(MutationKind::Insert, &path)?;
                let (before, after) = {
                    let mut data = self.target().borrow_mut();
                    let before = data.len();
                    data.insert(MapKey::new(key), value.clone());
                    (before, data.len())
                };
                let target = self.to_value();
                engine.inserted(&value, &path, &target);
                engine.size_changed(self.path(), before, after, &target);
            }
            Some(old) if old.is_identical(&value) => {}
            Some(old) => {
                engine.check(MutationKind::Write, &path)?;
                self.target()
                    .borrow_mut()
                    .insert(MapKey::new(key), value.clone());
                engine.wrote(&value, &path, &old, &self.to_value());
            }
        }
        Ok(())
    }

    /// Delete an entry. Returns whether it existed.
    pub fn delete(&self, key: impl Into<Value>) -> Result<bool> {
        let key = key.into();
        let map_key = MapKey::new(key.clone());
        if !self.target().borrow().contains_key(&map_key) {
            return Ok(false);
        }
        let engine = self.engine();
        let Some(path) = self.entry_path(&key) else {
            self.target().borrow_mut().shift_remove(&map_key);
            return Ok(true);
        };
        engine.check(MutationKind::Remove, &path)?;
        let (before, after) = {
            let mut data = self.target().borrow_mut();
            let before = data.len();
            data.shift_remove(&map_key);
            (before, data.len())
        };
        let target = self.to_value();
        engine.removed(&path, &target);
        engine.size_changed(self.path(), before, after, &target);
        Ok(true)
    }

    /// Remove every entry.
    pub fn clear(&self) -> Result<()> {
        let before = self.target().borrow().len();
        if before == 0 {
            return Ok(());
        }
        let engine = self.engine();
        engine.check(MutationKind::Remove, self.path())?;
        let keys: Vec<Value> = self
            .target()
            .borrow()
            .keys()
            .map(|k| k.value().clone())
            .collect();
        let entry_paths: Vec<Path> = keys.iter().filter_map(|k| self.entry_path(k)).collect();
        self.target().borrow_mut().clear();

        let target = self.to_value();
        engine.removed(self.path(), &target);
        for path in &entry_paths {
            engine.removed(path, &target);
        }
        engine.size_changed(self.path(), before, 0, &target);
        Ok(())
    }

    /// Raw keys in insertion order, after a tracked `size` read.
    pub fn keys(&self) -> Vec<Value> {
        self.engine().size_read(self.path());
        self.target()
            .borrow()
            .keys()
            .map(|k| k.value().clone())
            .collect()
    }

    /// Values in insertion order, each read and wrapped.
    pub fn values(&self) -> Vec<Observed> {
        self.entries().into_iter().map(|(_, v)| v).collect()
    }

    /// Key/value pairs in insertion order, each value read and wrapped.
    pub fn entries(&self) -> Vec<(Value, Observed)> {
        self.keys()
            .into_iter()
            .map(|key| {
                let value = self.get(key.clone());
                (key, value)
            })
            .collect()
    }

    /// Visit each entry as `(value, key)`.
    pub fn for_each(&self, mut f: impl FnMut(Observed, &Value)) {
        for (key, value) in self.entries() {
            f(value, &key);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::adapter::testing::{Call, observe_with};
    use crate::value::{Symbol, Value};
    use crate::object;

    #[test]
    fn size_notifications_only_when_size_changes() {
        let (map, rec, _) = observe_with(&Value::map());
        let map = map.into_map().unwrap();

        map.set("a", 1).unwrap();
        map.set("a", 2).unwrap();
        map.set("a", 2).unwrap();
        assert!(!map.delete("missing").unwrap());
        map.delete("a").unwrap();

        assert_eq!(
            rec.mutations(),
            vec![
                Call::Insert("a".into(), Value::from(1)),
                Call::Write("size".into(), Value::from(1), Value::from(0)),
                Call::Write("a".into(), Value::from(2), Value::from(1)),
                Call::Remove("a".into()),
                Call::Write("size".into(), Value::from(0), Value::from(1)),
            ]
        );
        assert_eq!(map.size(), 0);
    }

    #[test]
    fn size_string_key_shares_the_size_path() {
        let (map, rec, effects) = observe_with(&Value::map());
        let map = map.into_map().unwrap();
        map.set("size", 7).unwrap();

        assert_eq!(
            rec.mutations(),
            vec![
                Call::Insert("size".into(), Value::from(7)),
                Call::Write("size".into(), Value::from(1), Value::from(0)),
            ]
        );
        let effects = effects.borrow();
        assert!(effects.added().contains("size"));
        assert!(effects.modified().contains("size"));
        assert_eq!(map.get("size").as_f64(), Some(7.0));
    }

    #[test]
    fn object_keys_get_tokens() {
        let state = object! { "m" => Value::map() };
        let (root, rec, effects) = observe_with(&state);
        let map = root.into_object().unwrap().get("m").into_map().unwrap();
        let key = Value::object();
        map.set(key.clone(), "v").unwrap();

        let calls = rec.mutations();
        let Call::Insert(path, _) = &calls[0] else {
            panic!("expected insert, got {calls:?}");
        };
        assert!(path.starts_with("m.@"));
        assert!(effects.borrow().added().contains("m"));
        assert!(effects.borrow().modified().contains("m.size"));
        assert_eq!(map.get(key).as_str(), Some("v"));
    }

    #[test]
    fn clear_removes_self_then_entries() {
        let state = object! { "m" => Value::map_from([(Value::from("x"), Value::from(1)), (Value::from("y"), Value::from(2))]) };
        let (root, rec, _) = observe_with(&state);
        let map = root.into_object().unwrap().get("m").into_map().unwrap();
        rec.take();

        map.clear().unwrap();
        assert_eq!(
            rec.mutations(),
            vec![
                Call::Remove("m".into()),
                Call::Remove("m.x".into()),
                Call::Remove("m.y".into()),
                Call::Write("m.size".into(), Value::from(0), Value::from(2)),
            ]
        );
        map.clear().unwrap();
        assert!(rec.take().is_empty());
    }

    #[test]
    fn values_read_out_are_observed() {
        let state = Value::map();
        let (map, rec, _) = observe_with(&state);
        let map = map.into_map().unwrap();
        map.set("k", object! { "type" => "x" }).unwrap();
        rec.take();

        map.get("k").into_object().unwrap().set("type", "y").unwrap();
        assert!(rec
            .mutations()
            .contains(&Call::Write("k.type".into(), Value::from("y"), Value::from("x"))));
    }

    #[test]
    fn has_is_tracked() {
        let (map, rec, _) = observe_with(&Value::map());
        let map = map.into_map().unwrap();
        assert!(!map.has("k"));
        assert_eq!(rec.take(), vec![Call::Read("k".into(), Value::Undefined)]);
    }

    #[test]
    fn iteration_reads_size_and_entries() {
        let (map, rec, _) = observe_with(&Value::map_from([(Value::from(1), Value::from("one"))]));
        let map = map.into_map().unwrap();
        let mut seen = Vec::new();
        map.for_each(|v, k| seen.push((k.clone(), v.raw())));
        assert_eq!(seen, vec![(Value::from(1), Value::from("one"))]);
        let calls = rec.take();
        assert_eq!(calls[0], Call::SizeRead("size".into()));
        assert!(matches!(&calls[1], Call::Read(p, _) if p.starts_with('@')));
    }

    #[test]
    fn well_known_symbol_keys_are_untracked() {
        let (map, rec, _) = observe_with(&Value::map());
        let map = map.into_map().unwrap();
        map.set(Symbol::iterator(), 1).unwrap();
        assert_eq!(map.get(Symbol::iterator()).as_f64(), Some(1.0));
        assert!(rec.take().is_empty());
    }
}
