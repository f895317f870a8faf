#![forbid(unsafe_code)]

//! Plain-object adapter.
//!
//! Reading an own key emits a read and wraps container values. Assigning an
//! absent key is an insert, assigning a different value to an existing key is
//! a write, assigning an identical value does nothing. Keys the registry
//! ignores (well-known symbols) bypass the engine completely.

use crate::adapter::MutationKind;
use crate::error::Result;
use crate::observe::{ObjectProxy, Observed};
use crate::value::{PropKey, Value};

impl ObjectProxy {
    /// Read a property.
    pub fn get(&self, key: impl Into<PropKey>) -> Observed {
        let key = key.into();
        let engine = self.engine();
        let Some(segment) = engine.identify_prop(self.id(), &key) else {
            let raw = self.target().borrow().get(&key).cloned();
            return Observed::Value(raw.unwrap_or_default());
        };
        let Some(value) = self.target().borrow().get(&key).cloned() else {
            return Observed::Value(Value::Undefined);
        };
        let path = self.path().child(segment);
        engine.read(&value, &path);
        engine.wrap(value, path)
    }

    /// Assign a property.
    pub fn set(&self, key: impl Into<PropKey>, value: impl Into<Value>) -> Result<()> {
        let key = key.into();
        let value = value.into();
        let engine = self.engine();
        let Some(segment) = engine.identify_prop(self.id(), &key) else {
            self.target().borrow_mut().insert(key, value);
            return Ok(());
        };
        let old = self.target().borrow().get(&key).cloned();
        let path = self.path().child(segment);
        match old {
            None => {
                engine.check(MutationKind::Insert, &path)?;
                self.target().borrow_mut().insert(key, value.clone());
                engine.inserted(&value, &path, &self.to_value());
            }
            Some(old) if old.is_identical(&value) => {}
            Some(old) => {
                engine.check(MutationKind::Write, &path)?;
                self.target().borrow_mut().insert(key, value.clone());
                engine.wrote(&value, &path, &old, &self.to_value());
            }
        }
        Ok(())
    }

    /// Delete a property. Returns whether it existed.
    pub fn delete(&self, key: impl Into<PropKey>) -> Result<bool> {
        let key = key.into();
        let engine = self.engine();
        let Some(segment) = engine.identify_prop(self.id(), &key) else {
            return Ok(self.target().borrow_mut().shift_remove(&key).is_some());
        };
        if !self.target().borrow().contains_key(&key) {
            return Ok(false);
        }
        let path = self.path().child(segment);
        engine.check(MutationKind::Remove, &path)?;
        self.target().borrow_mut().shift_remove(&key);
        engine.removed(&path, &self.to_value());
        Ok(true)
    }

    /// Whether the property exists. Not tracked.
    #[must_use]
    pub fn has(&self, key: impl Into<PropKey>) -> bool {
        self.target().borrow().contains_key(&key.into())
    }

    /// Own keys in insertion order. Not tracked.
    #[must_use]
    pub fn keys(&self) -> Vec<PropKey> {
        self.target().borrow().keys().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.target().borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every string-keyed property, read and wrapped in order.
    pub fn entries(&self) -> Vec<(PropKey, Observed)> {
        self.keys()
            .into_iter()
            .filter(|key| key.as_str().is_some())
            .map(|key| {
                let value = self.get(key.clone());
                (key, value)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use crate::adapter::testing::{Call, observe_with};
    use crate::value::{Symbol, Value};
    use crate::{array, object};

    #[test]
    fn insert_write_and_identical_noop() {
        let state = object! { "name" => "a" };
        let (root, rec, effects) = observe_with(&state);
        let root = root.into_object().unwrap();

        root.set("age", 3).unwrap();
        root.set("name", "b").unwrap();
        root.set("name", "b").unwrap();

        assert_eq!(
            rec.mutations(),
            vec![
                Call::Insert("age".into(), Value::from(3)),
                Call::Write("name".into(), Value::from("b"), Value::from("a")),
            ]
        );
        let effects = effects.borrow();
        assert!(effects.added().contains("age"));
        assert!(effects.added().contains(""));
        assert!(effects.modified().contains("name"));
        assert_eq!(effects.modified().len(), 1);
    }

    #[test]
    fn read_of_missing_key_is_silent() {
        let (root, rec, _) = observe_with(&object! {});
        let root = root.into_object().unwrap();
        assert!(root.get("nope").is_undefined());
        assert!(rec.take().is_empty());
    }

    #[test]
    fn rejected_mutation_leaves_target_untouched() {
        let state = object! { "name" => "a" };
        let (root, rec, effects) = observe_with(&state);
        let root = root.into_object().unwrap();
        rec.reject.set(true);

        assert!(root.set("name", "b").unwrap_err().is_strict_mode_violation());
        assert!(root.set("new", 1).is_err());
        assert!(root.delete("name").is_err());

        assert_eq!(root.get("name").as_str(), Some("a"));
        assert!(!root.has("new"));
        assert!(rec.mutations().is_empty());
        assert!(effects.borrow().is_empty());
    }

    #[test]
    fn delete_emits_remove_once() {
        let state = object! { "a" => 1 };
        let (root, rec, effects) = observe_with(&state);
        let root = root.into_object().unwrap();
        assert!(root.delete("a").unwrap());
        assert!(!root.delete("a").unwrap());
        assert_eq!(rec.mutations(), vec![Call::Remove("a".into())]);
        assert!(effects.borrow().removed().contains("a"));
    }

    #[test]
    fn well_known_symbols_bypass_engine() {
        let (root, rec, effects) = observe_with(&object! {});
        let root = root.into_object().unwrap();
        rec.reject.set(true);
        let tag = Symbol::to_string_tag();
        root.set(&tag, "State").unwrap();
        assert_eq!(root.get(&tag).as_str(), Some("State"));
        assert!(rec.take().is_empty());
        assert!(effects.borrow().is_empty());
    }

    #[test]
    fn plain_symbol_keys_are_tokenized() {
        let (root, rec, _) = observe_with(&object! {});
        let root = root.into_object().unwrap();
        let sym = Symbol::new("secret");
        root.set(&sym, 1).unwrap();
        let calls = rec.mutations();
        let [Call::Insert(path, _)] = calls.as_slice() else {
            panic!("expected one insert, got {calls:?}");
        };
        assert!(path.starts_with('@'));
    }

    #[test]
    fn nested_container_reads_return_wrappers() {
        let state = object! { "list" => array![1] };
        let (root, rec, effects) = observe_with(&state);
        let root = root.into_object().unwrap();
        let list = root.get("list").into_array().unwrap();
        assert_eq!(list.path().joined(), "list");
        list.push(2).unwrap();
        assert!(effects.borrow().added().contains("list.1"));
        assert!(effects.borrow().added().contains("list"));
        assert!(matches!(rec.take().first(), Some(Call::Read(p, _)) if p == "list"));
    }

    #[test]
    fn entries_read_every_string_key() {
        let state = object! { "a" => 1, "b" => 2 };
        let (root, rec, _) = observe_with(&state);
        let root = root.into_object().unwrap();
        let entries = root.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(rec.take().len(), 2);
    }
}
