#![forbid(unsafe_code)]

//! JSON bridge for [`Value`].
//!
//! `from_json` builds plain objects and arrays. `to_json` is lossy:
//!
//! | Value              | JSON                         |
//! |--------------------|------------------------------|
//! | Map                | array of `[key, value]` pairs |
//! | Set                | array of members             |
//! | WeakMap / WeakSet  | `null`                       |
//! | undefined / symbol | `null`                       |
//! | non-finite number  | `null`                       |
//! | repeated ancestor  | `null` (cycle cut)           |
//!
//! Symbol-keyed object properties are skipped.

use ahash::AHashSet;
use serde_json::{Map as JsonMap, Number, Value as Json};

use crate::value::{ContainerId, PropKey, Value};

/// Largest integer an f64 represents exactly.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

impl Value {
    /// Build a value from JSON. Objects keep key order.
    #[must_use]
    pub fn from_json(json: &Json) -> Value {
        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(*b),
            Json::Number(n) => n.as_f64().map_or(Value::Null, Value::Number),
            Json::String(s) => Value::from(s.as_str()),
            Json::Array(items) => Value::array(items.iter().map(Value::from_json)),
            Json::Object(entries) => Value::object_from(
                entries
                    .iter()
                    .map(|(k, v)| (PropKey::from(k.as_str()), Value::from_json(v))),
            ),
        }
    }

    /// Render as JSON, cutting cycles with `null`.
    #[must_use]
    pub fn to_json(&self) -> Json {
        let mut ancestors = AHashSet::new();
        to_json_inner(self, &mut ancestors)
    }
}

fn number(n: f64) -> Json {
    if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        return Json::Number(Number::from(n as i64));
    }
    Number::from_f64(n).map_or(Json::Null, Json::Number)
}

fn to_json_inner(value: &Value, ancestors: &mut AHashSet<ContainerId>) -> Json {
    let id = match value {
        Value::Undefined | Value::Null | Value::Symbol(_) => return Json::Null,
        Value::WeakMap(_) | Value::WeakSet(_) => return Json::Null,
        Value::Bool(b) => return Json::Bool(*b),
        Value::Number(n) => return number(*n),
        Value::String(s) => return Json::String(s.to_string()),
        other => other.container_id(),
    };
    let Some(id) = id else {
        return Json::Null;
    };
    if !ancestors.insert(id) {
        return Json::Null;
    }

    let out = match value {
        Value::Object(obj) => {
            let entries: Vec<(String, Value)> = obj
                .borrow()
                .iter()
                .filter_map(|(k, v)| k.as_str().map(|k| (k.to_owned(), v.clone())))
                .collect();
            let mut map = JsonMap::with_capacity(entries.len());
            for (k, v) in entries {
                map.insert(k, to_json_inner(&v, ancestors));
            }
            Json::Object(map)
        }
        Value::Array(arr) => {
            let items: Vec<Value> = arr.borrow().clone();
            Json::Array(items.iter().map(|v| to_json_inner(v, ancestors)).collect())
        }
        Value::Map(map) => {
            let entries: Vec<(Value, Value)> = map
                .borrow()
                .iter()
                .map(|(k, v)| (k.value().clone(), v.clone()))
                .collect();
            Json::Array(
                entries
                    .iter()
                    .map(|(k, v)| {
                        Json::Array(vec![to_json_inner(k, ancestors), to_json_inner(v, ancestors)])
                    })
                    .collect(),
            )
        }
        Value::Set(set) => {
            let members: Vec<Value> = set.borrow().iter().map(|m| m.value().clone()).collect();
            Json::Array(members.iter().map(|m| to_json_inner(m, ancestors)).collect())
        }
        _ => Json::Null,
    };
    ancestors.remove(&id);
    out
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::value::{Symbol, Value};
    use crate::{array, object};

    #[test]
    fn from_json_builds_objects_and_arrays() {
        let v = Value::from_json(&json!({"name": "a", "list": [1, 2.5, null], "ok": true}));
        assert_eq!(v.to_json(), json!({"name": "a", "list": [1, 2.5, null], "ok": true}));
    }

    #[test]
    fn maps_and_sets_flatten() {
        let v = object! {
            "m" => Value::map_from([(Value::from("k"), Value::from(1))]),
            "s" => Value::set_from([Value::from(1), Value::from(1), Value::from(2)]),
            "w" => Value::weak_map(),
            "sym" => Symbol::new("x"),
            "u" => Value::Undefined,
        };
        assert_eq!(
            v.to_json(),
            json!({"m": [["k", 1]], "s": [1, 2], "w": null, "sym": null, "u": null})
        );
    }

    #[test]
    fn cycles_are_cut() {
        let v = object! { "list" => array![] };
        if let Value::Object(obj) = &v {
            obj.borrow_mut().insert("self".into(), v.clone());
        }
        assert_eq!(v.to_json(), json!({"list": [], "self": null}));
    }

    #[test]
    fn shared_non_cyclic_children_are_repeated() {
        let shared = array![1];
        let v = object! { "a" => shared.clone(), "b" => shared };
        assert_eq!(v.to_json(), json!({"a": [1], "b": [1]}));
    }

    #[test]
    fn non_finite_numbers_become_null() {
        assert_eq!(Value::Number(f64::NAN).to_json(), json!(null));
        assert_eq!(Value::Number(f64::INFINITY).to_json(), json!(null));
    }
}
