#![forbid(unsafe_code)]

//! WeakMap and WeakSet adapters.
//!
//! Keys must be containers. Lookups with any other key find nothing, inserts
//! with one fail with [`ObserveError::InvalidWeakKey`]. Neither kind exposes
//! size or iteration. Entries whose key container has been dropped are
//! invisible.

use crate::adapter::MutationKind;
use crate::error::{ObserveError, Result};
use crate::observe::{Observed, WeakMapProxy, WeakSetProxy};
use crate::path::Path;
use crate::value::{ContainerId, Value};

fn weak_key(key: &Value) -> Result<ContainerId> {
    key.container_id().ok_or(ObserveError::InvalidWeakKey {
        found: key.type_name(),
    })
}

impl WeakMapProxy {
    fn entry_path(&self, key: &Value) -> Option<Path> {
        let segment = self.engine().identify(self.id(), key)?;
        Some(self.path().child(segment))
    }

    /// Read an entry; container values come back wrapped.
    pub fn get(&self, key: &Value) -> Observed {
        let Ok(id) = weak_key(key) else {
            return Observed::Value(Value::Undefined);
        };
        let Some(value) = self.target().borrow().get(id).cloned() else {
            return Observed::Value(Value::Undefined);
        };
        match self.entry_path(key) {
            Some(path) => {
                self.engine().read(&value, &path);
                self.engine().wrap(value, path)
            }
            None => Observed::Value(value),
        }
    }

    /// Membership test, tracked as a read of the entry path.
    pub fn has(&self, key: &Value) -> bool {
        let Ok(id) = weak_key(key) else {
            return false;
        };
        let value = self.target().borrow().get(id).cloned();
        if let Some(path) = self.entry_path(key) {
            self.engine()
                .read(value.as_ref().unwrap_or(&Value::Undefined), &path);
        }
        value.is_some()
    }

    /// Insert or replace an entry.
    pub fn set(&self, key: &Value, value: impl Into<Value>) -> Result<()> {
        let id = weak_key(key)?;
        let value = value.into();
        let Some(weak) = key.downgrade() else {
            return Err(ObserveError::InvalidWeakKey {
                found: key.type_name(),
            });
        };
        let path = self.entry_path(key).unwrap_or_else(|| self.path().clone());
        let engine = self.engine();
        let old = self.target().borrow().get(id).cloned();
        match old {
            None => {
                engine.check(MutationKind::Insert, &path)?;
                self.target().borrow_mut().insert(weak, value.clone());
                engine.inserted(&value, &path, &self.to_value());
            }
            Some(old) if old.is_identical(&value) => {}
            Some(old) => {
                engine.check(MutationKind::Write, &path)?;
                self.target().borrow_mut().insert(weak, value.clone());
                engine.wrote(&value, &path, &old, &self.to_value());
            }
        }
        Ok(())
    }

    /// Delete an entry. Returns whether a live entry existed.
    pub fn delete(&self, key: &Value) -> Result<bool> {
        let Ok(id) = weak_key(key) else {
            return Ok(false);
        };
        if !self.target().borrow().contains(id) {
            return Ok(false);
        }
        let path = self.entry_path(key).unwrap_or_else(|| self.path().clone());
        self.engine().check(MutationKind::Remove, &path)?;
        self.target().borrow_mut().remove(id);
        self.engine().removed(&path, &self.to_value());
        Ok(true)
    }
}

impl WeakSetProxy {
    fn member_path(&self, member: &Value) -> Option<Path> {
        let segment = self.engine().identify(self.id(), member)?;
        Some(self.path().child(segment))
    }

    /// Membership test, tracked as a read of the member path.
    pub fn has(&self, member: &Value) -> bool {
        let Ok(id) = weak_key(member) else {
            return false;
        };
        let present = self.target().borrow().contains(id);
        if let Some(path) = self.member_path(member) {
            self.engine().read(&Value::from(present), &path);
        }
        present
    }

    /// Add a member. Returns `false` if it was already present.
    pub fn add(&self, member: &Value) -> Result<bool> {
        let id = weak_key(member)?;
        let Some(weak) = member.downgrade() else {
            return Err(ObserveError::InvalidWeakKey {
                found: member.type_name(),
            });
        };
        if self.target().borrow().contains(id) {
            return Ok(false);
        }
        let path = self
            .member_path(member)
            .unwrap_or_else(|| self.path().clone());
        self.engine().check(MutationKind::Insert, &path)?;
        self.target().borrow_mut().insert(weak);
        self.engine().inserted(member, &path, &self.to_value());
        Ok(true)
    }

    /// Remove a member. Returns whether it was present.
    pub fn delete(&self, member: &Value) -> Result<bool> {
        let Ok(id) = weak_key(member) else {
            return Ok(false);
        };
        if !self.target().borrow().contains(id) {
            return Ok(false);
        }
        let path = self
            .member_path(member)
            .unwrap_or_else(|| self.path().clone());
        self.engine().check(MutationKind::Remove, &path)?;
        self.target().borrow_mut().remove(id);
        self.engine().removed(&path, &self.to_value());
        Ok(true)
    }
}
