#![forbid(unsafe_code)]

//! Set adapter.
//!
//! Members live under the registry token of the member value. Members are
//! handed out raw unless the engine was built with `proxy_set_deep`, in which
//! case container members come back wrapped and edits to them are tracked
//! like any other nested container.
//!
//! # Failure Modes
//!
//! - The string member `"size"` is used verbatim, so adding it records an
//!   insert and a size write on the same path.

use crate::adapter::MutationKind;
use crate::error::Result;
use crate::observe::{Observed, SetProxy};
use crate::path::Path;
use crate::value::{MapKey, Value};

impl SetProxy {
    fn member_path(&self, member: &Value) -> Option<Path> {
        let segment = self.engine().identify(self.id(), member)?;
        Some(self.path().child(segment))
    }

    fn contains_raw(&self, member: &Value) -> bool {
        self.target()
            .borrow()
            .contains(&MapKey::new(member.clone()))
    }

    fn hand_out(&self, member: Value, path: Path) -> Observed {
        self.engine().read(&member, &path);
        if self.engine().proxy_set_deep() {
            self.engine().wrap(member, path)
        } else {
            Observed::Value(member)
        }
    }

    /// Member count, tracked as a read of `size`.
    pub fn size(&self) -> usize {
        self.engine().size_read(self.path());
        self.target().borrow().len()
    }

    /// Membership test, tracked as a read of the member path.
    pub fn has(&self, member: impl Into<Value>) -> bool {
        let member = member.into();
        let present = self.contains_raw(&member);
        if let Some(path) = self.member_path(&member) {
            self.engine().read(&Value::from(present), &path);
        }
        present
    }

    /// Add a member. Returns `false` if it was already present.
    pub fn add(&self, member: impl Into<Value>) -> Result<bool> {
        let member = member.into();
        if self.contains_raw(&member) {
            return Ok(false);
        }
        let Some(path) = self.member_path(&member) else {
            self.target().borrow_mut().insert(MapKey::new(member));
            return Ok(true);
        };
        let engine = self.engine();
        engine.check(MutationKind::Insert, &path)?;
        let before = {
            let mut data = self.target().borrow_mut();
            let before = data.len();
            data.insert(MapKey::new(member.clone()));
            before
        };
        let target = self.to_value();
        engine.inserted(&member, &path, &target);
        engine.size_changed(self.path(), before, before + 1, &target);
        Ok(true)
    }

    /// Remove a member. Returns whether it was present.
    pub fn delete(&self, member: impl Into<Value>) -> Result<bool> {
        let member = member.into();
        if !self.contains_raw(&member) {
            return Ok(false);
        }
        let key = MapKey::new(member.clone());
        let Some(path) = self.member_path(&member) else {
            self.target().borrow_mut().shift_remove(&key);
            return Ok(true);
        };
        let engine = self.engine();
        engine.check(MutationKind::Remove, &path)?;
        let before = {
            let mut data = self.target().borrow_mut();
            let before = data.len();
            data.shift_remove(&key);
            before
        };
        let target = self.to_value();
        engine.removed(&path, &target);
        engine.size_changed(self.path(), before, before - 1, &target);
        Ok(true)
    }

    /// Remove every member.
    pub fn clear(&self) -> Result<()> {
        let before = self.target().borrow().len();
        if before == 0 {
            return Ok(());
        }
        let engine = self.engine();
        engine.check(MutationKind::Remove, self.path())?;
        let members: Vec<Value> = self
            .target()
            .borrow()
            .iter()
            .map(|m| m.value().clone())
            .collect();
        let member_paths: Vec<Path> = members
            .iter()
            .filter_map(|m| self.member_path(m))
            .collect();
        self.target().borrow_mut().clear();

        let target = self.to_value();
        engine.removed(self.path(), &target);
        for path in &member_paths {
            engine.removed(path, &target);
        }
        engine.size_changed(self.path(), before, 0, &target);
        Ok(())
    }

    /// Members in insertion order, after a tracked `size` read.
    pub fn values(&self) -> Vec<Observed> {
        self.engine().size_read(self.path());
        let members: Vec<Value> = self
            .target()
            .borrow()
            .iter()
            .map(|m| m.value().clone())
            .collect();
        members
            .into_iter()
            .map(|member| match self.member_path(&member) {
                Some(path) => self.hand_out(member, path),
                None => Observed::Value(member),
            })
            .collect()
    }

    /// Visit each member.
    pub fn for_each(&self, mut f: impl FnMut(Observed)) {
        for member in self.values() {
            f(member);
        }
    }
}
