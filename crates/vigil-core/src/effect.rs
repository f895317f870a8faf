#![forbid(unsafe_code)]

//! Effect aggregation.
//!
//! An [`EffectRecord`] collects the joined paths touched by one mutation
//! batch, split into added, removed and modified sets. Listeners receive the
//! drained record and compare it against the paths they previously read.
//!
//! # Invariants
//!
//! 1. Recording an `Add` also records the parent path as added (the root's
//!    parent is the empty string). `Modify` and `Remove` never touch the
//!    parent.
//! 2. Sets keep first-insertion order and never hold duplicates.
//! 3. [`drain`](EffectRecord::drain) leaves the record empty.

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexSet;

use crate::path::Path;

/// Effect record shared between an engine and its store.
pub type SharedEffects = Rc<RefCell<EffectRecord>>;

/// Kind of structural change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffectKind {
    Add,
    Remove,
    Modify,
}

/// Added, removed and modified paths of one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EffectRecord {
    added: IndexSet<String>,
    removed: IndexSet<String>,
    modified: IndexSet<String>,
}

impl EffectRecord {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn shared() -> SharedEffects {
        Rc::new(RefCell::new(Self::new()))
    }

    /// Record one change at `path`.
    pub fn record(&mut self, kind: EffectKind, path: &Path) {
        match kind {
            EffectKind::Add => {
                self.added.insert(path.joined());
                if let Some(parent) = path.parent() {
                    self.added.insert(parent.joined());
                }
            }
            EffectKind::Remove => {
                self.removed.insert(path.joined());
            }
            EffectKind::Modify => {
                self.modified.insert(path.joined());
            }
        }
    }

    /// Take the current contents, leaving the record empty.
    #[must_use]
    pub fn drain(&mut self) -> EffectRecord {
        std::mem::take(self)
    }

    #[must_use]
    pub fn added(&self) -> &IndexSet<String> {
        &self.added
    }

    #[must_use]
    pub fn removed(&self) -> &IndexSet<String> {
        &self.removed
    }

    #[must_use]
    pub fn modified(&self) -> &IndexSet<String> {
        &self.modified
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.modified.is_empty()
    }

    /// Total entries across the three sets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.added.len() + self.removed.len() + self.modified.len()
    }

    /// Whether `path` (joined) appears in any set.
    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.added.contains(path) || self.removed.contains(path) || self.modified.contains(path)
    }

    /// Every recorded path with its kind; a path may appear under several kinds.
    pub fn iter(&self) -> impl Iterator<Item = (EffectKind, &str)> {
        let added = self.added.iter().map(|p| (EffectKind::Add, p.as_str()));
        let removed = self.removed.iter().map(|p| (EffectKind::Remove, p.as_str()));
        let modified = self.modified.iter().map(|p| (EffectKind::Modify, p.as_str()));
        added.chain(removed).chain(modified)
    }

    /// Whether any of `paths` was affected by this batch.
    pub fn intersects<'a, I>(&self, paths: I) -> bool
    where
        I: IntoIterator<Item = &'a str>,
    {
        paths.into_iter().any(|p| self.contains(p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(segments: &[&str]) -> Path {
        Path::from_segments(segments.iter().copied())
    }

    #[test]
    fn add_marks_parent() {
        let mut record = EffectRecord::new();
        record.record(EffectKind::Add, &path(&["todos", "3"]));
        assert!(record.added().contains("todos.3"));
        assert!(record.added().contains("todos"));
        assert_eq!(record.added().len(), 2);
    }

    #[test]
    fn top_level_add_marks_root() {
        let mut record = EffectRecord::new();
        record.record(EffectKind::Add, &path(&["name"]));
        assert!(record.added().contains("name"));
        assert!(record.added().contains(""));
    }

    #[test]
    fn modify_and_remove_do_not_touch_parent() {
        let mut record = EffectRecord::new();
        record.record(EffectKind::Modify, &path(&["user", "name"]));
        record.record(EffectKind::Remove, &path(&["user", "age"]));
        assert!(record.added().is_empty());
        assert!(!record.contains("user"));
        assert_eq!(record.len(), 2);
    }

    #[test]
    fn drain_empties() {
        let mut record = EffectRecord::new();
        record.record(EffectKind::Modify, &path(&["a"]));
        record.record(EffectKind::Modify, &path(&["a"]));
        let drained = record.drain();
        assert_eq!(drained.modified().len(), 1);
        assert!(record.is_empty());
    }

    #[test]
    fn intersects_any() {
        let mut record = EffectRecord::new();
        record.record(EffectKind::Remove, &path(&["m", "@4:1"]));
        assert!(record.intersects(["x", "m.@4:1"]));
        assert!(!record.intersects(["m"]));
    }

    #[test]
    fn iter_reports_kinds() {
        let mut record = EffectRecord::new();
        record.record(EffectKind::Modify, &path(&["a"]));
        record.record(EffectKind::Remove, &path(&["b"]));
        let kinds: Vec<_> = record.iter().collect();
        assert_eq!(kinds, vec![(EffectKind::Remove, "b"), (EffectKind::Modify, "a")]);
    }
}
