#![forbid(unsafe_code)]

//! Array adapter.
//!
//! Indices are path segments in decimal. `length` is a real segment: reading
//! it is tracked and assigning it is always a write, even to the same value.
//! Assigning past the end is an insert and fills the gap with `undefined`.
//!
//! # Failure Modes
//!
//! - Lengths above [`MAX_ARRAY_LENGTH`] (and indices at or above it) fail with
//!   [`ObserveError::InvalidArrayLength`] before the gate is consulted.
//! - Growth the backing storage cannot reserve fails the same way, after the
//!   gate but before the array changes.

use crate::adapter::MutationKind;
use crate::error::{ObserveError, Result};
use crate::observe::{ArrayProxy, Observed};
use crate::path::{LENGTH_SEGMENT, Path};
use crate::value::Value;

/// Largest array length, `2^32 - 1`.
pub const MAX_ARRAY_LENGTH: usize = u32::MAX as usize;

fn check_len(len: usize) -> Result<()> {
    if len > MAX_ARRAY_LENGTH {
        return Err(ObserveError::InvalidArrayLength { len });
    }
    Ok(())
}

/// Reserve room for `data` to reach `len` elements.
fn reserve_to(data: &mut Vec<Value>, len: usize) -> Result<()> {
    let extra = len.saturating_sub(data.len());
    data.try_reserve(extra)
        .map_err(|_| ObserveError::InvalidArrayLength { len })
}

impl ArrayProxy {
    fn length_path(&self) -> Path {
        self.path().child(LENGTH_SEGMENT)
    }

    fn index_path(&self, index: usize) -> Path {
        self.path().child(index.to_string())
    }

    /// Current length, tracked as a read of `length`.
    pub fn len(&self) -> usize {
        let len = self.target().borrow().len();
        self.engine().read(&Value::from(len), &self.length_path());
        len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read an element. Out-of-range reads are silent and yield `undefined`.
    pub fn get(&self, index: usize) -> Observed {
        let Some(value) = self.target().borrow().get(index).cloned() else {
            return Observed::Value(Value::Undefined);
        };
        let path = self.index_path(index);
        self.engine().read(&value, &path);
        self.engine().wrap(value, path)
    }

    /// Assign an element.
    pub fn set(&self, index: usize, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        check_len(index.saturating_add(1))?;
        let engine = self.engine();
        let path = self.index_path(index);
        let old = self.target().borrow().get(index).cloned();
        match old {
            None => {
                engine.check(MutationKind::Insert, &path)?;
                {
                    let mut data = self.target().borrow_mut();
                    reserve_to(&mut data, index + 1)?;
                    data.resize(index, Value::Undefined);
                    data.push(value.clone());
                }
                engine.inserted(&value, &path, &self.to_value());
            }
            Some(old) if old.is_identical(&value) => {}
            Some(old) => {
                engine.check(MutationKind::Write, &path)?;
                self.target().borrow_mut()[index] = value.clone();
                engine.wrote(&value, &path, &old, &self.to_value());
            }
        }
        Ok(())
    }

    /// Assign `length`, truncating or padding with `undefined`.
    pub fn set_len(&self, len: usize) -> Result<()> {
        check_len(len)?;
        let engine = self.engine();
        let path = self.length_path();
        engine.check(MutationKind::Write, &path)?;
        let old = {
            let mut data = self.target().borrow_mut();
            let old = data.len();
            reserve_to(&mut data, len)?;
            data.resize(len, Value::Undefined);
            old
        };
        engine.wrote(&Value::from(len), &path, &Value::from(old), &self.to_value());
        Ok(())
    }

    /// Append an element, returning the new length.
    pub fn push(&self, value: impl Into<Value>) -> Result<usize> {
        let value = value.into();
        let engine = self.engine();
        let old = self.target().borrow().len();
        let path = self.index_path(old);
        engine.check(MutationKind::Insert, &path)?;
        self.target().borrow_mut().push(value.clone());
        let target = self.to_value();
        engine.inserted(&value, &path, &target);
        engine.wrote(
            &Value::from(old + 1),
            &self.length_path(),
            &Value::from(old),
            &target,
        );
        Ok(old + 1)
    }

    /// Remove and return the last element. Empty arrays are left alone.
    pub fn pop(&self) -> Result<Option<Value>> {
        let engine = self.engine();
        let old = self.target().borrow().len();
        if old == 0 {
            return Ok(None);
        }
        let path = self.index_path(old - 1);
        engine.check(MutationKind::Remove, &path)?;
        let popped = self.target().borrow_mut().pop();
        let target = self.to_value();
        engine.removed(&path, &target);
        engine.wrote(
            &Value::from(old - 1),
            &self.length_path(),
            &Value::from(old),
            &target,
        );
        Ok(popped)
    }

    /// Delete an element, leaving `undefined` in its slot.
    pub fn delete(&self, index: usize) -> Result<bool> {
        if index >= self.target().borrow().len() {
            return Ok(false);
        }
        let path = self.index_path(index);
        self.engine().check(MutationKind::Remove, &path)?;
        self.target().borrow_mut()[index] = Value::Undefined;
        self.engine().removed(&path, &self.to_value());
        Ok(true)
    }

    /// Every element in order, after a tracked read of `length`.
    pub fn values(&self) -> Vec<Observed> {
        let len = self.len();
        (0..len).map(|i| self.get(i)).collect()
    }
}
