#![forbid(unsafe_code)]

//! Container adapters.
//!
//! Each container kind gets its own operation set on [`Proxy`]:
//!
//! | Kind    | Module     | Size read          |
//! |---------|------------|--------------------|
//! | object  | [`object`] | none               |
//! | array   | [`array`]  | `length` segment   |
//! | Map     | [`map`]    | `size` segment     |
//! | Set     | [`set`]    | `size` segment     |
//! | WeakMap | [`weak`]   | none               |
//! | WeakSet | [`weak`]   | none               |
//!
//! Every operation reports to the engine's [`Interceptor`]. Mutations call
//! [`Interceptor::check_mutation`] before touching the container and one of
//! the notification callbacks afterwards.
//!
//! [`Proxy`]: crate::observe::Proxy

pub mod array;
pub mod map;
pub mod object;
pub mod set;
pub mod weak;

use crate::error::ObserveError;
use crate::path::Path;
use crate::value::Value;

/// What a mutation is about to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    /// Replace an existing entry (including array `length`).
    Write,
    /// Create a new entry.
    Insert,
    /// Delete an entry or clear a container.
    Remove,
}

impl MutationKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Write => "write",
            Self::Insert => "insert",
            Self::Remove => "remove",
        }
    }
}

/// Callback channels of the observation engine.
///
/// All methods default to no-ops. `target` is the raw container the operation
/// applied to.
pub trait Interceptor {
    /// A value was read at `path`.
    fn on_read(&self, _value: &Value, _path: &Path) {}

    /// The size of a Map or Set was read. `path` ends with the `size` segment.
    fn on_size_read(&self, _path: &Path) {}

    /// Gate a mutation. An error aborts it with the container unchanged.
    fn check_mutation(&self, _kind: MutationKind, _path: &Path) -> Result<(), ObserveError> {
        Ok(())
    }

    /// An existing entry now holds `value` instead of `old`.
    fn on_write(&self, _value: &Value, _path: &Path, _old: &Value, _target: &Value) {}

    /// A new entry holding `value` was created.
    fn on_insert(&self, _value: &Value, _path: &Path, _target: &Value) {}

    /// The entry at `path` was removed.
    fn on_remove(&self, _path: &Path, _target: &Value) {}
}

/// Interceptor that observes nothing and permits everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopInterceptor;

impl Interceptor for NoopInterceptor {}
