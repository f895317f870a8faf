use thiserror::Error;

pub type Result<T> = std::result::Result<T, ObserveError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ObserveError {
    /// A mutation was attempted outside an action while strict mode is on.
    /// The container is left untouched.
    #[error("store '{store}': mutation of '{path}' outside an action is not allowed in strict mode")]
    StrictModeViolation { store: String, path: String },

    #[error("weak collections only accept object keys, found {found}")]
    InvalidWeakKey { found: &'static str },

    /// An array length or index past [`MAX_ARRAY_LENGTH`], or one the
    /// backing storage cannot hold. The array is left untouched.
    ///
    /// [`MAX_ARRAY_LENGTH`]: crate::adapter::array::MAX_ARRAY_LENGTH
    #[error("invalid array length {len}")]
    InvalidArrayLength { len: usize },

    #[error("expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
}

impl ObserveError {
    #[must_use]
    pub fn strict_mode(store: impl Into<String>, path: impl Into<String>) -> Self {
        Self::StrictModeViolation {
            store: store.into(),
            path: path.into(),
        }
    }

    #[must_use]
    pub fn is_strict_mode_violation(&self) -> bool {
        matches!(self, Self::StrictModeViolation { .. })
    }
}
