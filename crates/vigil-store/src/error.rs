use thiserror::Error;
use vigil_core::ObserveError;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no store named '{name}'")]
    UnknownStore { name: String },

    #[error("a store named '{name}' already exists")]
    DuplicateStore { name: String },

    #[error("no action at '{path}'")]
    UnknownAction { path: String },

    /// The root state of a store must be a plain object.
    #[error("initial state must be an object, found {found}")]
    InvalidInitState { found: &'static str },

    #[error("invalid store options: {0}")]
    InvalidOptions(#[from] serde_json::Error),

    #[error(transparent)]
    Observe(#[from] ObserveError),
}

impl StoreError {
    #[must_use]
    pub fn is_strict_mode_violation(&self) -> bool {
        matches!(self, Self::Observe(e) if e.is_strict_mode_violation())
    }
}
