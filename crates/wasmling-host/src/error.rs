//! Host error types.

use std::fmt;

use thiserror::Error;

/// Errors raised while wrapping or running an emitted module.
#[derive(Debug, Error)]
pub enum HostError {
    /// The module imports a function nobody provided.
    #[error("no host function provided for import `{0}`")]
    MissingImport(String),

    #[error("module has no export `{0}`")]
    MissingExport(String),

    /// The module imports something other than functions and memory.
    #[error("unsupported import: {0}")]
    UnsupportedImport(String),

    /// The module could not be parsed, linked or instantiated.
    #[error("instantiation failed: {0}")]
    Instantiation(String),

    /// Execution trapped or the arguments didn't match the signature.
    #[error("trap in `{name}`: {message}")]
    Trap { name: String, message: String },

    /// The module map describes imports JavaScript cannot bind side by side.
    #[error("conflicting import `{0}` in module map")]
    ConflictingImport(String),

    #[error("cannot encode wrapper data: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("cannot render wrapper: {0}")]
    Render(#[from] fmt::Error),
}

/// Host result type alias.
pub type HostResult<T> = Result<T, HostError>;
