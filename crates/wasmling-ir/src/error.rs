//! IR construction errors.

use thiserror::Error;

use crate::ValueType;

/// Errors raised while building a [`Program`](crate::Program).
///
/// All of these are configuration mistakes by the caller: the tree asked for
/// something the emitter cannot represent.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IrError {
    /// A parameter or local was declared with a type that has no storage.
    #[error("unsupported value type `{ty}` for {what} in `{function}`")]
    UnsupportedType {
        function: String,
        what: &'static str,
        ty: ValueType,
    },

    /// A [`FuncRef`](crate::FuncRef) that this program never handed out,
    /// either out of range or issued by another program.
    #[error("unknown function declaration #{0}")]
    UnknownFunction(u32),

    /// Imports are provided by the host and never carry a body.
    #[error("imported function `{0}` cannot have a body")]
    BodyOnImport(String),

    #[error("function `{0}` already has a body")]
    BodyRedefined(String),

    #[error("function `{function}` has no parameter {index}")]
    NoSuchParam { function: String, index: u32 },

    /// Import and export names are encoded byte-per-character.
    #[error("name `{0}` must be non-empty ASCII")]
    InvalidName(String),

    #[error("export name `{0}` is already in use")]
    DuplicateExport(String),

    /// Imports share the host's `env` namespace.
    #[error("import name `{0}` is already in use")]
    DuplicateImport(String),
}

/// IR result type alias.
pub type IrResult<T> = Result<T, IrError>;
