//! Codegen error types.

use thiserror::Error;
use wasmling_ir::IrError;

/// Errors that can occur during module emission.
///
/// Every variant is a contract violation by the caller or an internal bug.
/// Emission stops at the first one; no partial module is ever returned.
#[derive(Debug, Error)]
pub enum CodegenError {
    /// An option or declaration asked for something the format can't hold.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A function handle could not be mapped to a function index, or the
    /// index space was assigned twice.
    #[error("resolution error: {0}")]
    Resolution(String),

    /// An IR node could not be lowered in its context.
    #[error("lowering error: {0}")]
    Lowering(String),

    /// The emitted module failed validation.
    #[error("WASM validation failed: {0}")]
    ValidationFailed(String),

    /// The IR arena rejected a request.
    #[error(transparent)]
    Ir(#[from] IrError),
}

/// Codegen result type alias.
pub type CodegenResult<T> = Result<T, CodegenError>;
