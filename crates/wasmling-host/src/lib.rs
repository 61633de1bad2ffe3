//! Host side of an emitted Wasmling module.
//!
//! - [`HostWrapper`] renders a JavaScript shim that instantiates the module
//!   in a browser or Node, wiring each `env` import to caller-supplied
//!   JavaScript.
//! - [`Runner`] loads the module in-process with `wasmi`, wiring each
//!   import to a Rust closure, and calls its exports.

mod error;
pub mod runner;
pub mod wrapper;

pub use error::{HostError, HostResult};
pub use runner::{HostImports, HostValue, Runner};
pub use wrapper::HostWrapper;
