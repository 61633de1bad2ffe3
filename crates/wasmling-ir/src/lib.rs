//! Shared types for the Wasmling emitter.
//!
//! This crate defines the value types, the function declaration arena, and
//! the expression/statement tree that the code generator lowers to a
//! WebAssembly module.
//!
//! Declarations and locals are small indices ([`FuncRef`], [`Local`]) handed
//! out by a [`Program`] at construction time and tagged with its
//! [`ProgramId`].  Nothing here knows about the
//! emitted function index space; that is assigned later by the resolver in
//! `wasmling-codegen`.

mod error;
mod program;
mod types;
pub mod ast;

pub use error::{IrError, IrResult};
pub use program::{DeclKind, FuncRef, FunctionDecl, Local, LocalKind, Program, ProgramId};
pub use types::{Param, ValueType};
