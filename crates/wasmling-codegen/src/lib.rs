//! Wasmling code generator: lowers an IR [`Program`](wasmling_ir::Program)
//! to a WebAssembly binary module.
//!
//! # Architecture
//!
//! ```text
//! Program ─▶ resolve ─▶ Resolution
//!    │                      │
//!    └──▶ emit_stmt ─▶ FunctionAssembler::finish ─▶ body bytes
//!                                                     │
//!                 ModuleBuilder::finish ◀─────────────┘ ─▶ .wasm
//! ```
//!
//! ## Module layout
//!
//! Header, then exactly five sections in this order: Type, Import,
//! Function, Export, Code.  Imports are always `env.<name>`; an optional
//! linear memory is imported as `env.memory` (see [`EmitOptions`]).
//!
//! ## Function indices
//!
//! Imports first, then internal functions, then exported functions, each
//! group in declaration order.  Each function has its own type entry at
//! the same position as its function index.

pub mod assembler;
pub mod binary;
pub mod compiler;
pub mod error;
pub mod expr;
pub mod module_map;
pub mod options;
pub mod resolve;
pub mod stmt;
pub mod types;

pub use assembler::{FunctionAssembler, Instruction, LocalLayout};
pub use compiler::{compile, compile_with_module_map, ModuleBuilder};
pub use error::{CodegenError, CodegenResult};
pub use module_map::{FuncKind, ModuleMap, ModuleMapEntry};
pub use options::{EmitOptions, MemoryLimits};
pub use resolve::{resolve, Resolution, Resolver};
