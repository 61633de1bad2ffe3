//! Function index assignment.
//!
//! The binary format numbers imported functions first, so every emitted
//! index depends on how many imports precede it.  Resolution runs once over
//! the whole [`Program`] and produces an immutable [`Resolution`] that the
//! lowering and module-building stages read from.
//!
//! Order: imports, then internal functions, then exported functions; each
//! group in declaration order.  Indices are dense from 0.

use tracing::debug;
use wasmling_ir::{DeclKind, FuncRef, Program, ProgramId};

use crate::error::{CodegenError, CodegenResult};

/// Immutable mapping from declaration handle to emitted function index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    program: ProgramId,
    /// Indexed by `FuncRef::index()`.
    indices: Vec<u32>,
    /// Indexed by function index.
    order: Vec<FuncRef>,
}

impl Resolution {
    /// Function index of `func`.
    ///
    /// Fails for a handle this resolution never saw, i.e. a call to a
    /// declaration that was not registered with the program.
    pub fn index_of(&self, func: FuncRef) -> CodegenResult<u32> {
        if func.program() != self.program {
            return Err(unregistered(func));
        }
        self.indices
            .get(func.index() as usize)
            .copied()
            .ok_or_else(|| unregistered(func))
    }

    /// The program these indices were assigned for.
    pub fn program(&self) -> ProgramId {
        self.program
    }

    /// Declarations in function-index order.
    pub fn order(&self) -> &[FuncRef] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// One-shot index assigner.
///
/// Each declaration may be assigned exactly once; a second assignment is a
/// programming error and fails instead of renumbering.
#[derive(Debug)]
pub struct Resolver {
    program: ProgramId,
    slots: Vec<Option<u32>>,
    order: Vec<FuncRef>,
}

impl Resolver {
    pub fn new(program: &Program) -> Self {
        Self {
            program: program.id(),
            slots: vec![None; program.len()],
            order: Vec::with_capacity(program.len()),
        }
    }

    /// Give `func` the next free index.
    pub fn assign(&mut self, func: FuncRef) -> CodegenResult<u32> {
        if func.program() != self.program {
            return Err(unregistered(func));
        }
        let slot = self
            .slots
            .get_mut(func.index() as usize)
            .ok_or_else(|| unregistered(func))?;
        if let Some(existing) = slot {
            return Err(CodegenError::Resolution(format!(
                "function #{} already resolved to index {existing}",
                func.index()
            )));
        }
        let index = self.order.len() as u32;
        *slot = Some(index);
        self.order.push(func);
        Ok(index)
    }

    /// Freeze the assignment.  Every declaration must have an index.
    pub fn finish(self) -> CodegenResult<Resolution> {
        let mut indices = Vec::with_capacity(self.slots.len());
        for (i, slot) in self.slots.into_iter().enumerate() {
            match slot {
                Some(index) => indices.push(index),
                None => {
                    return Err(CodegenError::Resolution(format!(
                        "function #{i} was never assigned an index"
                    )))
                }
            }
        }
        Ok(Resolution {
            program: self.program,
            indices,
            order: self.order,
        })
    }
}

fn unregistered(func: FuncRef) -> CodegenError {
    CodegenError::Resolution(format!(
        "function #{} is not registered in this program",
        func.index()
    ))
}

/// Assign function indices to every declaration of `program`.
pub fn resolve(program: &Program) -> CodegenResult<Resolution> {
    let mut resolver = Resolver::new(program);

    let groups: [fn(&DeclKind) -> bool; 3] = [
        |k| matches!(k, DeclKind::Imported { .. }),
        |k| matches!(k, DeclKind::Internal),
        |k| matches!(k, DeclKind::Exported),
    ];
    for in_group in groups {
        for (func, decl) in program.functions() {
            if in_group(decl.kind()) {
                let index = resolver.assign(func)?;
                debug!(name = decl.name(), kind = decl.kind().label(), index, "resolved function");
            }
        }
    }

    resolver.finish()
}
