//! The declaration arena.
//!
//! A [`Program`] owns every function declaration and every local of every
//! function.  Callers get back small `Copy` handles ([`FuncRef`], [`Local`])
//! and build the IR tree out of those; later stages key all lookups off the
//! handle's index, never off object identity.
//!
//! Every program gets a process-unique [`ProgramId`] and every handle
//! carries the id of the program that issued it, so a handle used with the
//! wrong program is rejected instead of aliasing an unrelated declaration.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::ast::Stmt;
use crate::error::{IrError, IrResult};
use crate::types::{Param, ValueType};

// ══════════════════════════════════════════════════════════════════════════════
// Handles
// ══════════════════════════════════════════════════════════════════════════════

static NEXT_PROGRAM_ID: AtomicU32 = AtomicU32::new(0);

/// Identity of one [`Program`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramId(u32);

impl ProgramId {
    fn fresh() -> Self {
        Self(NEXT_PROGRAM_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ProgramId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "program {}", self.0)
    }
}

/// Arena index of a function declaration, in declaration order, tagged with
/// the program that issued it.
///
/// This is *not* the emitted function index; imports, internal and exported
/// functions are renumbered by the resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FuncRef {
    program: ProgramId,
    index: u32,
}

impl FuncRef {
    /// Raw arena index.
    pub fn index(self) -> u32 {
        self.index
    }

    /// The program this handle belongs to.
    pub fn program(self) -> ProgramId {
        self.program
    }
}

/// Which storage a [`Local`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LocalKind {
    /// The n-th parameter.  Its slot is its position.
    Param(u32),
    /// The n-th declared local of the owning function.
    Var(u32),
}

/// A local variable (or parameter) of one function.
///
/// Two locals of the same type are still distinct; identity is the pair
/// (owner, kind).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Local {
    pub owner: FuncRef,
    pub kind: LocalKind,
}

// ══════════════════════════════════════════════════════════════════════════════
// Declarations
// ══════════════════════════════════════════════════════════════════════════════

/// The three kinds of function declaration.
#[derive(Debug, Clone, PartialEq)]
pub enum DeclKind {
    /// Provided by the host.  `host_code` is opaque text for the host
    /// wrapper and is never inspected by the emitter.
    Imported { host_code: String },
    /// Defined in the module, not visible to the host.
    Internal,
    /// Defined in the module and exported under its name.
    Exported,
}

impl DeclKind {
    pub fn is_import(&self) -> bool {
        matches!(self, DeclKind::Imported { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            DeclKind::Imported { .. } => "import",
            DeclKind::Internal => "internal",
            DeclKind::Exported => "export",
        }
    }
}

/// One function declaration and, for non-imports, its body.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    name: String,
    params: Vec<Param>,
    result: ValueType,
    kind: DeclKind,
    locals: Vec<ValueType>,
    body: Option<Stmt>,
}

impl FunctionDecl {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn result(&self) -> ValueType {
        self.result
    }

    pub fn kind(&self) -> &DeclKind {
        &self.kind
    }

    /// Declared (non-parameter) locals, indexed by [`LocalKind::Var`].
    pub fn locals(&self) -> &[ValueType] {
        &self.locals
    }

    pub fn body(&self) -> Option<&Stmt> {
        self.body.as_ref()
    }

    /// Host-side text for an import, `None` for module-defined functions.
    pub fn host_code(&self) -> Option<&str> {
        match &self.kind {
            DeclKind::Imported { host_code } => Some(host_code),
            _ => None,
        }
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Program
// ══════════════════════════════════════════════════════════════════════════════

/// Every function of a module under construction.
///
/// A clone keeps the original's id, so handles stay valid for both copies.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    id: ProgramId,
    funcs: Vec<FunctionDecl>,
}

impl Default for Program {
    fn default() -> Self {
        Self::new()
    }
}

impl Program {
    pub fn new() -> Self {
        Self {
            id: ProgramId::fresh(),
            funcs: Vec::new(),
        }
    }

    pub fn id(&self) -> ProgramId {
        self.id
    }

    /// Whether `func` was issued by this program and is in range.
    pub fn owns(&self, func: FuncRef) -> bool {
        func.program == self.id && (func.index as usize) < self.funcs.len()
    }

    /// Declare a host-provided function.
    pub fn import(
        &mut self,
        name: impl Into<String>,
        params: Vec<Param>,
        result: ValueType,
        host_code: impl Into<String>,
    ) -> IrResult<FuncRef> {
        let kind = DeclKind::Imported {
            host_code: host_code.into(),
        };
        self.declare(name.into(), params, result, kind)
    }

    /// Declare a module-private function.
    pub fn internal(
        &mut self,
        name: impl Into<String>,
        params: Vec<Param>,
        result: ValueType,
    ) -> IrResult<FuncRef> {
        self.declare(name.into(), params, result, DeclKind::Internal)
    }

    /// Declare a function exported to the host under `name`.
    pub fn export(
        &mut self,
        name: impl Into<String>,
        params: Vec<Param>,
        result: ValueType,
    ) -> IrResult<FuncRef> {
        self.declare(name.into(), params, result, DeclKind::Exported)
    }

    fn declare(
        &mut self,
        name: String,
        params: Vec<Param>,
        result: ValueType,
        kind: DeclKind,
    ) -> IrResult<FuncRef> {
        if !matches!(kind, DeclKind::Internal) && !is_encodable_name(&name) {
            return Err(IrError::InvalidName(name));
        }
        if matches!(kind, DeclKind::Exported)
            && self
                .funcs
                .iter()
                .any(|f| matches!(f.kind, DeclKind::Exported) && f.name == name)
        {
            return Err(IrError::DuplicateExport(name));
        }
        if kind.is_import() && self.funcs.iter().any(|f| f.kind.is_import() && f.name == name) {
            return Err(IrError::DuplicateImport(name));
        }
        if let Some(p) = params.iter().find(|p| !p.ty.is_storable()) {
            return Err(IrError::UnsupportedType {
                function: name,
                what: "parameter",
                ty: p.ty,
            });
        }

        let id = FuncRef {
            program: self.id,
            index: self.funcs.len() as u32,
        };
        self.funcs.push(FunctionDecl {
            name,
            params,
            result,
            kind,
            locals: Vec::new(),
            body: None,
        });
        Ok(id)
    }

    /// Handle for the `index`-th parameter of `func`.
    pub fn param(&self, func: FuncRef, index: u32) -> IrResult<Local> {
        let decl = self.lookup(func)?;
        if index as usize >= decl.params.len() {
            return Err(IrError::NoSuchParam {
                function: decl.name.clone(),
                index,
            });
        }
        Ok(Local {
            owner: func,
            kind: LocalKind::Param(index),
        })
    }

    /// Declare a fresh local of type `ty` in `func`.
    pub fn local(&mut self, func: FuncRef, ty: ValueType) -> IrResult<Local> {
        let decl = self.lookup_mut(func)?;
        if !ty.is_storable() {
            return Err(IrError::UnsupportedType {
                function: decl.name.clone(),
                what: "local",
                ty,
            });
        }
        let index = decl.locals.len() as u32;
        decl.locals.push(ty);
        Ok(Local {
            owner: func,
            kind: LocalKind::Var(index),
        })
    }

    /// Attach the body of an internal or exported function.
    pub fn define(&mut self, func: FuncRef, body: Stmt) -> IrResult<()> {
        let decl = self.lookup_mut(func)?;
        if decl.kind.is_import() {
            return Err(IrError::BodyOnImport(decl.name.clone()));
        }
        if decl.body.is_some() {
            return Err(IrError::BodyRedefined(decl.name.clone()));
        }
        decl.body = Some(body);
        Ok(())
    }

    /// The declaration behind `func`, `None` for handles issued by another
    /// program.
    pub fn get(&self, func: FuncRef) -> Option<&FunctionDecl> {
        if func.program != self.id {
            return None;
        }
        self.funcs.get(func.index as usize)
    }

    /// Type of a local or parameter, `None` if the handle is dangling.
    pub fn local_type(&self, local: Local) -> Option<ValueType> {
        let decl = self.get(local.owner)?;
        match local.kind {
            LocalKind::Param(i) => decl.params.get(i as usize).map(|p| p.ty),
            LocalKind::Var(i) => decl.locals.get(i as usize).copied(),
        }
    }

    /// All declarations in declaration order.
    pub fn functions(&self) -> impl Iterator<Item = (FuncRef, &FunctionDecl)> {
        self.funcs
            .iter()
            .enumerate()
            .map(|(i, f)| {
                let func = FuncRef {
                    program: self.id,
                    index: i as u32,
                };
                (func, f)
            })
    }

    pub fn len(&self) -> usize {
        self.funcs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.funcs.is_empty()
    }

    fn lookup(&self, func: FuncRef) -> IrResult<&FunctionDecl> {
        self.get(func).ok_or(IrError::UnknownFunction(func.index))
    }

    fn lookup_mut(&mut self, func: FuncRef) -> IrResult<&mut FunctionDecl> {
        if func.program != self.id {
            return Err(IrError::UnknownFunction(func.index));
        }
        self.funcs
            .get_mut(func.index as usize)
            .ok_or(IrError::UnknownFunction(func.index))
    }
}

fn is_encodable_name(name: &str) -> bool {
    !name.is_empty() && name.is_ascii()
}
