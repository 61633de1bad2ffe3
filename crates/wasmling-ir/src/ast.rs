//! Expression and statement nodes.
//!
//! The tree is plain data: nodes refer to locals and functions by handle and
//! never carry emitted indices.  Large recursive variants are boxed.

use crate::program::{FuncRef, Local};

// ══════════════════════════════════════════════════════════════════════════════
// Expressions
// ══════════════════════════════════════════════════════════════════════════════

/// A value-producing node.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// 32-bit integer literal.
    Int(i32),
    /// 32-bit float literal.
    Float(f32),
    /// Read a local or parameter.
    Var(Local),
    /// `left + right`; both operands share one type.
    Add(Box<Expr>, Box<Expr>),
    /// `left * right`; both operands share one type.
    Mul(Box<Expr>, Box<Expr>),
    /// Call `func` with `args`, evaluated left to right.
    Call(FuncRef, Vec<Expr>),
}

impl Expr {
    pub fn int(value: i32) -> Self {
        Expr::Int(value)
    }

    pub fn float(value: f32) -> Self {
        Expr::Float(value)
    }

    pub fn var(local: Local) -> Self {
        Expr::Var(local)
    }

    pub fn add(left: Expr, right: Expr) -> Self {
        Expr::Add(Box::new(left), Box::new(right))
    }

    pub fn mul(left: Expr, right: Expr) -> Self {
        Expr::Mul(Box::new(left), Box::new(right))
    }

    pub fn call(func: FuncRef, args: Vec<Expr>) -> Self {
        Expr::Call(func, args)
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Statements
// ══════════════════════════════════════════════════════════════════════════════

/// A node executed for its effect.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// `local = value`
    Assign(Local, Expr),
    /// `local = local + 1`
    Increment(Local),
    /// Return `value` from the enclosing function.
    Return(Expr),
    /// Statements in order.  Purely structural: it emits no opcode of its
    /// own and is unrelated to the `block` control instruction.
    Block(Vec<Stmt>),
    /// Evaluate an expression for its side effects.
    Expr(Expr),
}

impl Stmt {
    pub fn assign(local: Local, value: Expr) -> Self {
        Stmt::Assign(local, value)
    }

    pub fn increment(local: Local) -> Self {
        Stmt::Increment(local)
    }

    pub fn ret(value: Expr) -> Self {
        Stmt::Return(value)
    }

    pub fn block(stmts: Vec<Stmt>) -> Self {
        Stmt::Block(stmts)
    }

    pub fn expr(expr: Expr) -> Self {
        Stmt::Expr(expr)
    }
}
