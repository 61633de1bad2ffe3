//! Statement lowering.
//!
//! Statements leave the operand stack as they found it, with one exception
//! (`return`, which ends the function).  A bare expression statement that
//! produces a value is followed by `drop`.

use wasmling_ir::ast::{Expr, Stmt};
use wasmling_ir::{Local, ValueType};

use crate::assembler::FunctionAssembler;
use crate::error::{CodegenError, CodegenResult};
use crate::expr::emit_expr;

/// Emit a slice of statements in order.
pub fn emit_stmts(stmts: &[Stmt], asm: &mut FunctionAssembler) -> CodegenResult<()> {
    for stmt in stmts {
        emit_stmt(stmt, asm)?;
    }
    Ok(())
}

/// Emit a single statement.
pub fn emit_stmt(stmt: &Stmt, asm: &mut FunctionAssembler) -> CodegenResult<()> {
    match stmt {
        Stmt::Assign(local, value) => emit_assign(*local, value, asm),
        Stmt::Increment(local) => emit_increment(*local, asm),
        Stmt::Return(value) => emit_return(value, asm),
        Stmt::Block(stmts) => emit_stmts(stmts, asm),
        Stmt::Expr(expr) => emit_expr_stmt(expr, asm),
    }
}

fn emit_assign(local: Local, value: &Expr, asm: &mut FunctionAssembler) -> CodegenResult<()> {
    let target = asm.local_type(local)?;
    let ty = emit_expr(value, asm)?;
    if ty != target {
        return Err(CodegenError::Lowering(format!(
            "cannot assign {ty} to {target} local {:?} in `{}`",
            local.kind,
            asm.name()
        )));
    }
    asm.local_set(local)
}

fn emit_increment(local: Local, asm: &mut FunctionAssembler) -> CodegenResult<()> {
    let ty = asm.local_type(local)?;
    asm.local_get(local)?;
    match ty {
        ValueType::Int32 => {
            asm.i32_const(1);
            asm.i32_add();
        }
        ValueType::Float32 => {
            asm.f32_const(1.0);
            asm.f32_add();
        }
        ValueType::Void => {
            return Err(CodegenError::Lowering(format!(
                "cannot increment void local in `{}`",
                asm.name()
            )))
        }
    }
    asm.local_set(local)
}

fn emit_return(value: &Expr, asm: &mut FunctionAssembler) -> CodegenResult<()> {
    let ty = emit_expr(value, asm)?;
    if ty != asm.result() {
        return Err(CodegenError::Lowering(format!(
            "`{}` returns {}, not {ty}",
            asm.name(),
            asm.result()
        )));
    }
    asm.ret();
    Ok(())
}

fn emit_expr_stmt(expr: &Expr, asm: &mut FunctionAssembler) -> CodegenResult<()> {
    if emit_expr(expr, asm)? != ValueType::Void {
        asm.drop_value();
    }
    Ok(())
}
