//! Expression lowering.
//!
//! Every expression leaves at most one value on the operand stack and
//! reports its type, read off the node itself: literal kind, local
//! declaration, or callee result.  Operands are always lowered left before
//! right, matching the stack machine's operand order.

use wasmling_ir::ast::Expr;
use wasmling_ir::{FuncRef, ValueType};

use crate::assembler::FunctionAssembler;
use crate::error::{CodegenError, CodegenResult};

/// Emit instructions for an expression.  Returns the type it leaves on the
/// stack (`Void` for calls to functions without a result).
pub fn emit_expr(expr: &Expr, asm: &mut FunctionAssembler) -> CodegenResult<ValueType> {
    match expr {
        Expr::Int(value) => {
            asm.i32_const(*value);
            Ok(ValueType::Int32)
        }
        Expr::Float(value) => {
            asm.f32_const(*value);
            Ok(ValueType::Float32)
        }
        Expr::Var(local) => {
            let ty = asm.local_type(*local)?;
            asm.local_get(*local)?;
            Ok(ty)
        }
        Expr::Add(left, right) => emit_arith(ArithOp::Add, left, right, asm),
        Expr::Mul(left, right) => emit_arith(ArithOp::Mul, left, right, asm),
        Expr::Call(func, args) => emit_call(*func, args, asm),
    }
}

#[derive(Debug, Clone, Copy)]
enum ArithOp {
    Add,
    Mul,
}

impl ArithOp {
    fn symbol(self) -> &'static str {
        match self {
            ArithOp::Add => "+",
            ArithOp::Mul => "*",
        }
    }
}

fn emit_arith(
    op: ArithOp,
    left: &Expr,
    right: &Expr,
    asm: &mut FunctionAssembler,
) -> CodegenResult<ValueType> {
    let lt = emit_expr(left, asm)?;
    let rt = emit_expr(right, asm)?;
    if lt != rt {
        return Err(CodegenError::Lowering(format!(
            "operand types differ in `{lt} {} {rt}` in `{}`",
            op.symbol(),
            asm.name()
        )));
    }
    match (lt, op) {
        (ValueType::Int32, ArithOp::Add) => asm.i32_add(),
        (ValueType::Int32, ArithOp::Mul) => asm.i32_mul(),
        (ValueType::Float32, ArithOp::Add) => asm.f32_add(),
        (ValueType::Float32, ArithOp::Mul) => asm.f32_mul(),
        (ValueType::Void, _) => {
            return Err(CodegenError::Lowering(format!(
                "arithmetic on void operands in `{}`",
                asm.name()
            )))
        }
    }
    Ok(lt)
}

fn emit_call(
    func: FuncRef,
    args: &[Expr],
    asm: &mut FunctionAssembler,
) -> CodegenResult<ValueType> {
    let program = asm.program();
    let callee = program.get(func).ok_or_else(|| {
        CodegenError::Resolution(format!(
            "call to unregistered function #{} in `{}`",
            func.index(),
            asm.name()
        ))
    })?;

    if callee.params().len() != args.len() {
        return Err(CodegenError::Lowering(format!(
            "`{}` takes {} argument(s), {} given in `{}`",
            callee.name(),
            callee.params().len(),
            args.len(),
            asm.name()
        )));
    }

    for (arg, param) in args.iter().zip(callee.params()) {
        let ty = emit_expr(arg, asm)?;
        if ty != param.ty {
            return Err(CodegenError::Lowering(format!(
                "argument `{}` of `{}` expects {}, got {ty} in `{}`",
                param.name,
                callee.name(),
                param.ty,
                asm.name()
            )));
        }
    }

    asm.call(func);
    Ok(callee.result())
}
