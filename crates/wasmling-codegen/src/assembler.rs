//! Per-function instruction assembly.
//!
//! A [`FunctionAssembler`] collects a symbolic instruction stream for one
//! function body.  Locals and call targets stay as handles until
//! [`FunctionAssembler::finish`], which lays out local slots, resolves call
//! targets against a [`Resolution`], and encodes the body.
//!
//! Slot layout is fixed regardless of the order locals were declared or
//! first used:
//!
//! ```text
//! [0, P)            parameters
//! [P, P+I)          Int32 locals, in declaration order
//! [P+I, P+I+F)      Float32 locals, in declaration order
//! ```
//!
//! Only locals the body actually touches are declared.

use std::collections::BTreeSet;

use wasmling_ir::{FuncRef, Local, LocalKind, Program, ValueType};

use crate::binary::{write_f32, write_i32, write_u32};
use crate::error::{CodegenError, CodegenResult};
use crate::resolve::Resolution;
use crate::types::*;

// ══════════════════════════════════════════════════════════════════════════════
// Instruction
// ══════════════════════════════════════════════════════════════════════════════

/// One instruction with its immediate.  Local and function immediates are
/// handles, turned into numbers only when the body is encoded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Instruction {
    I32Const(i32),
    F32Const(f32),
    LocalGet(Local),
    LocalSet(Local),
    Call(FuncRef),
    I32Add,
    I32Mul,
    F32Add,
    F32Mul,
    Drop,
    Return,
    Block(ValueType),
    Loop(ValueType),
    Br(u32),
    BrIf(u32),
    End,
}

// ══════════════════════════════════════════════════════════════════════════════
// Local layout
// ══════════════════════════════════════════════════════════════════════════════

/// Slot assignment for the locals one body uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalLayout {
    param_count: u32,
    /// Slot per declared local, `None` for unused ones.
    slots: Vec<Option<u32>>,
    int32_count: u32,
    float32_count: u32,
}

impl LocalLayout {
    fn new(param_count: u32, declared: &[ValueType], used: &BTreeSet<u32>) -> Self {
        let mut slots = vec![None; declared.len()];
        let mut next = param_count;
        let mut counts = [0u32; 2];
        for (group, ty) in [ValueType::Int32, ValueType::Float32].into_iter().enumerate() {
            for &var in used {
                if declared[var as usize] == ty {
                    slots[var as usize] = Some(next);
                    next += 1;
                    counts[group] += 1;
                }
            }
        }
        Self {
            param_count,
            slots,
            int32_count: counts[0],
            float32_count: counts[1],
        }
    }

    /// Slot of `local`, `None` if the body never touches it.
    pub fn slot_of(&self, local: Local) -> Option<u32> {
        match local.kind {
            LocalKind::Param(i) => (i < self.param_count).then_some(i),
            LocalKind::Var(i) => self.slots.get(i as usize).copied().flatten(),
        }
    }

    /// `(count, type)` groups for the body's locals vector.  Empty groups
    /// are omitted.
    pub fn groups(&self) -> Vec<(u32, ValueType)> {
        [
            (self.int32_count, ValueType::Int32),
            (self.float32_count, ValueType::Float32),
        ]
        .into_iter()
        .filter(|(count, _)| *count > 0)
        .collect()
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// FunctionAssembler
// ══════════════════════════════════════════════════════════════════════════════

/// Builds the body of one module-defined function.
pub struct FunctionAssembler<'p> {
    program: &'p Program,
    func: FuncRef,
    name: &'p str,
    result: ValueType,
    param_count: u32,
    /// Declared locals touched by the body, by declaration index.
    used: BTreeSet<u32>,
    instructions: Vec<Instruction>,
    /// Open block/loop constructs.
    depth: u32,
}

impl<'p> FunctionAssembler<'p> {
    /// Start assembling the body of `func`.
    pub fn new(program: &'p Program, func: FuncRef) -> CodegenResult<Self> {
        let decl = program.get(func).ok_or_else(|| {
            CodegenError::Resolution(format!(
                "function #{} is not registered in this program",
                func.index()
            ))
        })?;
        if decl.kind().is_import() {
            return Err(CodegenError::Lowering(format!(
                "imported function `{}` has no body to assemble",
                decl.name()
            )));
        }
        Ok(Self {
            program,
            func,
            name: decl.name(),
            result: decl.result(),
            param_count: decl.params().len() as u32,
            used: BTreeSet::new(),
            instructions: Vec::new(),
            depth: 0,
        })
    }

    pub fn program(&self) -> &'p Program {
        self.program
    }

    /// The function being assembled.
    pub fn func(&self) -> FuncRef {
        self.func
    }

    /// Name of the function being assembled, for diagnostics.
    pub fn name(&self) -> &'p str {
        self.name
    }

    /// Declared result type of the function being assembled.
    pub fn result(&self) -> ValueType {
        self.result
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    // ── Constants and arithmetic ─────────────────────────────────────────

    pub fn i32_const(&mut self, value: i32) {
        self.instructions.push(Instruction::I32Const(value));
    }

    pub fn f32_const(&mut self, value: f32) {
        self.instructions.push(Instruction::F32Const(value));
    }

    pub fn i32_add(&mut self) {
        self.instructions.push(Instruction::I32Add);
    }

    pub fn i32_mul(&mut self) {
        self.instructions.push(Instruction::I32Mul);
    }

    pub fn f32_add(&mut self) {
        self.instructions.push(Instruction::F32Add);
    }

    pub fn f32_mul(&mut self) {
        self.instructions.push(Instruction::F32Mul);
    }

    pub fn drop_value(&mut self) {
        self.instructions.push(Instruction::Drop);
    }

    pub fn ret(&mut self) {
        self.instructions.push(Instruction::Return);
    }

    // ── Locals ───────────────────────────────────────────────────────────

    pub fn local_get(&mut self, local: Local) -> CodegenResult<()> {
        self.register(local)?;
        self.instructions.push(Instruction::LocalGet(local));
        Ok(())
    }

    pub fn local_set(&mut self, local: Local) -> CodegenResult<()> {
        self.register(local)?;
        self.instructions.push(Instruction::LocalSet(local));
        Ok(())
    }

    /// Type of `local`, checking it belongs to this function.
    pub fn local_type(&self, local: Local) -> CodegenResult<ValueType> {
        if local.owner != self.func {
            let owner = self
                .program
                .get(local.owner)
                .map(|d| d.name().to_string())
                .unwrap_or_else(|| format!("#{} of another program", local.owner.index()));
            return Err(CodegenError::Lowering(format!(
                "local {:?} of `{owner}` used in `{}`",
                local.kind, self.name
            )));
        }
        self.program.local_type(local).ok_or_else(|| {
            CodegenError::Lowering(format!(
                "local {:?} is not declared in `{}`",
                local.kind, self.name
            ))
        })
    }

    fn register(&mut self, local: Local) -> CodegenResult<()> {
        self.local_type(local)?;
        if let LocalKind::Var(i) = local.kind {
            self.used.insert(i);
        }
        Ok(())
    }

    // ── Calls ────────────────────────────────────────────────────────────

    /// Call `func`.  The target's index is looked up when the body is
    /// encoded.
    pub fn call(&mut self, func: FuncRef) {
        self.instructions.push(Instruction::Call(func));
    }

    // ── Structured control ───────────────────────────────────────────────

    pub fn block(&mut self, ty: ValueType) {
        self.depth += 1;
        self.instructions.push(Instruction::Block(ty));
    }

    pub fn loop_(&mut self, ty: ValueType) {
        self.depth += 1;
        self.instructions.push(Instruction::Loop(ty));
    }

    /// Branch to the construct `label` levels out.
    pub fn br(&mut self, label: u32) -> CodegenResult<()> {
        self.check_label(label)?;
        self.instructions.push(Instruction::Br(label));
        Ok(())
    }

    pub fn br_if(&mut self, label: u32) -> CodegenResult<()> {
        self.check_label(label)?;
        self.instructions.push(Instruction::BrIf(label));
        Ok(())
    }

    /// Close the innermost open block or loop.
    pub fn end(&mut self) -> CodegenResult<()> {
        if self.depth == 0 {
            return Err(CodegenError::Lowering(format!(
                "`end` without an open block in `{}`",
                self.name
            )));
        }
        self.depth -= 1;
        self.instructions.push(Instruction::End);
        Ok(())
    }

    fn check_label(&self, label: u32) -> CodegenResult<()> {
        // label == depth targets the function body itself
        if label > self.depth {
            return Err(CodegenError::Lowering(format!(
                "branch label {label} exceeds nesting depth {} in `{}`",
                self.depth, self.name
            )));
        }
        Ok(())
    }

    // ── Finalization ─────────────────────────────────────────────────────

    /// Slot layout for the locals used so far.
    pub fn layout(&self) -> LocalLayout {
        let declared = self
            .program
            .get(self.func)
            .map(|d| d.locals())
            .unwrap_or_default();
        LocalLayout::new(self.param_count, declared, &self.used)
    }

    /// Encode the body: `size (locals-vector instructions end)`.
    pub fn finish(self, resolution: &Resolution) -> CodegenResult<Vec<u8>> {
        if self.depth != 0 {
            return Err(CodegenError::Lowering(format!(
                "{} structured construct(s) left open in `{}`",
                self.depth, self.name
            )));
        }

        let layout = self.layout();
        let mut content = Vec::new();

        let groups = layout.groups();
        write_u32(&mut content, groups.len() as u32);
        for (count, ty) in groups {
            write_u32(&mut content, count);
            content.push(ty.wire_code());
        }

        for instr in &self.instructions {
            encode_instruction(&mut content, instr, &layout, resolution)?;
        }
        content.push(OP_END);

        let mut body = Vec::with_capacity(content.len() + 5);
        write_u32(&mut body, content.len() as u32);
        body.extend_from_slice(&content);
        Ok(body)
    }
}

fn encode_instruction(
    sink: &mut Vec<u8>,
    instr: &Instruction,
    layout: &LocalLayout,
    resolution: &Resolution,
) -> CodegenResult<()> {
    let slot = |local: Local| {
        layout.slot_of(local).ok_or_else(|| {
            CodegenError::Lowering(format!("local {:?} has no slot", local.kind))
        })
    };

    match *instr {
        Instruction::I32Const(v) => {
            sink.push(OP_I32_CONST);
            write_i32(sink, v);
        }
        Instruction::F32Const(v) => {
            sink.push(OP_F32_CONST);
            write_f32(sink, v);
        }
        Instruction::LocalGet(local) => {
            sink.push(OP_LOCAL_GET);
            write_u32(sink, slot(local)?);
        }
        Instruction::LocalSet(local) => {
            sink.push(OP_LOCAL_SET);
            write_u32(sink, slot(local)?);
        }
        Instruction::Call(func) => {
            sink.push(OP_CALL);
            write_u32(sink, resolution.index_of(func)?);
        }
        Instruction::I32Add => sink.push(OP_I32_ADD),
        Instruction::I32Mul => sink.push(OP_I32_MUL),
        Instruction::F32Add => sink.push(OP_F32_ADD),
        Instruction::F32Mul => sink.push(OP_F32_MUL),
        Instruction::Drop => sink.push(OP_DROP),
        Instruction::Return => sink.push(OP_RETURN),
        Instruction::Block(ty) => {
            sink.push(OP_BLOCK);
            sink.push(ty.wire_code());
        }
        Instruction::Loop(ty) => {
            sink.push(OP_LOOP);
            sink.push(ty.wire_code());
        }
        Instruction::Br(label) => {
            sink.push(OP_BR);
            write_u32(sink, label);
        }
        Instruction::BrIf(label) => {
            sink.push(OP_BR_IF);
            write_u32(sink, label);
        }
        Instruction::End => sink.push(OP_END),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::resolve;
    use wasmling_ir::Param;

    #[test]
    fn int_locals_precede_float_locals() {
        let mut p = Program::new();
        let f = p
            .export("F", vec![Param::int32("a"), Param::float32("b")], ValueType::Void)
            .unwrap();
        let x = p.local(f, ValueType::Float32).unwrap();
        let y = p.local(f, ValueType::Int32).unwrap();
        let z = p.local(f, ValueType::Float32).unwrap();
        let w = p.local(f, ValueType::Int32).unwrap();

        let mut asm = FunctionAssembler::new(&p, f).unwrap();
        for l in [z, w, x, y] {
            asm.local_get(l).unwrap();
            asm.drop_value();
        }
        let layout = asm.layout();
        assert_eq!(layout.slot_of(p.param(f, 0).unwrap()), Some(0));
        assert_eq!(layout.slot_of(p.param(f, 1).unwrap()), Some(1));
        assert_eq!(layout.slot_of(y), Some(2));
        assert_eq!(layout.slot_of(w), Some(3));
        assert_eq!(layout.slot_of(x), Some(4));
        assert_eq!(layout.slot_of(z), Some(5));
        assert_eq!(
            layout.groups(),
            vec![(2, ValueType::Int32), (2, ValueType::Float32)]
        );
    }

    #[test]
    fn unused_group_is_omitted() {
        let mut p = Program::new();
        let f = p.export("F", vec![], ValueType::Void).unwrap();
        let a = p.local(f, ValueType::Int32).unwrap();
        let _unused = p.local(f, ValueType::Float32).unwrap();
        let r = resolve(&p).unwrap();

        let mut asm = FunctionAssembler::new(&p, f).unwrap();
        asm.i32_const(1);
        asm.local_set(a).unwrap();
        let body = asm.finish(&r).unwrap();
        // size, 1 group: (1 x i32), i32.const 1, local.set 0, end
        assert_eq!(
            body,
            vec![0x08, 0x01, 0x01, 0x7F, 0x41, 0x01, 0x21, 0x00, 0x0B]
        );
    }

    #[test]
    fn empty_body_has_empty_locals_vector() {
        let mut p = Program::new();
        let f = p.export("F", vec![], ValueType::Void).unwrap();
        let r = resolve(&p).unwrap();
        let body = FunctionAssembler::new(&p, f).unwrap().finish(&r).unwrap();
        assert_eq!(body, vec![0x02, 0x00, 0x0B]);
    }

    #[test]
    fn foreign_local_is_rejected() {
        let mut p = Program::new();
        let f = p.export("F", vec![], ValueType::Void).unwrap();
        let g = p.export("G", vec![], ValueType::Void).unwrap();
        let gl = p.local(g, ValueType::Int32).unwrap();
        let mut asm = FunctionAssembler::new(&p, f).unwrap();
        let err = asm.local_get(gl).unwrap_err();
        assert!(matches!(err, CodegenError::Lowering(_)));
        assert!(err.to_string().contains("`G`"));
    }

    #[test]
    fn call_resolves_at_finish() {
        let mut p = Program::new();
        let main = p.export("Main", vec![], ValueType::Void).unwrap();
        let log = p.import("Log", vec![], ValueType::Void, "").unwrap();
        let r = resolve(&p).unwrap();

        let mut asm = FunctionAssembler::new(&p, main).unwrap();
        asm.call(log);
        assert_eq!(asm.instructions(), &[Instruction::Call(log)]);
        let body = asm.finish(&r).unwrap();
        assert_eq!(body, vec![0x04, 0x00, 0x10, 0x00, 0x0B]);
    }

    #[test]
    fn call_to_unregistered_function_fails() {
        let mut other = Program::new();
        other.export("A", vec![], ValueType::Void).unwrap();
        let foreign = other.export("B", vec![], ValueType::Void).unwrap();

        let mut p = Program::new();
        let main = p.export("Main", vec![], ValueType::Void).unwrap();
        p.internal("Other", vec![], ValueType::Void).unwrap();
        let r = resolve(&p).unwrap();
        let mut asm = FunctionAssembler::new(&p, main).unwrap();
        asm.call(foreign);
        assert!(matches!(
            asm.finish(&r),
            Err(CodegenError::Resolution(_))
        ));
    }

    #[test]
    fn loop_encoding() {
        let mut p = Program::new();
        let f = p.export("F", vec![], ValueType::Void).unwrap();
        let r = resolve(&p).unwrap();
        let mut asm = FunctionAssembler::new(&p, f).unwrap();
        asm.block(ValueType::Void);
        asm.loop_(ValueType::Void);
        asm.i32_const(0);
        asm.br_if(1).unwrap();
        asm.br(0).unwrap();
        asm.end().unwrap();
        asm.end().unwrap();
        let body = asm.finish(&r).unwrap();
        assert_eq!(
            body,
            vec![
                0x0E, 0x00, // size, no locals
                0x02, 0x40, // block
                0x03, 0x40, // loop
                0x41, 0x00, // i32.const 0
                0x0D, 0x01, // br_if 1
                0x0C, 0x00, // br 0
                0x0B, 0x0B, // end end
                0x0B, // function end
            ]
        );
    }

    #[test]
    fn unbalanced_control_is_rejected() {
        let mut p = Program::new();
        let f = p.export("F", vec![], ValueType::Void).unwrap();
        let r = resolve(&p).unwrap();

        let mut asm = FunctionAssembler::new(&p, f).unwrap();
        assert!(asm.end().is_err());
        assert!(asm.br(1).is_err());
        asm.block(ValueType::Void);
        assert!(matches!(asm.finish(&r), Err(CodegenError::Lowering(_))));
    }

    #[test]
    fn imports_have_no_assembler() {
        let mut p = Program::new();
        let f = p.import("Log", vec![], ValueType::Void, "").unwrap();
        assert!(FunctionAssembler::new(&p, f).is_err());
    }
}
