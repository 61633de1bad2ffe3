//! Main module assembler.
//!
//! Orchestrates the emission pipeline:
//! 1. Validate options and assign function indices ([`resolve`])
//! 2. Lower every module-defined body through a [`FunctionAssembler`]
//! 3. Stitch the Type, Import, Function, Export and Code sections
//! 4. Validate with `wasmparser`
//!
//! Every function, imports included, gets its own type entry at the
//! position equal to its function index, so the type index of function `i`
//! is always `i`.

use tracing::debug;
use wasmling_ir::{DeclKind, FuncRef, FunctionDecl, Program, ValueType};

use crate::assembler::FunctionAssembler;
use crate::binary::{write_name, write_section, write_u32, write_vec};
use crate::error::{CodegenError, CodegenResult};
use crate::module_map::ModuleMap;
use crate::options::{EmitOptions, MemoryLimits};
use crate::resolve::{resolve, Resolution};
use crate::stmt::emit_stmt;
use crate::types::*;

// ══════════════════════════════════════════════════════════════════════════════
// Public API
// ══════════════════════════════════════════════════════════════════════════════

/// Emit `program` as a WebAssembly binary module.
///
/// Returns the raw bytes of a valid module, or the first
/// [`CodegenError`] encountered.  Emission is deterministic: the same
/// program and options always give the same bytes.
pub fn compile(program: &Program, options: &EmitOptions) -> CodegenResult<Vec<u8>> {
    compile_with_module_map(program, options).map(|(bytes, _)| bytes)
}

/// Like [`compile`], also returning the [`ModuleMap`] the host wrapper
/// consumes.
pub fn compile_with_module_map(
    program: &Program,
    options: &EmitOptions,
) -> CodegenResult<(Vec<u8>, ModuleMap)> {
    options.validate()?;
    let resolution = resolve(program)?;
    let mut builder = ModuleBuilder::new(program, &resolution, options)?;

    for &func in resolution.order() {
        let Some(decl) = program.get(func) else {
            continue;
        };
        if decl.kind().is_import() {
            continue;
        }
        let body = lower_function(program, func, decl, &resolution)?;
        builder.add_body(func, body)?;
    }

    let bytes = builder.finish()?;
    let map = ModuleMap::new(program, &resolution, options.memory);
    Ok((bytes, map))
}

/// Lower one module-defined function to its encoded body.
pub fn lower_function(
    program: &Program,
    func: FuncRef,
    decl: &FunctionDecl,
    resolution: &Resolution,
) -> CodegenResult<Vec<u8>> {
    let stmt = decl.body().ok_or_else(|| {
        CodegenError::Lowering(format!("function `{}` has no body", decl.name()))
    })?;
    let mut asm = FunctionAssembler::new(program, func)?;
    emit_stmt(stmt, &mut asm)?;
    debug!(
        name = decl.name(),
        instructions = asm.instructions().len(),
        "lowered function"
    );
    asm.finish(resolution)
}

// ══════════════════════════════════════════════════════════════════════════════
// ModuleBuilder
// ══════════════════════════════════════════════════════════════════════════════

/// Combines resolved declarations and assembled bodies into a module.
pub struct ModuleBuilder<'a> {
    program: &'a Program,
    resolution: &'a Resolution,
    options: &'a EmitOptions,
    /// Encoded bodies by function index; `None` for imports and for bodies
    /// not yet added.
    bodies: Vec<Option<Vec<u8>>>,
}

impl<'a> ModuleBuilder<'a> {
    pub fn new(
        program: &'a Program,
        resolution: &'a Resolution,
        options: &'a EmitOptions,
    ) -> CodegenResult<Self> {
        if resolution.program() != program.id() {
            return Err(CodegenError::Resolution(format!(
                "resolution was computed for {}, not {}",
                resolution.program(),
                program.id()
            )));
        }
        if resolution.len() != program.len() {
            return Err(CodegenError::Resolution(format!(
                "resolution covers {} function(s), program declares {}",
                resolution.len(),
                program.len()
            )));
        }

        if options.memory.is_some() {
            if let Some((_, clash)) = program
                .functions()
                .find(|(_, d)| d.kind().is_import() && d.name() == MEMORY_FIELD)
            {
                return Err(CodegenError::Configuration(format!(
                    "import `{}` collides with the `{IMPORT_MODULE}.{MEMORY_FIELD}` memory import",
                    clash.name()
                )));
            }
        }

        // Imports must occupy the lowest indices.
        let mut seen_defined = false;
        for (index, &func) in resolution.order().iter().enumerate() {
            let decl = Self::decl(program, func)?;
            match decl.kind() {
                DeclKind::Imported { .. } if seen_defined => {
                    return Err(CodegenError::Resolution(format!(
                        "import `{}` resolved to index {index} after module-defined functions",
                        decl.name()
                    )));
                }
                DeclKind::Imported { .. } => {}
                DeclKind::Internal | DeclKind::Exported => seen_defined = true,
            }
        }

        Ok(Self {
            program,
            resolution,
            options,
            bodies: vec![None; resolution.len()],
        })
    }

    /// Register the encoded body of a module-defined function.
    pub fn add_body(&mut self, func: FuncRef, body: Vec<u8>) -> CodegenResult<()> {
        let index = self.resolution.index_of(func)?;
        let decl = Self::decl(self.program, func)?;
        if decl.kind().is_import() {
            return Err(CodegenError::Lowering(format!(
                "imported function `{}` cannot have a body",
                decl.name()
            )));
        }
        let slot = &mut self.bodies[index as usize];
        if slot.is_some() {
            return Err(CodegenError::Lowering(format!(
                "body of `{}` added twice",
                decl.name()
            )));
        }
        *slot = Some(body);
        Ok(())
    }

    /// Emit header and sections, then validate the result.
    pub fn finish(self) -> CodegenResult<Vec<u8>> {
        let types = self.emit_types()?;
        let imports = self.emit_imports()?;
        let functions = self.emit_functions()?;
        let exports = self.emit_exports()?;
        let code = self.emit_code()?;

        let mut module = Vec::new();
        module.extend_from_slice(&MAGIC);
        module.extend_from_slice(&VERSION);
        for (id, payload) in [
            (SECTION_TYPE, types),
            (SECTION_IMPORT, imports),
            (SECTION_FUNCTION, functions),
            (SECTION_EXPORT, exports),
            (SECTION_CODE, code),
        ] {
            debug!(section = id, bytes = payload.len(), "emitted section");
            write_section(&mut module, id, &payload);
        }

        wasmparser::validate(&module)
            .map_err(|e| CodegenError::ValidationFailed(format!("{e}")))?;

        debug!(bytes = module.len(), functions = self.resolution.len(), "module emitted");
        Ok(module)
    }

    // ── Type section ─────────────────────────────────────────────────────

    fn emit_types(&self) -> CodegenResult<Vec<u8>> {
        let mut entries = Vec::with_capacity(self.resolution.len());
        for &func in self.resolution.order() {
            let decl = Self::decl(self.program, func)?;
            let mut entry = vec![FUNC_TYPE_TAG];
            let params: Vec<[u8; 1]> = decl.params().iter().map(|p| [p.ty.wire_code()]).collect();
            write_vec(&mut entry, &params);
            write_vec(&mut entry, &result_types(decl.result()));
            entries.push(entry);
        }
        Ok(vector(&entries))
    }

    // ── Import section ───────────────────────────────────────────────────

    fn emit_imports(&self) -> CodegenResult<Vec<u8>> {
        let mut entries = Vec::new();
        for (index, &func) in self.resolution.order().iter().enumerate() {
            let decl = Self::decl(self.program, func)?;
            if !decl.kind().is_import() {
                continue;
            }
            let mut entry = Vec::new();
            write_name(&mut entry, IMPORT_MODULE);
            write_name(&mut entry, decl.name());
            entry.push(EXTERNAL_FUNC);
            // type index == function index
            write_u32(&mut entry, index as u32);
            entries.push(entry);
        }

        if let Some(limits) = &self.options.memory {
            let mut entry = Vec::new();
            write_name(&mut entry, IMPORT_MODULE);
            write_name(&mut entry, MEMORY_FIELD);
            entry.push(EXTERNAL_MEMORY);
            write_limits(&mut entry, limits);
            entries.push(entry);
        }

        Ok(vector(&entries))
    }

    // ── Function section ─────────────────────────────────────────────────

    fn emit_functions(&self) -> CodegenResult<Vec<u8>> {
        let mut type_indices = Vec::new();
        for (index, &func) in self.resolution.order().iter().enumerate() {
            if !Self::decl(self.program, func)?.kind().is_import() {
                let mut entry = Vec::new();
                write_u32(&mut entry, index as u32);
                type_indices.push(entry);
            }
        }
        Ok(vector(&type_indices))
    }

    // ── Export section ───────────────────────────────────────────────────

    fn emit_exports(&self) -> CodegenResult<Vec<u8>> {
        let mut entries = Vec::new();
        for (index, &func) in self.resolution.order().iter().enumerate() {
            let decl = Self::decl(self.program, func)?;
            if !matches!(decl.kind(), DeclKind::Exported) {
                continue;
            }
            let mut entry = Vec::new();
            write_name(&mut entry, decl.name());
            entry.push(EXTERNAL_FUNC);
            write_u32(&mut entry, index as u32);
            entries.push(entry);
        }
        Ok(vector(&entries))
    }

    // ── Code section ─────────────────────────────────────────────────────

    fn emit_code(&self) -> CodegenResult<Vec<u8>> {
        let mut bodies = Vec::new();
        for (index, &func) in self.resolution.order().iter().enumerate() {
            let decl = Self::decl(self.program, func)?;
            if decl.kind().is_import() {
                continue;
            }
            let body = self.bodies[index].as_ref().ok_or_else(|| {
                CodegenError::Lowering(format!("function `{}` has no body", decl.name()))
            })?;
            bodies.push(body.as_slice());
        }
        Ok(vector(&bodies))
    }

    // ── Helpers ──────────────────────────────────────────────────────────

    fn decl(program: &'a Program, func: FuncRef) -> CodegenResult<&'a FunctionDecl> {
        program.get(func).ok_or_else(|| {
            CodegenError::Resolution(format!(
                "function #{} is not registered in this program",
                func.index()
            ))
        })
    }
}

/// Result vector of a function type: empty for `Void`, one entry otherwise.
fn result_types(result: ValueType) -> Vec<[u8; 1]> {
    match result {
        ValueType::Void => Vec::new(),
        ty => vec![[ty.wire_code()]],
    }
}

fn write_limits(sink: &mut Vec<u8>, limits: &MemoryLimits) {
    match limits.maximum {
        Some(max) => {
            sink.push(LIMITS_MIN_MAX);
            write_u32(sink, limits.minimum);
            write_u32(sink, max);
        }
        None => {
            sink.push(LIMITS_MIN);
            write_u32(sink, limits.minimum);
        }
    }
}

fn vector<T: AsRef<[u8]>>(items: &[T]) -> Vec<u8> {
    let mut out = Vec::new();
    write_vec(&mut out, items);
    out
}
