//! Integration tests for the Wasmling module emitter.
//!
//! Tests validate:
//! - Golden bytes for the PrintI/Main sample
//! - Section layout (imports, exports, memory, type entries)
//! - Function index assignment across interleaved declarations
//! - Local slot layout in the encoded bodies
//! - Deterministic output (same input → same bytes)
//! - Execution of emitted modules via wasmi

use wasmling_codegen::{compile, compile_with_module_map, CodegenError, EmitOptions, FuncKind};
use wasmling_ir::ast::{Expr, Stmt};
use wasmling_ir::{IrError, Param, Program, ValueType};
use wasmparser::{ExternalKind, Parser as WasmParser, Payload, TypeRef};

// ══════════════════════════════════════════════════════════════════════════════
// Helpers
// ══════════════════════════════════════════════════════════════════════════════

/// `PrintI(i: Int32): Void` imported, `Main(): Int32` exported with body
/// `{ a = 4 * 6; PrintI(a); return a + 6 }`.
fn print_main_program() -> Program {
    let mut p = Program::new();
    let print = p
        .import(
            "PrintI",
            vec![Param::int32("i")],
            ValueType::Void,
            "console.log(i);",
        )
        .unwrap();
    let main = p.export("Main", vec![], ValueType::Int32).unwrap();
    let a = p.local(main, ValueType::Int32).unwrap();
    p.define(
        main,
        Stmt::block(vec![
            Stmt::assign(a, Expr::mul(Expr::int(4), Expr::int(6))),
            Stmt::expr(Expr::call(print, vec![Expr::var(a)])),
            Stmt::ret(Expr::add(Expr::var(a), Expr::int(6))),
        ]),
    )
    .unwrap();
    p
}

fn compile_program(program: &Program) -> Vec<u8> {
    compile(program, &EmitOptions::default()).unwrap_or_else(|e| panic!("codegen failed: {e}"))
}

fn get_exports(wasm: &[u8]) -> Vec<(String, ExternalKind, u32)> {
    let mut exports = Vec::new();
    for payload in WasmParser::new(0).parse_all(wasm) {
        if let Ok(Payload::ExportSection(reader)) = payload {
            for export in reader {
                let exp = export.expect("valid export");
                exports.push((exp.name.to_string(), exp.kind, exp.index));
            }
        }
    }
    exports
}

fn get_imports(wasm: &[u8]) -> Vec<(String, String, TypeRef)> {
    let mut imports = Vec::new();
    for payload in WasmParser::new(0).parse_all(wasm) {
        if let Ok(Payload::ImportSection(reader)) = payload {
            for import in reader {
                let imp = import.expect("valid import");
                imports.push((imp.module.to_string(), imp.name.to_string(), imp.ty));
            }
        }
    }
    imports
}

fn section_ids(wasm: &[u8]) -> Vec<u8> {
    let mut ids = Vec::new();
    for payload in WasmParser::new(0).parse_all(wasm) {
        match payload.expect("valid payload") {
            Payload::TypeSection(_) => ids.push(1),
            Payload::ImportSection(_) => ids.push(2),
            Payload::FunctionSection(_) => ids.push(3),
            Payload::ExportSection(_) => ids.push(7),
            Payload::CodeSectionStart { .. } => ids.push(10),
            Payload::Version { .. } | Payload::CodeSectionEntry(_) | Payload::End(_) => {}
            other => panic!("unexpected payload {other:?}"),
        }
    }
    ids
}

// ══════════════════════════════════════════════════════════════════════════════
// Golden output
// ══════════════════════════════════════════════════════════════════════════════

#[rustfmt::skip]
const PRINT_MAIN_GOLDEN: &[u8] = &[
    0x00, 0x61, 0x73, 0x6D, 0x01, 0x00, 0x00, 0x00,
    // type: (i32) -> (), () -> i32
    0x01, 0x09, 0x02, 0x60, 0x01, 0x7F, 0x00, 0x60, 0x00, 0x01, 0x7F,
    // import: env.PrintI, func type 0
    0x02, 0x0E, 0x01, 0x03, b'e', b'n', b'v', 0x06, b'P', b'r', b'i', b'n', b't', b'I', 0x00, 0x00,
    // function: Main uses type 1
    0x03, 0x02, 0x01, 0x01,
    // export: "Main" func 1
    0x07, 0x08, 0x01, 0x04, b'M', b'a', b'i', b'n', 0x00, 0x01,
    // code
    0x0A, 0x17, 0x01, 0x15,
    0x01, 0x01, 0x7F, // 1 x i32
    0x41, 0x04,       // i32.const 4
    0x41, 0x06,       // i32.const 6
    0x6C,             // i32.mul
    0x21, 0x00,       // local.set a
    0x20, 0x00,       // local.get a
    0x10, 0x00,       // call PrintI
    0x20, 0x00,       // local.get a
    0x41, 0x06,       // i32.const 6
    0x6A,             // i32.add
    0x0F,             // return
    0x0B,             // end
];

#[test]
fn print_main_matches_golden_bytes() {
    assert_eq!(compile_program(&print_main_program()), PRINT_MAIN_GOLDEN);
}

#[test]
fn print_main_matches_wasm_encoder() {
    use wasm_encoder::{
        CodeSection, EntityType, ExportKind, ExportSection, Function, FunctionSection,
        ImportSection, Instruction, Module, TypeSection, ValType,
    };

    let mut module = Module::new();

    let mut types = TypeSection::new();
    types.ty().function(vec![ValType::I32], vec![]);
    types.ty().function(vec![], vec![ValType::I32]);
    module.section(&types);

    let mut imports = ImportSection::new();
    imports.import("env", "PrintI", EntityType::Function(0));
    module.section(&imports);

    let mut funcs = FunctionSection::new();
    funcs.function(1);
    module.section(&funcs);

    let mut exports = ExportSection::new();
    exports.export("Main", ExportKind::Func, 1);
    module.section(&exports);

    let mut code = CodeSection::new();
    let mut f = Function::new(vec![(1, ValType::I32)]);
    f.instruction(&Instruction::I32Const(4));
    f.instruction(&Instruction::I32Const(6));
    f.instruction(&Instruction::I32Mul);
    f.instruction(&Instruction::LocalSet(0));
    f.instruction(&Instruction::LocalGet(0));
    f.instruction(&Instruction::Call(0));
    f.instruction(&Instruction::LocalGet(0));
    f.instruction(&Instruction::I32Const(6));
    f.instruction(&Instruction::I32Add);
    f.instruction(&Instruction::Return);
    f.instruction(&Instruction::End);
    code.function(&f);
    module.section(&code);

    assert_eq!(compile_program(&print_main_program()), module.finish());
}

// ══════════════════════════════════════════════════════════════════════════════
// Module structure
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn sections_are_exactly_the_five_in_order() {
    let wasm = compile_program(&print_main_program());
    assert_eq!(section_ids(&wasm), vec![1, 2, 3, 7, 10]);

    let wasm = compile(&print_main_program(), &EmitOptions::with_shared_memory()).unwrap();
    assert_eq!(section_ids(&wasm), vec![1, 2, 3, 7, 10]);
}

#[test]
fn memory_import_when_enabled() {
    let wasm = compile(&print_main_program(), &EmitOptions::with_shared_memory()).unwrap();
    let imports = get_imports(&wasm);
    assert_eq!(imports.len(), 2);
    let (module, name, ty) = &imports[1];
    assert_eq!((module.as_str(), name.as_str()), ("env", "memory"));
    match ty {
        TypeRef::Memory(mem) => {
            assert_eq!(mem.initial, 10);
            assert_eq!(mem.maximum, Some(10));
        }
        other => panic!("expected memory import, got {other:?}"),
    }
}

#[test]
fn memory_import_bytes() {
    let wasm = compile(&print_main_program(), &EmitOptions::with_shared_memory()).unwrap();
    let entry: &[u8] = &[
        0x03, b'e', b'n', b'v', 0x06, b'm', b'e', b'm', b'o', b'r', b'y', 0x02, 0x01, 0x0A, 0x0A,
    ];
    assert!(wasm.windows(entry.len()).any(|w| w == entry));
}

#[test]
fn no_memory_import_when_disabled() {
    let wasm = compile_program(&print_main_program());
    let imports = get_imports(&wasm);
    assert_eq!(imports.len(), 1);
    assert!(imports
        .iter()
        .all(|(_, _, ty)| matches!(ty, TypeRef::Func(_))));
}

#[test]
fn function_indices_group_by_kind() {
    // 2 imports, 3 internal, 2 exported, declared interleaved
    let mut p = Program::new();
    let mut exported = Vec::new();
    let mut internal = Vec::new();
    for round in 0..3 {
        if round < 2 {
            let e = p
                .export(format!("E{round}"), vec![], ValueType::Int32)
                .unwrap();
            exported.push(e);
        }
        internal.push(p.internal(format!("N{round}"), vec![], ValueType::Int32).unwrap());
        if round < 2 {
            p.import(format!("I{round}"), vec![], ValueType::Int32, "return 0;")
                .unwrap();
        }
    }
    for (i, f) in internal.iter().enumerate() {
        p.define(*f, Stmt::ret(Expr::int(i as i32))).unwrap();
    }
    for f in &exported {
        p.define(*f, Stmt::ret(Expr::call(internal[0], vec![]))).unwrap();
    }

    let (wasm, map) = compile_with_module_map(&p, &EmitOptions::default()).unwrap();

    let kinds: Vec<FuncKind> = map.functions.iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![
            FuncKind::Import,
            FuncKind::Import,
            FuncKind::Internal,
            FuncKind::Internal,
            FuncKind::Internal,
            FuncKind::Export,
            FuncKind::Export,
        ]
    );
    let exports = get_exports(&wasm);
    assert_eq!(
        exports,
        vec![
            ("E0".to_string(), ExternalKind::Func, 5),
            ("E1".to_string(), ExternalKind::Func, 6),
        ]
    );
    // internal N0 is index 2 and that's what the exported bodies call
    let call_n0: &[u8] = &[0x10, 0x02, 0x0F, 0x0B];
    assert!(wasm.windows(call_n0.len()).any(|w| w == call_n0));
}

#[test]
fn interleaved_locals_get_grouped_slots() {
    let mut p = Program::new();
    let f = p
        .export("Mix", vec![Param::float32("scale")], ValueType::Float32)
        .unwrap();
    let scale = p.param(f, 0).unwrap();
    let fx = p.local(f, ValueType::Float32).unwrap();
    let ix = p.local(f, ValueType::Int32).unwrap();
    let fy = p.local(f, ValueType::Float32).unwrap();
    let iy = p.local(f, ValueType::Int32).unwrap();
    p.define(
        f,
        Stmt::block(vec![
            Stmt::assign(fx, Expr::float(2.0)),
            Stmt::assign(ix, Expr::int(1)),
            Stmt::assign(fy, Expr::mul(Expr::var(fx), Expr::var(scale))),
            Stmt::assign(iy, Expr::var(ix)),
            Stmt::increment(iy),
            Stmt::ret(Expr::var(fy)),
        ]),
    )
    .unwrap();

    let wasm = compile_program(&p);
    let mut locals = Vec::new();
    for payload in WasmParser::new(0).parse_all(&wasm) {
        if let Ok(Payload::CodeSectionEntry(body)) = payload {
            for group in body.get_locals_reader().unwrap() {
                locals.push(group.unwrap());
            }
        }
    }
    assert_eq!(
        locals,
        vec![
            (2, wasmparser::ValType::I32),
            (2, wasmparser::ValType::F32)
        ]
    );

    // param = 0, ix = 1, iy = 2, fx = 3, fy = 4
    let store_fx: &[u8] = &[0x43, 0x00, 0x00, 0x00, 0x40, 0x21, 0x03];
    let store_ix: &[u8] = &[0x41, 0x01, 0x21, 0x01];
    assert!(wasm.windows(store_fx.len()).any(|w| w == store_fx));
    assert!(wasm.windows(store_ix.len()).any(|w| w == store_ix));
}

// ══════════════════════════════════════════════════════════════════════════════
// Determinism
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn deterministic_output_100_iterations() {
    let reference = compile_program(&print_main_program());
    for i in 0..100 {
        let wasm = compile_program(&print_main_program());
        assert_eq!(wasm, reference, "iteration {i} produced different bytes");
    }
}

#[test]
fn deterministic_output_with_many_locals() {
    let build = || {
        let mut p = Program::new();
        let f = p.export("F", vec![], ValueType::Int32).unwrap();
        let mut stmts = Vec::new();
        let mut last = None;
        for i in 0..40 {
            let ty = if i % 3 == 0 {
                ValueType::Float32
            } else {
                ValueType::Int32
            };
            let l = p.local(f, ty).unwrap();
            let value = match ty {
                ValueType::Float32 => Expr::float(i as f32),
                _ => Expr::int(i),
            };
            stmts.push(Stmt::assign(l, value));
            if ty == ValueType::Int32 {
                last = Some(l);
            }
        }
        stmts.push(Stmt::ret(Expr::var(last.unwrap())));
        p.define(f, Stmt::block(stmts)).unwrap();
        p
    };
    assert_eq!(compile_program(&build()), compile_program(&build()));
}

// ══════════════════════════════════════════════════════════════════════════════
// Errors
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn foreign_local_aborts_emission() {
    let mut p = Program::new();
    let other = p.internal("Other", vec![], ValueType::Void).unwrap();
    let stolen = p.local(other, ValueType::Int32).unwrap();
    p.define(other, Stmt::block(vec![])).unwrap();
    let main = p.export("Main", vec![], ValueType::Int32).unwrap();
    p.define(main, Stmt::ret(Expr::var(stolen))).unwrap();

    let err = compile(&p, &EmitOptions::default()).unwrap_err();
    assert!(matches!(err, CodegenError::Lowering(_)));
    assert!(err.to_string().contains("`Other`"));
    assert!(err.to_string().contains("`Main`"));
}

#[test]
fn call_into_another_program_aborts_emission() {
    let mut lib = Program::new();
    lib.export("A", vec![], ValueType::Void).unwrap();
    let foreign = lib.export("B", vec![], ValueType::Void).unwrap();

    // `Other` sits at the same arena index as `B`
    let mut p = Program::new();
    let main = p.export("Main", vec![], ValueType::Void).unwrap();
    let other = p.internal("Other", vec![], ValueType::Void).unwrap();
    assert_eq!(other.index(), foreign.index());
    p.define(other, Stmt::block(vec![])).unwrap();
    p.define(main, Stmt::expr(Expr::call(foreign, vec![]))).unwrap();

    let err = compile(&p, &EmitOptions::default()).unwrap_err();
    assert!(matches!(err, CodegenError::Resolution(_)));
}

#[test]
fn local_from_another_program_aborts_emission() {
    let mut lib = Program::new();
    let lib_main = lib.export("Main", vec![], ValueType::Int32).unwrap();
    let foreign = lib.local(lib_main, ValueType::Int32).unwrap();

    // same owner index and same local index as `foreign`
    let mut p = Program::new();
    let main = p.export("Main", vec![], ValueType::Int32).unwrap();
    let own = p.local(main, ValueType::Int32).unwrap();
    assert_eq!(own.owner.index(), foreign.owner.index());
    assert_eq!(own.kind, foreign.kind);
    p.define(
        main,
        Stmt::block(vec![
            Stmt::assign(own, Expr::int(1)),
            Stmt::ret(Expr::var(foreign)),
        ]),
    )
    .unwrap();

    let err = compile(&p, &EmitOptions::default()).unwrap_err();
    assert!(matches!(err, CodegenError::Lowering(_)));
    assert!(err.to_string().contains("another program"));
}

#[test]
fn resolution_of_another_program_is_rejected() {
    use wasmling_codegen::{resolve, ModuleBuilder};

    let p = print_main_program();
    let twin = print_main_program();
    let resolution = resolve(&twin).unwrap();
    let options = EmitOptions::default();
    let err = ModuleBuilder::new(&p, &resolution, &options).err().unwrap();
    assert!(matches!(err, CodegenError::Resolution(_)));
}

#[test]
fn import_named_memory_conflicts_with_shared_memory() {
    let mut p = Program::new();
    p.import("memory", vec![], ValueType::Void, "").unwrap();
    let main = p.export("Main", vec![], ValueType::Void).unwrap();
    p.define(main, Stmt::block(vec![])).unwrap();

    // fine without a memory import
    assert!(compile(&p, &EmitOptions::default()).is_ok());

    let err = compile(&p, &EmitOptions::with_shared_memory()).unwrap_err();
    assert!(matches!(err, CodegenError::Configuration(_)));
    assert!(err.to_string().contains("memory"));
}

#[test]
fn duplicate_import_names_are_rejected() {
    let mut p = Program::new();
    p.import("PrintI", vec![Param::int32("i")], ValueType::Void, "console.log(i);")
        .unwrap();
    let err = p
        .import("PrintI", vec![Param::float32("f")], ValueType::Void, "alert(f);")
        .unwrap_err();
    assert_eq!(err, IrError::DuplicateImport("PrintI".into()));
}

// ══════════════════════════════════════════════════════════════════════════════
// Execution
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn print_main_executes() {
    let wasm = compile_program(&print_main_program());
    let engine = wasmi::Engine::default();
    let module = wasmi::Module::new(&engine, &wasm[..]).expect("failed to parse wasm module");
    let mut store = wasmi::Store::new(&engine, Vec::<i32>::new());
    let mut linker = <wasmi::Linker<Vec<i32>>>::new(&engine);
    linker
        .func_wrap(
            "env",
            "PrintI",
            |mut caller: wasmi::Caller<'_, Vec<i32>>, i: i32| {
                caller.data_mut().push(i);
            },
        )
        .expect("link PrintI");
    let instance = linker
        .instantiate(&mut store, &module)
        .expect("instantiation failed")
        .start(&mut store)
        .expect("start failed");

    let main = instance
        .get_typed_func::<(), i32>(&store, "Main")
        .expect("no Main export");
    assert_eq!(main.call(&mut store, ()).expect("Main trapped"), 30);
    assert_eq!(store.data(), &vec![24]);
}

#[test]
fn float_function_executes() {
    let mut p = Program::new();
    let f = p
        .export(
            "Scale",
            vec![Param::float32("x"), Param::float32("k")],
            ValueType::Float32,
        )
        .unwrap();
    let x = p.param(f, 0).unwrap();
    let k = p.param(f, 1).unwrap();
    let acc = p.local(f, ValueType::Float32).unwrap();
    p.define(
        f,
        Stmt::block(vec![
            Stmt::assign(acc, Expr::mul(Expr::var(x), Expr::var(k))),
            Stmt::increment(acc),
            Stmt::ret(Expr::var(acc)),
        ]),
    )
    .unwrap();

    let wasm = compile_program(&p);
    let engine = wasmi::Engine::default();
    let module = wasmi::Module::new(&engine, &wasm[..]).unwrap();
    let mut store = wasmi::Store::new(&engine, ());
    let linker = <wasmi::Linker<()>>::new(&engine);
    let instance = linker
        .instantiate(&mut store, &module)
        .unwrap()
        .start(&mut store)
        .unwrap();
    let scale = instance
        .get_typed_func::<(f32, f32), f32>(&store, "Scale")
        .unwrap();
    assert_eq!(scale.call(&mut store, (2.5, 4.0)).unwrap(), 11.0);
}
