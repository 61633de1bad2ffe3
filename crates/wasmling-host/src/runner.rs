//! In-process execution of emitted modules via `wasmi`.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, trace};
use wasmi::core::F32;
use wasmi::core::ValType;
use wasmi::{Engine, ExternType, Instance, Linker, Memory, Module, Store, Val};

use crate::error::{HostError, HostResult};

/// A value crossing the host boundary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HostValue {
    I32(i32),
    F32(f32),
}

impl HostValue {
    fn from_val(val: &Val) -> Option<Self> {
        match val {
            Val::I32(v) => Some(HostValue::I32(*v)),
            Val::F32(v) => Some(HostValue::F32(v.to_float())),
            _ => None,
        }
    }

    fn to_val(self) -> Val {
        match self {
            HostValue::I32(v) => Val::I32(v),
            HostValue::F32(v) => Val::F32(F32::from_float(v)),
        }
    }
}

/// A host function: receives the call's arguments, returns its result
/// (`None` for functions without one).
pub type HostFn = Arc<dyn Fn(&[HostValue]) -> Option<HostValue> + Send + Sync>;

/// Host functions by import name.
#[derive(Clone, Default)]
pub struct HostImports {
    funcs: BTreeMap<String, HostFn>,
}

impl HostImports {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provide the implementation of `env.<name>`.
    pub fn define(
        &mut self,
        name: impl Into<String>,
        func: impl Fn(&[HostValue]) -> Option<HostValue> + Send + Sync + 'static,
    ) -> &mut Self {
        self.funcs.insert(name.into(), Arc::new(func));
        self
    }

    fn get(&self, name: &str) -> Option<&HostFn> {
        self.funcs.get(name)
    }
}

/// An instantiated module.
pub struct Runner {
    store: Store<()>,
    instance: Instance,
    memory: Option<Memory>,
}

impl Runner {
    /// Parse, link and instantiate `wasm`.
    ///
    /// Function imports are bound to `imports` by name; a memory import is
    /// created with the limits the module declares.
    pub fn new(wasm: &[u8], imports: &HostImports) -> HostResult<Self> {
        let engine = Engine::default();
        let module =
            Module::new(&engine, wasm).map_err(|e| HostError::Instantiation(e.to_string()))?;
        let mut store = Store::new(&engine, ());
        let mut linker = <Linker<()>>::new(&engine);
        let mut memory = None;

        for import in module.imports() {
            let (module_name, name) = (import.module(), import.name());
            match import.ty() {
                ExternType::Func(ty) => {
                    let host = imports
                        .get(name)
                        .cloned()
                        .ok_or_else(|| HostError::MissingImport(name.to_string()))?;
                    trace!(import = name, "binding host function");
                    let label = name.to_string();
                    linker
                        .func_new(module_name, name, ty.clone(), move |_caller, params, results| {
                            call_host(&label, &host, params, results)
                        })
                        .map_err(|e| HostError::Instantiation(e.to_string()))?;
                }
                ExternType::Memory(ty) => {
                    let mem = Memory::new(&mut store, ty.clone())
                        .map_err(|e| HostError::Instantiation(e.to_string()))?;
                    linker
                        .define(module_name, name, mem)
                        .map_err(|e| HostError::Instantiation(e.to_string()))?;
                    memory = Some(mem);
                }
                other => {
                    return Err(HostError::UnsupportedImport(format!(
                        "{module_name}.{name}: {other:?}"
                    )))
                }
            }
        }

        let instance = linker
            .instantiate(&mut store, &module)
            .map_err(|e| HostError::Instantiation(e.to_string()))?
            .start(&mut store)
            .map_err(|e| HostError::Instantiation(e.to_string()))?;

        debug!(has_memory = memory.is_some(), "module instantiated");
        Ok(Self {
            store,
            instance,
            memory,
        })
    }

    /// Call the export `name` with `args`.  Returns its result, `None` for
    /// functions without one.
    pub fn call(&mut self, name: &str, args: &[HostValue]) -> HostResult<Option<HostValue>> {
        let func = self
            .instance
            .get_func(&self.store, name)
            .ok_or_else(|| HostError::MissingExport(name.to_string()))?;

        let ty = func.ty(&self.store);
        let params: Vec<Val> = args.iter().map(|a| a.to_val()).collect();
        let mut results: Vec<Val> = ty.results().iter().map(|t| zero(*t)).collect();

        func.call(&mut self.store, &params, &mut results)
            .map_err(|e| HostError::Trap {
                name: name.to_string(),
                message: e.to_string(),
            })?;

        Ok(results.first().and_then(HostValue::from_val))
    }

    /// Whether the module imported a linear memory.
    pub fn has_memory(&self) -> bool {
        self.memory.is_some()
    }

    /// Current size of the imported memory in bytes.
    pub fn memory_len(&self) -> Option<usize> {
        self.memory.map(|m| m.data(&self.store).len())
    }
}

fn call_host(
    name: &str,
    host: &HostFn,
    params: &[Val],
    results: &mut [Val],
) -> Result<(), wasmi::Error> {
    let args = params
        .iter()
        .map(HostValue::from_val)
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| wasmi::Error::new(format!("unsupported argument type for `{name}`")))?;

    match (host(&args), results.first_mut()) {
        (Some(value), Some(slot)) => *slot = value.to_val(),
        (None, None) => {}
        (Some(_), None) => {
            return Err(wasmi::Error::new(format!(
                "host function `{name}` returned a value but has no result"
            )))
        }
        (None, Some(_)) => {
            return Err(wasmi::Error::new(format!(
                "host function `{name}` returned nothing but expects a result"
            )))
        }
    }
    Ok(())
}

fn zero(ty: ValType) -> Val {
    match ty {
        ValType::F32 => Val::F32(F32::from_float(0.0)),
        ValType::I64 => Val::I64(0),
        ValType::F64 => Val::F64(0f64.into()),
        _ => Val::I32(0),
    }
}
