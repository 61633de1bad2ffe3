//! JavaScript host wrapper generation.
//!
//! The wrapper is an ES module:
//!
//! ```text
//! const bytes = new Uint8Array([...]);
//! const memory = new WebAssembly.Memory({ ... });   // only with a memory import
//! const env = { "PrintI": function (i) { <host code> }, ... };
//! export async function instantiate() { ... }
//! export async function run() { ... }               // only with an entry export
//! ```
//!
//! Host code bodies are pasted verbatim, byte for byte; they are the
//! caller's contract with the JavaScript side and are not checked here.

use std::collections::BTreeSet;
use std::fmt::{self, Write as _};

use wasmling_codegen::types::MEMORY_FIELD;
use wasmling_codegen::{MemoryLimits, ModuleMap, ModuleMapEntry};

use crate::error::{HostError, HostResult};

/// Words that cannot name a parameter in strict-mode (module) code.
const RESERVED: &[&str] = &[
    "arguments", "await", "break", "case", "catch", "class", "const", "continue", "debugger",
    "default", "delete", "do", "else", "enum", "eval", "export", "extends", "false", "finally",
    "for", "function", "if", "implements", "import", "in", "instanceof", "interface", "let",
    "new", "null", "package", "private", "protected", "public", "return", "static", "super",
    "switch", "this", "throw", "true", "try", "typeof", "var", "void", "while", "with", "yield",
];

/// Renders the JavaScript shim for one emitted module.
#[derive(Debug, Clone)]
pub struct HostWrapper<'a> {
    wasm: &'a [u8],
    map: &'a ModuleMap,
    entry: Option<String>,
}

impl<'a> HostWrapper<'a> {
    pub fn new(wasm: &'a [u8], map: &'a ModuleMap) -> Self {
        Self {
            wasm,
            map,
            entry: None,
        }
    }

    /// Also emit `run()`, which instantiates the module and calls the
    /// zero-argument export `name`.
    pub fn entry(mut self, name: impl Into<String>) -> Self {
        self.entry = Some(name.into());
        self
    }

    pub fn render(&self) -> HostResult<String> {
        self.check_imports()?;

        let bytes = serde_json::to_string(self.wasm)?;
        let entry = match &self.entry {
            Some(entry) => {
                let export = self
                    .map
                    .find_export(entry)
                    .ok_or_else(|| HostError::MissingExport(entry.clone()))?;
                Some(serde_json::to_string(&export.name)?)
            }
            None => None,
        };
        let imports = self
            .map
            .imports()
            .map(|import| Ok((serde_json::to_string(&import.name)?, import)))
            .collect::<HostResult<Vec<_>>>()?;

        let mut out = String::new();
        self.write_module(&mut out, &bytes, &imports, entry.as_deref())?;
        Ok(out)
    }

    /// Import keys share one object literal with `memory`.
    fn check_imports(&self) -> HostResult<()> {
        let mut seen = BTreeSet::new();
        for import in self.map.imports() {
            let clashes_with_memory = self.map.memory.is_some() && import.name == MEMORY_FIELD;
            if clashes_with_memory || !seen.insert(import.name.as_str()) {
                return Err(HostError::ConflictingImport(import.name.clone()));
            }
        }
        Ok(())
    }

    fn write_module(
        &self,
        out: &mut String,
        bytes: &str,
        imports: &[(String, &ModuleMapEntry)],
        entry: Option<&str>,
    ) -> fmt::Result {
        out.push_str("// Generated by wasmling. Do not edit.\n\n");
        writeln!(out, "const bytes = new Uint8Array({bytes});")?;
        if let Some(limits) = &self.map.memory {
            writeln!(
                out,
                "const memory = new WebAssembly.Memory({});",
                memory_descriptor(limits)
            )?;
        }

        out.push_str("\nconst env = {\n");
        if self.map.memory.is_some() {
            out.push_str("  memory,\n");
        }
        for (key, import) in imports {
            write_import(out, key, import)?;
        }
        out.push_str("};\n\n");

        out.push_str("export async function instantiate() {\n");
        out.push_str("  const { instance } = await WebAssembly.instantiate(bytes, { env });\n");
        out.push_str("  return instance;\n");
        out.push_str("}\n");

        if let Some(name) = entry {
            out.push_str("\nexport async function run() {\n");
            out.push_str("  const instance = await instantiate();\n");
            writeln!(out, "  return instance.exports[{name}]();")?;
            out.push_str("}\n");
        }
        Ok(())
    }
}

fn write_import(out: &mut String, key: &str, import: &ModuleMapEntry) -> fmt::Result {
    let names: Vec<&str> = import.params.iter().map(|p| p.name.as_str()).collect();
    writeln!(out, "  {key}: function ({}) {{", param_list(&names).join(", "))?;
    let body = import.host_code.as_deref().unwrap_or_default();
    out.push_str(body);
    if !body.is_empty() && !body.ends_with('\n') {
        out.push('\n');
    }
    out.push_str("  },\n");
    Ok(())
}

/// Parameter names usable in the shim; anything unusable or repeated
/// becomes `p{i}`.
fn param_list(names: &[&str]) -> Vec<String> {
    let mut taken: BTreeSet<String> = BTreeSet::new();
    let mut params = Vec::with_capacity(names.len());
    for (i, name) in names.iter().enumerate() {
        let mut param = if is_js_identifier(name) && !taken.contains(*name) {
            name.to_string()
        } else {
            format!("p{i}")
        };
        while taken.contains(&param) {
            param.push('_');
        }
        taken.insert(param.clone());
        params.push(param);
    }
    params
}

fn memory_descriptor(limits: &MemoryLimits) -> String {
    match limits.maximum {
        Some(max) => format!("{{ initial: {}, maximum: {max} }}", limits.minimum),
        None => format!("{{ initial: {} }}", limits.minimum),
    }
}

fn is_js_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$') && !RESERVED.contains(&name)
}
