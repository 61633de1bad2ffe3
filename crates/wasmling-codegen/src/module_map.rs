//! Module map: function index → declaration metadata.
//!
//! The binary module only carries indices and types.  The host wrapper also
//! needs names, parameter names and the host code of each import; the map
//! carries those alongside the emitted bytes and serializes to JSON.

use serde::{Deserialize, Serialize};
use wasmling_ir::{DeclKind, Param, Program, ValueType};

use crate::options::MemoryLimits;
use crate::resolve::Resolution;

/// Metadata for every function of an emitted module, in index order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModuleMap {
    pub functions: Vec<ModuleMapEntry>,
    /// Limits of the imported `env.memory`, if any.
    pub memory: Option<MemoryLimits>,
}

/// One function of the module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleMapEntry {
    /// Function index in the emitted module.
    pub index: u32,
    pub name: String,
    pub kind: FuncKind,
    pub params: Vec<Param>,
    pub result: ValueType,
    /// Host-side body text, imports only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_code: Option<String>,
}

/// Classification of a function for the host.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FuncKind {
    Import,
    Internal,
    Export,
}

impl From<&DeclKind> for FuncKind {
    fn from(kind: &DeclKind) -> Self {
        match kind {
            DeclKind::Imported { .. } => FuncKind::Import,
            DeclKind::Internal => FuncKind::Internal,
            DeclKind::Exported => FuncKind::Export,
        }
    }
}

impl ModuleMap {
    /// Build the map of a resolved program.
    pub fn new(program: &Program, resolution: &Resolution, memory: Option<MemoryLimits>) -> Self {
        let functions = resolution
            .order()
            .iter()
            .enumerate()
            .filter_map(|(index, &func)| {
                let decl = program.get(func)?;
                Some(ModuleMapEntry {
                    index: index as u32,
                    name: decl.name().to_string(),
                    kind: decl.kind().into(),
                    params: decl.params().to_vec(),
                    result: decl.result(),
                    host_code: decl.host_code().map(str::to_string),
                })
            })
            .collect();
        Self { functions, memory }
    }

    pub fn find_by_index(&self, index: u32) -> Option<&ModuleMapEntry> {
        self.functions.iter().find(|e| e.index == index)
    }

    /// Exported function named `name`.
    pub fn find_export(&self, name: &str) -> Option<&ModuleMapEntry> {
        self.functions
            .iter()
            .find(|e| e.kind == FuncKind::Export && e.name == name)
    }

    pub fn imports(&self) -> impl Iterator<Item = &ModuleMapEntry> {
        self.functions.iter().filter(|e| e.kind == FuncKind::Import)
    }

    /// Serialize to JSON bytes.
    pub fn to_json(&self) -> Vec<u8> {
        serde_json::to_vec(self).unwrap_or_default()
    }

    /// Deserialize from JSON bytes.
    pub fn from_json(data: &[u8]) -> Option<Self> {
        serde_json::from_slice(data).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::resolve;

    fn sample() -> ModuleMap {
        let mut p = Program::new();
        p.export("Main", vec![], ValueType::Int32).unwrap();
        p.import(
            "PrintI",
            vec![Param::int32("i")],
            ValueType::Void,
            "console.log(i);",
        )
        .unwrap();
        let r = resolve(&p).unwrap();
        ModuleMap::new(&p, &r, None)
    }

    #[test]
    fn entries_follow_index_order() {
        let map = sample();
        assert_eq!(map.functions.len(), 2);
        assert_eq!(map.functions[0].name, "PrintI");
        assert_eq!(map.functions[0].kind, FuncKind::Import);
        assert_eq!(map.functions[0].host_code.as_deref(), Some("console.log(i);"));
        assert_eq!(map.find_export("Main").map(|e| e.index), Some(1));
        assert!(map.find_by_index(2).is_none());
    }

    #[test]
    fn round_trip_json() {
        let map = sample();
        let back = ModuleMap::from_json(&map.to_json()).expect("parse failed");
        assert_eq!(back, map);
        assert_eq!(back.imports().count(), 1);
    }
}
