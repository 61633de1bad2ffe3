//! Value types and parameters.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The value types the emitter can produce.
///
/// `Void` is only meaningful as a function result; it has a wire code so
/// that block signatures can name it, but no local or parameter may use it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    Void,
    Int32,
    Float32,
}

impl ValueType {
    /// The single-byte encoding of this type in the binary format.
    pub const fn wire_code(self) -> u8 {
        match self {
            ValueType::Void => 0x40,
            ValueType::Int32 => 0x7F,
            ValueType::Float32 => 0x7D,
        }
    }

    /// Whether a local slot can hold a value of this type.
    pub const fn is_storable(self) -> bool {
        !matches!(self, ValueType::Void)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueType::Void => "void",
            ValueType::Int32 => "i32",
            ValueType::Float32 => "f32",
        };
        f.write_str(name)
    }
}

/// A function parameter.
///
/// The name only surfaces in diagnostics and in the generated host wrapper;
/// it is never written to the binary module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Param {
    pub ty: ValueType,
    pub name: String,
}

impl Param {
    pub fn new(ty: ValueType, name: impl Into<String>) -> Self {
        Self {
            ty,
            name: name.into(),
        }
    }

    pub fn int32(name: impl Into<String>) -> Self {
        Self::new(ValueType::Int32, name)
    }

    pub fn float32(name: impl Into<String>) -> Self {
        Self::new(ValueType::Float32, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_codes_match_binary_format() {
        assert_eq!(ValueType::Void.wire_code(), 0x40);
        assert_eq!(ValueType::Int32.wire_code(), 0x7F);
        assert_eq!(ValueType::Float32.wire_code(), 0x7D);
    }

    #[test]
    fn void_is_not_storable() {
        assert!(!ValueType::Void.is_storable());
        assert!(ValueType::Int32.is_storable());
        assert!(ValueType::Float32.is_storable());
    }
}
