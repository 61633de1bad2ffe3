//! Emission options.

use serde::{Deserialize, Serialize};

use crate::error::{CodegenError, CodegenResult};
use crate::types::{MAX_MEMORY_PAGES, SHARED_MEMORY_PAGES};

/// Page limits of the imported linear memory (64 KiB pages).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryLimits {
    pub minimum: u32,
    /// `None` lets the memory grow up to the format's limit.
    pub maximum: Option<u32>,
}

impl MemoryLimits {
    /// A memory of exactly `pages` pages that can never grow.
    pub const fn fixed(pages: u32) -> Self {
        Self {
            minimum: pages,
            maximum: Some(pages),
        }
    }
}

/// Knobs for [`compile`](crate::compile).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmitOptions {
    /// Import a linear memory as `env.memory` with these limits.
    pub memory: Option<MemoryLimits>,
}

impl EmitOptions {
    /// Import a shared memory of 10 pages, growth forbidden.
    pub fn with_shared_memory() -> Self {
        Self {
            memory: Some(MemoryLimits::fixed(SHARED_MEMORY_PAGES)),
        }
    }

    /// Parse options from JSON, e.g. `{"memory":{"minimum":1,"maximum":4}}`.
    pub fn from_json(json: &str) -> CodegenResult<Self> {
        let options: Self = serde_json::from_str(json)
            .map_err(|e| CodegenError::Configuration(format!("invalid emit options: {e}")))?;
        options.validate()?;
        Ok(options)
    }

    /// Check the options describe something the format can encode.
    pub fn validate(&self) -> CodegenResult<()> {
        if let Some(limits) = &self.memory {
            if limits.minimum > MAX_MEMORY_PAGES {
                return Err(CodegenError::Configuration(format!(
                    "memory minimum of {} pages exceeds {MAX_MEMORY_PAGES}",
                    limits.minimum
                )));
            }
            if let Some(max) = limits.maximum {
                if max > MAX_MEMORY_PAGES {
                    return Err(CodegenError::Configuration(format!(
                        "memory maximum of {max} pages exceeds {MAX_MEMORY_PAGES}"
                    )));
                }
                if max < limits.minimum {
                    return Err(CodegenError::Configuration(format!(
                        "memory maximum {max} is below minimum {}",
                        limits.minimum
                    )));
                }
            }
        }
        Ok(())
    }
}
