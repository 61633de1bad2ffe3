//! Binary-format constants: header, section ids, opcodes.

// ── Header ───────────────────────────────────────────────────────────────────

/// `\0asm`
pub const MAGIC: [u8; 4] = [0x00, 0x61, 0x73, 0x6D];
pub const VERSION: [u8; 4] = [0x01, 0x00, 0x00, 0x00];

// ── Section ids ──────────────────────────────────────────────────────────────
// Only these five are ever emitted, always in this order.

pub const SECTION_TYPE: u8 = 1;
pub const SECTION_IMPORT: u8 = 2;
pub const SECTION_FUNCTION: u8 = 3;
pub const SECTION_EXPORT: u8 = 7;
pub const SECTION_CODE: u8 = 10;

// ── Type / import / export encodings ─────────────────────────────────────────

/// Leading byte of a function type entry.
pub const FUNC_TYPE_TAG: u8 = 0x60;

/// Import/export descriptor: function.
pub const EXTERNAL_FUNC: u8 = 0x00;
/// Import/export descriptor: linear memory.
pub const EXTERNAL_MEMORY: u8 = 0x02;

/// Limits with a minimum only.
pub const LIMITS_MIN: u8 = 0x00;
/// Limits with both minimum and maximum.
pub const LIMITS_MIN_MAX: u8 = 0x01;

/// Module name for every import.
pub const IMPORT_MODULE: &str = "env";
/// Field name of the shared linear memory import.
pub const MEMORY_FIELD: &str = "memory";

// ── Memory ───────────────────────────────────────────────────────────────────

/// Page count of the shared memory when enabled with default limits.
pub const SHARED_MEMORY_PAGES: u32 = 10;
/// Upper bound on 32-bit linear memory (4 GiB in 64 KiB pages).
pub const MAX_MEMORY_PAGES: u32 = 65_536;

// ── Opcodes ──────────────────────────────────────────────────────────────────

pub const OP_BLOCK: u8 = 0x02;
pub const OP_LOOP: u8 = 0x03;
pub const OP_END: u8 = 0x0B;
pub const OP_BR: u8 = 0x0C;
pub const OP_BR_IF: u8 = 0x0D;
pub const OP_RETURN: u8 = 0x0F;
pub const OP_CALL: u8 = 0x10;
pub const OP_DROP: u8 = 0x1A;
pub const OP_LOCAL_GET: u8 = 0x20;
pub const OP_LOCAL_SET: u8 = 0x21;
pub const OP_I32_CONST: u8 = 0x41;
pub const OP_F32_CONST: u8 = 0x43;
pub const OP_I32_ADD: u8 = 0x6A;
pub const OP_I32_MUL: u8 = 0x6C;
pub const OP_F32_ADD: u8 = 0x92;
pub const OP_F32_MUL: u8 = 0x94;
