//! Binary primitives: LEB128 integers, vectors, names, floats, sections.
//!
//! Everything here is a pure append onto a `Vec<u8>` sink, so identical
//! input always yields identical bytes.

/// Append `value` as canonical (shortest form) unsigned LEB128.
pub fn write_u32(sink: &mut Vec<u8>, mut value: u32) {
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            sink.push(byte);
            return;
        }
        sink.push(byte | 0x80);
    }
}

/// Append `value` as signed LEB128.
///
/// Stops once the remaining bits are all copies of the sign bit carried in
/// bit 6 of the last chunk.
pub fn write_i32(sink: &mut Vec<u8>, mut value: i32) {
    loop {
        let byte = (value & 0x7F) as u8;
        // arithmetic shift keeps the sign
        value >>= 7;
        let sign_bit_set = byte & 0x40 != 0;
        if (value == 0 && !sign_bit_set) || (value == -1 && sign_bit_set) {
            sink.push(byte);
            return;
        }
        sink.push(byte | 0x80);
    }
}

/// Unsigned LEB128 encoding of `value`.
pub fn u32_leb128(value: u32) -> Vec<u8> {
    let mut out = Vec::with_capacity(5);
    write_u32(&mut out, value);
    out
}

/// Signed LEB128 encoding of `value`.
pub fn i32_leb128(value: i32) -> Vec<u8> {
    let mut out = Vec::with_capacity(5);
    write_i32(&mut out, value);
    out
}

/// Append a length-prefixed vector: element count, then each element's
/// bytes back to back.
pub fn write_vec<T: AsRef<[u8]>>(sink: &mut Vec<u8>, items: &[T]) {
    write_u32(sink, items.len() as u32);
    for item in items {
        sink.extend_from_slice(item.as_ref());
    }
}

/// Append a name: character count, then one byte per character.
///
/// Names are ASCII (enforced when declarations are registered), so the
/// character count equals the byte count.
pub fn write_name(sink: &mut Vec<u8>, name: &str) {
    debug_assert!(name.is_ascii(), "non-ASCII name {name:?}");
    write_u32(sink, name.len() as u32);
    sink.extend_from_slice(name.as_bytes());
}

/// Append the raw IEEE-754 bytes of `value`, little-endian.
pub fn write_f32(sink: &mut Vec<u8>, value: f32) {
    sink.extend_from_slice(&value.to_le_bytes());
}

/// Append a section frame: id byte, payload length, payload.
pub fn write_section(sink: &mut Vec<u8>, id: u8, payload: &[u8]) {
    sink.push(id);
    write_u32(sink, payload.len() as u32);
    sink.extend_from_slice(payload);
}
