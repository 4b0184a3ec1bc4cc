//! Integer and string helpers for protocol buffers.
//!
//! Multi-byte integers embedded in parameter and information buffers use the
//! portable "vax" layout: least significant byte first, independent of the
//! host byte order. The last byte carries the sign.

use bytes::{Buf, BufMut};

/// Decode a vax-ordered signed integer of 1 to 8 bytes.
///
/// Returns 0 for an empty slice or one longer than 8 bytes.
#[must_use]
pub fn vax_integer(bytes: &[u8]) -> i64 {
    let Some((&last, rest)) = bytes.split_last() else {
        return 0;
    };
    if bytes.len() > 8 {
        return 0;
    }
    let mut value: i64 = 0;
    for (i, &b) in rest.iter().enumerate() {
        value |= i64::from(b) << (i * 8);
    }
    value | (i64::from(last as i8) << (rest.len() * 8))
}

/// Read an unsigned 2-byte vax length at `offset`, if the buffer is long enough.
#[must_use]
pub fn read_len16(buf: &[u8], offset: usize) -> Option<usize> {
    let mut src = buf.get(offset..offset + 2)?;
    Some(src.get_u16_le() as usize)
}

/// Append a 2-byte vax integer.
pub fn put_vax_i16(dst: &mut impl BufMut, value: i16) {
    dst.put_i16_le(value);
}

/// Append a 4-byte vax integer.
pub fn put_vax_i32(dst: &mut impl BufMut, value: i32) {
    dst.put_i32_le(value);
}

/// Decode bytes as text, replacing invalid UTF-8.
///
/// Servers report names in the connection character set; the driver only
/// promises lossless round trips for UTF-8 and ASCII data.
#[must_use]
pub fn decode_text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}
