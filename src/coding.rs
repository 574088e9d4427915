//! Deterministic, zero-dependency binary coding primitives.
//!
//! This module is the varint/fixed-width counterpart of the teacher
//! crate's hand-written `encoding` module: it owns the wire format
//! instead of delegating to a serialization crate, so the on-disk layout
//! never shifts under a dependency upgrade. Unlike a whole-struct
//! encoder, the block and footer formats in [`crate::table`] interleave
//! raw varints with key/value bytes, so the primitives here operate
//! directly on byte slices and `Vec<u8>` buffers rather than on typed
//! structs.
//!
//! # Wire format
//!
//! | Function | Encoding |
//! |---|---|
//! | [`put_fixed32`] / [`get_fixed32`] | 4 bytes, little-endian |
//! | [`put_fixed64`] / [`get_fixed64`] | 8 bytes, little-endian |
//! | [`put_varint32`] / [`get_varint32`] | LEB128, 1–5 bytes |
//! | [`put_varint64`] / [`get_varint64`] | LEB128, 1–10 bytes |
//!
//! Varints are unsigned, little-endian-group, 7 bits of payload per byte
//! with the high bit set on every byte but the last — the same encoding
//! as `encoding/binary.Uvarint` in `original_source/`.
//!
//! # Zero-panic guarantee
//!
//! Every decode function returns [`CodingError`] on a truncated or
//! overlong buffer; nothing in this module calls `unwrap`/`expect` on
//! caller-supplied data.

use thiserror::Error;

/// Errors produced while decoding a varint or fixed-width field.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodingError {
    /// The buffer ended before a complete value could be read.
    #[error("unexpected end of buffer while decoding")]
    UnexpectedEof,

    /// A varint used more than the maximum number of continuation bytes.
    #[error("varint is malformed or exceeds 64 bits")]
    MalformedVarint,
}

type Result<T> = std::result::Result<T, CodingError>;

// ------------------------------------------------------------------------------------------------
// Fixed-width
// ------------------------------------------------------------------------------------------------

/// Appends `v` to `buf` as 4 little-endian bytes.
pub fn put_fixed32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

/// Appends `v` to `buf` as 8 little-endian bytes.
pub fn put_fixed64(buf: &mut Vec<u8>, v: u64) {
    buf.extend_from_slice(&v.to_le_bytes());
}

/// Decodes a 4-byte little-endian integer from the front of `buf`.
pub fn get_fixed32(buf: &[u8]) -> Result<u32> {
    let bytes: [u8; 4] = buf.get(..4).ok_or(CodingError::UnexpectedEof)?.try_into().unwrap();
    Ok(u32::from_le_bytes(bytes))
}

/// Decodes an 8-byte little-endian integer from the front of `buf`.
pub fn get_fixed64(buf: &[u8]) -> Result<u64> {
    let bytes: [u8; 8] = buf.get(..8).ok_or(CodingError::UnexpectedEof)?.try_into().unwrap();
    Ok(u64::from_le_bytes(bytes))
}

// ------------------------------------------------------------------------------------------------
// Varint
// ------------------------------------------------------------------------------------------------

/// Appends `v` to `buf` as an unsigned LEB128 varint.
pub fn put_varint32(buf: &mut Vec<u8>, v: u32) {
    put_varint64(buf, u64::from(v));
}

/// Appends `v` to `buf` as an unsigned LEB128 varint.
pub fn put_varint64(buf: &mut Vec<u8>, mut v: u64) {
    loop {
        if v < 0x80 {
            buf.push(v as u8);
            break;
        }
        buf.push((v as u8 & 0x7f) | 0x80);
        v >>= 7;
    }
}

/// Decodes a varint from the front of `buf`, returning `(value, bytes_consumed)`.
pub fn get_varint32(buf: &[u8]) -> Result<(u32, usize)> {
    let (v, n) = get_varint64(buf)?;
    if v > u64::from(u32::MAX) {
        return Err(CodingError::MalformedVarint);
    }
    Ok((v as u32, n))
}

/// Decodes a varint from the front of `buf`, returning `(value, bytes_consumed)`.
///
/// A varint longer than 10 bytes (the maximum needed for a 64-bit value)
/// is rejected as malformed, matching the corruption detection required
/// by spec §4.4/§7 (a claimed length must never read past the buffer).
pub fn get_varint64(buf: &[u8]) -> Result<(u64, usize)> {
    let mut result: u64 = 0;
    let mut shift = 0u32;
    for (i, &byte) in buf.iter().enumerate() {
        if shift >= 64 {
            return Err(CodingError::MalformedVarint);
        }
        result |= u64::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            return Ok((result, i + 1));
        }
        shift += 7;
    }
    Err(CodingError::UnexpectedEof)
}

/// Returns the number of bytes [`put_varint64`] would write for `v`.
pub fn varint_length(mut v: u64) -> usize {
    let mut len = 1;
    while v >= 0x80 {
        v >>= 7;
        len += 1;
    }
    len
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn varint_round_trip() {
        let values = [0u64, 1, 127, 128, 300, u32::MAX as u64, u64::MAX];
        for &v in &values {
            let mut buf = Vec::new();
            put_varint64(&mut buf, v);
            assert_eq!(buf.len(), varint_length(v));
            let (decoded, n) = get_varint64(&buf).unwrap();
            assert_eq!(decoded, v);
            assert_eq!(n, buf.len());
        }
    }

    #[test]
    fn varint_truncated_is_eof() {
        let mut buf = Vec::new();
        put_varint64(&mut buf, 1_000_000);
        let truncated = &buf[..buf.len() - 1];
        assert_eq!(get_varint64(truncated), Err(CodingError::UnexpectedEof));
    }

    #[test]
    fn fixed_round_trip() {
        let mut buf = Vec::new();
        put_fixed32(&mut buf, 0xdead_beef);
        put_fixed64(&mut buf, 0x0123_4567_89ab_cdef);
        assert_eq!(get_fixed32(&buf[..4]).unwrap(), 0xdead_beef);
        assert_eq!(get_fixed64(&buf[4..]).unwrap(), 0x0123_4567_89ab_cdef);
    }
}
