//! Wire-format primitives shared by the block, builder, and reader
//! modules (spec §3 "SST table", §6), grounded in
//! `original_source/sstable/format.go`.

use thiserror::Error;

use crate::coding::{get_varint64, put_varint64};
use crate::options::CompressionType;

/// `compression_type(1 byte) || crc32(4 bytes, little-endian)`.
pub const BLOCK_TRAILER_SIZE: usize = 5;
/// The largest a varint-encoded [`BlockHandle`] can be.
pub const MAX_BLOCK_HANDLE_ENCODED_LENGTH: usize = 20;
/// Total footer size: two fixed-width handle slots plus the magic number.
pub const FOOTER_LENGTH: usize = 2 * MAX_BLOCK_HANDLE_ENCODED_LENGTH + 8;
/// Marks the last 8 bytes of a well-formed SST file.
pub const TABLE_MAGIC_NUMBER: u64 = 0xdb47_7524_8b80_fb57;

/// Errors decoding a [`BlockHandle`] or [`Footer`].
#[derive(Debug, Error)]
pub enum FormatError {
    /// A varint inside a block handle was truncated or malformed.
    #[error("corrupt block handle")]
    BadBlockHandle,
    /// The footer region was shorter than [`FOOTER_LENGTH`].
    #[error("footer shorter than expected")]
    Truncated,
    /// The trailing 8 bytes did not match [`TABLE_MAGIC_NUMBER`].
    #[error("bad table magic number")]
    BadMagic,
}

/// A `(offset, size)` pair locating a block within an SST file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockHandle {
    /// Byte offset of the block's first byte.
    pub offset: u64,
    /// Length of the block, excluding its trailer.
    pub size: u64,
}

impl BlockHandle {
    /// Appends this handle to `buf` as two unsigned varints.
    pub fn encode_to(&self, buf: &mut Vec<u8>) {
        put_varint64(buf, self.offset);
        put_varint64(buf, self.size);
    }

    /// Decodes a handle from the front of `data`, returning
    /// `(handle, bytes_consumed)`.
    pub fn decode_from(data: &[u8]) -> Result<(Self, usize), FormatError> {
        let (offset, n1) = get_varint64(data).map_err(|_| FormatError::BadBlockHandle)?;
        let (size, n2) = get_varint64(&data[n1..]).map_err(|_| FormatError::BadBlockHandle)?;
        Ok((BlockHandle { offset, size }, n1 + n2))
    }
}

/// The fixed-size trailer of every SST file: the meta-index and index
/// block handles, left-padded into a fixed region, followed by the
/// magic number.
#[derive(Debug, Clone, Copy, Default)]
pub struct Footer {
    /// Locates the meta-index block (currently only the filter entry).
    pub meta_index_handle: BlockHandle,
    /// Locates the top-level index block.
    pub index_handle: BlockHandle,
}

impl Footer {
    /// Encodes this footer into its fixed [`FOOTER_LENGTH`]-byte form.
    pub fn encode_to(&self) -> [u8; FOOTER_LENGTH] {
        let mut out = [0u8; FOOTER_LENGTH];
        let mut buf = Vec::with_capacity(2 * MAX_BLOCK_HANDLE_ENCODED_LENGTH);
        self.meta_index_handle.encode_to(&mut buf);
        self.index_handle.encode_to(&mut buf);
        out[..buf.len()].copy_from_slice(&buf);
        out[2 * MAX_BLOCK_HANDLE_ENCODED_LENGTH..].copy_from_slice(&TABLE_MAGIC_NUMBER.to_le_bytes());
        out
    }

    /// Decodes a footer from exactly [`FOOTER_LENGTH`] bytes.
    pub fn decode_from(data: &[u8]) -> Result<Self, FormatError> {
        if data.len() < FOOTER_LENGTH {
            return Err(FormatError::Truncated);
        }
        let magic_bytes: [u8; 8] = data[FOOTER_LENGTH - 8..].try_into().unwrap();
        if u64::from_le_bytes(magic_bytes) != TABLE_MAGIC_NUMBER {
            return Err(FormatError::BadMagic);
        }
        let (meta_index_handle, n1) = BlockHandle::decode_from(data)?;
        let (index_handle, _) = BlockHandle::decode_from(&data[n1..])?;
        Ok(Footer { meta_index_handle, index_handle })
    }
}

/// `crc32(block_bytes || compression_type_byte)`, per spec §9(b). The
/// Go port hardcodes the compression byte to `0x1` here regardless of
/// the block's actual compression type; this crate always uses the
/// real byte, matching the trailer it writes.
pub fn compute_block_checksum(block: &[u8], compression: CompressionType) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(block);
    hasher.update(&[compression.to_byte()]);
    hasher.finalize()
}
