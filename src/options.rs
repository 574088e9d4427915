//! Tunable options (spec §6 "Tunable options").
//!
//! Plain structs with documented [`Default`] impls, the way the teacher
//! crate's `EngineConfig` is a plain struct rather than a builder or a
//! config-file schema — this crate has no process entry point to parse
//! a file for, so a struct literal is the whole configuration surface.

use std::sync::Arc;

use crate::bloom::FilterPolicy;
use crate::comparator::{BytewiseComparator, Comparator};

/// Recognized block compression types.
///
/// Only [`CompressionType::None`] is implemented by the table builder;
/// [`CompressionType::Snappy`] is recognized on read so that a reader
/// encountering a Snappy-compressed block reports
/// [`crate::error::Error::Unsupported`] instead of misreading garbage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionType {
    /// No compression; the block trailer's compression byte is `0x0`.
    None,
    /// Snappy compression; the trailer's compression byte is `0x1`.
    Snappy,
}

impl CompressionType {
    /// Decodes the single-byte on-disk tag, per spec §4.6.
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x0 => Some(CompressionType::None),
            0x1 => Some(CompressionType::Snappy),
            _ => None,
        }
    }

    /// Encodes the on-disk tag byte.
    pub fn to_byte(self) -> u8 {
        match self {
            CompressionType::None => 0x0,
            CompressionType::Snappy => 0x1,
        }
    }
}

/// Options shared by the table builder and reader (spec §6).
#[derive(Clone)]
pub struct Options {
    /// Key ordering and separator/successor hints (spec §3).
    pub comparator: Arc<dyn Comparator>,
    /// Target entries between restart points in a data block (default 16).
    pub block_restart_interval: usize,
    /// Target uncompressed size per data block before flushing (default 4 KiB).
    pub block_size: usize,
    /// Compression applied to new blocks. Only `None` is ever written.
    pub compression_type: CompressionType,
    /// Filter policy applied to new tables, if any.
    pub filter_policy: Option<Arc<dyn FilterPolicy>>,
}

impl std::fmt::Debug for Options {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Options")
            .field("comparator", &self.comparator.name())
            .field("block_restart_interval", &self.block_restart_interval)
            .field("block_size", &self.block_size)
            .field("compression_type", &self.compression_type)
            .field("filter_policy", &self.filter_policy.as_ref().map(|p| p.name()))
            .finish()
    }
}

impl Default for Options {
    fn default() -> Self {
        Options {
            comparator: Arc::new(BytewiseComparator),
            block_restart_interval: 16,
            block_size: 4 * 1024,
            compression_type: CompressionType::None,
            filter_policy: None,
        }
    }
}

/// Per-read tunables (spec §6).
#[derive(Debug, Clone, Copy)]
pub struct ReadOptions {
    /// Validate the block trailer's CRC32 before returning data.
    pub verify_checksums: bool,
    /// Whether a read may populate the external block cache.
    ///
    /// The block cache itself lives outside this crate (spec §1's
    /// out-of-scope list); this flag is threaded through so a caller
    /// wiring in its own cache can honor it.
    pub fill_cache: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        ReadOptions { verify_checksums: false, fill_cache: true }
    }
}

/// Per-write tunables (spec §6).
///
/// The core described here has no durability knob of its own ("sync
/// on every write" is a property of the log writer, which always
/// syncs after each physical record per spec §4.10); this struct
/// exists as the seam a higher layer (out of scope) would extend.
#[derive(Debug, Clone, Copy, Default)]
pub struct WriteOptions {
    /// Reserved for a higher layer's fsync-on-commit policy.
    pub sync: bool,
}
