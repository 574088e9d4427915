//! SSTable reader: opens a finished file and hands out block iterators
//! and a filter probe (spec §3 "SST table", §4.7), grounded in
//! `original_source/sstable/table.go`.
//!
//! Unlike the Go port, [`Table::open`] actually reads the meta-index
//! block and populates a [`FilterBlockReader`] (spec §9): the Go source
//! parses the meta-index but never looks up the filter entry inside it,
//! so `may_contain` there is always a no-op `true`.

use std::sync::Arc;

use tracing::warn;

use crate::comparator::{BytewiseComparator, Comparator};
use crate::env::RandomAccessFile;
use crate::iterator::OrderedIterator;
use crate::options::{CompressionType, Options, ReadOptions};
use crate::table::block::{Block, BlockIter};
use crate::table::filter_block::FilterBlockReader;
use crate::table::format::{BlockHandle, Footer, FOOTER_LENGTH};
use crate::table::two_level::TwoLevelIterator;
use crate::table::{Result, TableError};

/// A read-only handle onto one finished SST file.
pub struct Table {
    options: Options,
    file: Arc<dyn RandomAccessFile>,
    index_block: Arc<Block>,
    filter_block_reader: Option<FilterBlockReader>,
}

impl Table {
    /// Opens the `size`-byte table backed by `file`, parsing its footer,
    /// index block, and (if present) filter block.
    pub fn open(options: Options, file: Arc<dyn RandomAccessFile>, size: u64) -> Result<Self> {
        if size < FOOTER_LENGTH as u64 {
            return Err(TableError::Corruption("file shorter than a table footer".into()));
        }

        let footer_offset = size - FOOTER_LENGTH as u64;
        let mut footer_buf = vec![0u8; FOOTER_LENGTH];
        read_exact_at(file.as_ref(), footer_offset, &mut footer_buf)?;
        let footer = Footer::decode_from(&footer_buf)?;

        let index_data = read_block_raw(file.as_ref(), footer.index_handle, false)?;
        let index_block = Arc::new(Block::new(index_data)?);

        let mut table = Table { options, file, index_block, filter_block_reader: None };
        table.read_filter(footer.meta_index_handle);
        Ok(table)
    }

    fn read_filter(&mut self, meta_index_handle: BlockHandle) {
        let Some(policy) = self.options.filter_policy.clone() else { return };

        let meta_index_data = match read_block_raw(self.file.as_ref(), meta_index_handle, false) {
            Ok(data) => data,
            Err(e) => {
                warn!(error = %e, "table: failed to read meta-index block, filter disabled");
                return;
            }
        };
        let meta_index_block = match Block::new(meta_index_data) {
            Ok(b) => b,
            Err(e) => {
                warn!(error = %e, "table: corrupt meta-index block, filter disabled");
                return;
            }
        };

        let key = format!("filter.{}", policy.name());
        let mut it = meta_index_block.iter(Arc::new(BytewiseComparator));
        it.seek(key.as_bytes());
        if !it.valid() || it.key() != key.as_bytes() {
            return;
        }

        let handle = match BlockHandle::decode_from(it.value()) {
            Ok((h, _)) => h,
            Err(_) => return,
        };
        match read_block_raw(self.file.as_ref(), handle, false) {
            Ok(data) => self.filter_block_reader = Some(FilterBlockReader::new(policy, data)),
            Err(e) => warn!(error = %e, "table: failed to read filter block, filter disabled"),
        }
    }

    /// Whether `key` might appear in the data block whose first entry's
    /// handle has offset `block_offset`. `false` is a guarantee of
    /// absence. Always `true` if this table has no filter.
    pub fn may_contain(&self, block_offset: u64, key: &[u8]) -> bool {
        match &self.filter_block_reader {
            Some(reader) => reader.may_contain(block_offset, key),
            None => true,
        }
    }

    /// A fresh two-level iterator over the table's entries, ordered by
    /// `options.comparator`.
    pub fn new_iterator(&self, read_options: ReadOptions) -> TwoLevelIterator<'_> {
        TwoLevelIterator::new(self, read_options)
    }

    pub(crate) fn options(&self) -> &Options {
        &self.options
    }

    pub(crate) fn index_iter(&self) -> BlockIter {
        self.index_block.iter(self.options.comparator.clone())
    }

    /// Reads and decodes the data block located by `handle`.
    pub(crate) fn read_data_block(&self, read_options: &ReadOptions, handle: BlockHandle) -> Result<BlockIter> {
        let data = read_block_raw(self.file.as_ref(), handle, read_options.verify_checksums)?;
        let block = Block::new(data)?;
        Ok(block.iter(self.options.comparator.clone()))
    }
}

fn read_exact_at(file: &dyn RandomAccessFile, offset: u64, buf: &mut [u8]) -> Result<()> {
    let n = file.read_at(offset, buf)?;
    if n != buf.len() {
        return Err(TableError::Corruption("short read".into()));
    }
    Ok(())
}

fn read_block_raw(file: &dyn RandomAccessFile, handle: BlockHandle, verify_checksums: bool) -> Result<Vec<u8>> {
    let trailer_size = crate::table::format::BLOCK_TRAILER_SIZE;
    let mut buf = vec![0u8; handle.size as usize + trailer_size];
    read_exact_at(file, handle.offset, &mut buf)?;

    let compression_byte = buf[handle.size as usize];
    let compression = CompressionType::from_byte(compression_byte)
        .ok_or_else(|| TableError::Corruption(format!("unrecognized compression byte {compression_byte}")))?;

    if verify_checksums {
        let stored = u32::from_le_bytes(buf[handle.size as usize + 1..].try_into().unwrap());
        let actual = crate::table::format::compute_block_checksum(&buf[..handle.size as usize], compression);
        if actual != stored {
            return Err(TableError::Corruption("block checksum mismatch".into()));
        }
    }

    buf.truncate(handle.size as usize);
    match compression {
        CompressionType::None => Ok(buf),
        CompressionType::Snappy => Err(TableError::Unsupported("snappy-compressed block".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bloom::BloomFilterPolicy;
    use crate::env::{Env, MemEnv, WritableFile};
    use crate::table::builder::TableBuilder;
    use std::path::Path;

    fn build_table(env: &MemEnv, path: &Path, options: Options, entries: &[(&[u8], &[u8])]) {
        let file = env.new_writable_file(path).unwrap();
        let mut builder = TableBuilder::new(options, file);
        for (k, v) in entries {
            builder.add(k, v);
        }
        builder.finish().unwrap();
    }

    #[test]
    fn round_trips_entries_through_two_level_iterator() {
        let env = MemEnv::new();
        let path = Path::new("/t.sst");
        let mut options = Options { block_restart_interval: 2, block_size: 40, ..Options::default() };
        options.filter_policy = Some(Arc::new(BloomFilterPolicy::new(10)));
        let entries: Vec<(&[u8], &[u8])> =
            vec![(b"a", b"1"), (b"b", b"2"), (b"c", b"3"), (b"d", b"4"), (b"e", b"5"), (b"f", b"6")];
        build_table(&env, path, options.clone(), &entries);

        let size = env.get_file_size(path).unwrap();
        let file = env.new_random_access_file(path).unwrap();
        let table = Table::open(options, file, size).unwrap();

        let mut it = table.new_iterator(ReadOptions::default());
        it.seek_to_first();
        let mut got = Vec::new();
        while it.valid() {
            got.push((it.key().to_vec(), it.value().to_vec()));
            it.next();
        }
        let expected: Vec<(Vec<u8>, Vec<u8>)> = entries.iter().map(|(k, v)| (k.to_vec(), v.to_vec())).collect();
        assert_eq!(got, expected);
    }

    #[test]
    fn filter_block_is_actually_populated_and_used() {
        let env = MemEnv::new();
        let path = Path::new("/f.sst");
        let mut options = Options::default();
        options.filter_policy = Some(Arc::new(BloomFilterPolicy::new(10)));
        build_table(&env, path, options.clone(), &[(b"present", b"1")]);

        let size = env.get_file_size(path).unwrap();
        let file = env.new_random_access_file(path).unwrap();
        let table = Table::open(options, file, size).unwrap();

        assert!(table.filter_block_reader.is_some());
        assert!(table.may_contain(0, b"present"));
        assert!(!table.may_contain(0, b"absent"));
    }

    #[test]
    fn checksum_mismatch_is_rejected_when_verification_is_on() {
        let env = MemEnv::new();
        let path = Path::new("/c.sst");
        let options = Options::default();
        build_table(&env, path, options.clone(), &[(b"k", b"v")]);

        let size = env.get_file_size(path).unwrap();
        let data = {
            let file = env.new_random_access_file(path).unwrap();
            let mut buf = vec![0u8; size as usize];
            file.read_at(0, &mut buf).unwrap();
            buf
        };
        let mut corrupt = data;
        corrupt[0] ^= 0xff;
        env.new_writable_file(path).unwrap().write(&corrupt).unwrap();

        let file = env.new_random_access_file(path).unwrap();
        let table = Table::open(options, file, size).unwrap();
        let read_options = ReadOptions { verify_checksums: true, ..ReadOptions::default() };
        let mut it = table.new_iterator(read_options);
        it.seek_to_first();
        assert!(it.status().is_err());
    }

    #[test]
    fn repeated_advance_after_corruption_is_a_no_op_not_a_panic() {
        let env = MemEnv::new();
        let path = Path::new("/c2.sst");
        let options = Options::default();
        build_table(&env, path, options.clone(), &[(b"k", b"v")]);

        let size = env.get_file_size(path).unwrap();
        let data = {
            let file = env.new_random_access_file(path).unwrap();
            let mut buf = vec![0u8; size as usize];
            file.read_at(0, &mut buf).unwrap();
            buf
        };
        let mut corrupt = data;
        corrupt[0] ^= 0xff;
        env.new_writable_file(path).unwrap().write(&corrupt).unwrap();

        let file = env.new_random_access_file(path).unwrap();
        let table = Table::open(options, file, size).unwrap();
        let read_options = ReadOptions { verify_checksums: true, ..ReadOptions::default() };
        let mut it = table.new_iterator(read_options);

        it.seek_to_first();
        assert!(!it.valid());
        assert!(it.status().is_err());

        // spec §7: corruption leaves the iterator invalid and makes its
        // status observable; further advances are no-ops, never fatal.
        it.next();
        assert!(!it.valid());
        assert!(it.status().is_err());
        it.prev();
        assert!(!it.valid());
        assert!(it.status().is_err());
    }
}
