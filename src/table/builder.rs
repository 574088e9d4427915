//! Streaming SSTable writer (spec §4.6), grounded in
//! `original_source/sstable/table_builder.go`.
//!
//! Two fixes relative to the Go port, per spec §9:
//! - (a) `find_shortest_separator` is actually used when emitting index
//!   entries; the Go port computes it but never calls it.
//! - (b) the block trailer checksum always covers the block's real
//!   compression-type byte, not a hardcoded `0x1`.

use tracing::{debug, trace};

use crate::env::WritableFile;
use crate::options::{CompressionType, Options};
use crate::table::block::BlockBuilder;
use crate::table::filter_block::FilterBlockBuilder;
use crate::table::format::{compute_block_checksum, BlockHandle, Footer};
use crate::table::{Result, TableError};

#[derive(PartialEq, Eq)]
enum State {
    Open,
    Closed,
}

/// Builds one SST file by accepting strictly-increasing `(key, value)`
/// pairs and writing data blocks, an optional filter block, a
/// meta-index block, the top-level index block, and the footer
/// (spec §4.6).
pub struct TableBuilder {
    options: Options,
    file: Box<dyn WritableFile>,
    offset: u64,
    status: Option<TableError>,
    data_block: BlockBuilder,
    index_block: BlockBuilder,
    last_key: Vec<u8>,
    num_entries: usize,
    state: State,
    pending_index_entry: bool,
    pending_handle: BlockHandle,
    filter_block: Option<FilterBlockBuilder>,
}

impl TableBuilder {
    /// Begins a new table, writing through `file`.
    pub fn new(options: Options, file: Box<dyn WritableFile>) -> Self {
        let filter_block = options.filter_policy.clone().map(|policy| {
            let mut fb = FilterBlockBuilder::new(policy);
            fb.start_block(0);
            fb
        });
        TableBuilder {
            data_block: BlockBuilder::new(options.comparator.clone(), options.block_restart_interval),
            index_block: BlockBuilder::new(options.comparator.clone(), 1),
            options,
            file,
            offset: 0,
            status: None,
            last_key: Vec::new(),
            num_entries: 0,
            state: State::Open,
            pending_index_entry: false,
            pending_handle: BlockHandle::default(),
            filter_block,
        }
    }

    /// Appends `(key, value)`. `key` must compare strictly greater than
    /// every key previously added (spec §4.6, §7: fatal on violation).
    /// A no-op once a prior write has failed.
    pub fn add(&mut self, key: &[u8], value: &[u8]) {
        assert!(matches!(self.state, State::Open), "add on a closed table builder");
        if self.status.is_some() {
            return;
        }
        if self.num_entries > 0 {
            assert_eq!(
                self.options.comparator.compare(key, &self.last_key),
                std::cmp::Ordering::Greater,
                "keys passed to a table builder must be strictly increasing"
            );
        }

        if self.pending_index_entry {
            debug_assert!(self.data_block.is_empty());
            let separator = self.options.comparator.find_shortest_separator(&self.last_key, key);
            let mut handle_bytes = Vec::new();
            self.pending_handle.encode_to(&mut handle_bytes);
            self.index_block.add(&separator, &handle_bytes);
            self.pending_index_entry = false;
        }

        if let Some(filter_block) = &mut self.filter_block {
            filter_block.add_key(key);
        }

        self.last_key.clear();
        self.last_key.extend_from_slice(key);
        self.num_entries += 1;
        self.data_block.add(key, value);
        trace!(num_entries = self.num_entries, "table builder: entry added");

        if self.data_block.current_size_estimate() >= self.options.block_size {
            self.flush();
        }
    }

    /// Flushes the current data block, if non-empty.
    pub fn flush(&mut self) {
        assert!(matches!(self.state, State::Open), "flush on a closed table builder");
        if self.status.is_some() || self.data_block.is_empty() {
            return;
        }
        assert!(!self.pending_index_entry, "flush called with a pending index entry");

        let finished = std::mem::replace(
            &mut self.data_block,
            BlockBuilder::new(self.options.comparator.clone(), self.options.block_restart_interval),
        )
        .finish();
        let handle = self.write_raw_block(&finished, CompressionType::None);
        self.pending_handle = handle;

        if self.status.is_none() {
            self.pending_index_entry = true;
            if let Err(e) = self.file.sync() {
                self.status = Some(TableError::from(e));
            }
        }

        if let Some(filter_block) = &mut self.filter_block {
            filter_block.start_block(self.offset);
        }
    }

    fn write_raw_block(&mut self, raw: &[u8], compression: CompressionType) -> BlockHandle {
        let handle = BlockHandle { offset: self.offset, size: raw.len() as u64 };
        if self.status.is_none() {
            if let Err(e) = self.file.write(raw) {
                self.status = Some(TableError::from(e));
            }
        }
        if self.status.is_none() {
            let checksum = compute_block_checksum(raw, compression);
            let mut trailer = [0u8; 5];
            trailer[0] = compression.to_byte();
            trailer[1..].copy_from_slice(&checksum.to_le_bytes());
            match self.file.write(&trailer) {
                Ok(()) => self.offset += raw.len() as u64 + 5,
                Err(e) => self.status = Some(TableError::from(e)),
            }
        }
        handle
    }

    /// Number of entries added so far.
    pub fn num_entries(&self) -> usize {
        self.num_entries
    }

    /// Bytes written to the underlying file so far.
    pub fn file_size(&self) -> u64 {
        self.offset
    }

    /// Closes the builder without writing its remaining state; any
    /// further use of this builder is a programming error.
    pub fn abandon(mut self) {
        assert!(matches!(self.state, State::Open), "abandon on an already-closed table builder");
        self.state = State::Closed;
    }

    /// Flushes the final data block, writes the filter block (if any),
    /// the meta-index block, the top-level index block, and the
    /// footer.
    pub fn finish(mut self) -> Result<()> {
        self.flush();
        assert!(matches!(self.state, State::Open), "finish called on an already-closed table builder");
        self.state = State::Closed;

        let mut filter_handle = BlockHandle::default();
        if self.status.is_none() {
            if let Some(filter_block) = self.filter_block.take() {
                let raw = filter_block.finish();
                filter_handle = self.write_raw_block(&raw, CompressionType::None);
            }
        }

        let mut meta_index_handle = BlockHandle::default();
        if self.status.is_none() {
            let mut meta_index_block =
                BlockBuilder::new(self.options.comparator.clone(), self.options.block_restart_interval);
            if let Some(policy) = &self.options.filter_policy {
                let key = format!("filter.{}", policy.name());
                let mut handle_bytes = Vec::new();
                filter_handle.encode_to(&mut handle_bytes);
                meta_index_block.add(key.as_bytes(), &handle_bytes);
            }
            let raw = meta_index_block.finish();
            meta_index_handle = self.write_raw_block(&raw, CompressionType::None);
        }

        let mut index_handle = BlockHandle::default();
        if self.status.is_none() {
            if self.pending_index_entry {
                let separator = self.options.comparator.find_shortest_successor(&self.last_key);
                let mut handle_bytes = Vec::new();
                self.pending_handle.encode_to(&mut handle_bytes);
                self.index_block.add(&separator, &handle_bytes);
                self.pending_index_entry = false;
            }
            let raw = std::mem::replace(&mut self.index_block, BlockBuilder::new(self.options.comparator.clone(), 1))
                .finish();
            index_handle = self.write_raw_block(&raw, CompressionType::None);
        }

        if self.status.is_none() {
            let footer = Footer { meta_index_handle, index_handle };
            let encoded = footer.encode_to();
            match self.file.write(&encoded) {
                Ok(()) => self.offset += encoded.len() as u64,
                Err(e) => self.status = Some(TableError::from(e)),
            }
        }

        debug!(num_entries = self.num_entries, file_size = self.offset, "table builder: finished");

        match self.status {
            None => Ok(()),
            Some(e) => Err(e),
        }
    }
}
