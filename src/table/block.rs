//! Prefix-compressed data/index block format: builder and reader
//! (spec §3 "SST block", §4.4), grounded in
//! `original_source/sstable/block.go`.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::coding::{get_varint32, put_varint32};
use crate::comparator::Comparator;
use crate::error::Error;
use crate::iterator::OrderedIterator;

/// Builds one block's worth of sorted entries, sharing key prefixes
/// with the previous entry except at every `block_restart_interval`-th
/// entry, where a "restart point" stores the full key (spec §4.4).
pub struct BlockBuilder {
    comparator: Arc<dyn Comparator>,
    block_restart_interval: usize,
    buf: Vec<u8>,
    restarts: Vec<u32>,
    counter: usize,
    last_key: Vec<u8>,
    finished: bool,
}

impl BlockBuilder {
    /// Builds an empty block, restarting the shared-prefix chain every
    /// `block_restart_interval` entries.
    pub fn new(comparator: Arc<dyn Comparator>, block_restart_interval: usize) -> Self {
        BlockBuilder {
            comparator,
            block_restart_interval,
            buf: Vec::new(),
            restarts: vec![0],
            counter: 0,
            last_key: Vec::new(),
            finished: false,
        }
    }

    /// Appends `(key, value)`. `key` must compare strictly greater than
    /// every previously added key (spec §4.4, §7: fatal on violation).
    pub fn add(&mut self, key: &[u8], value: &[u8]) {
        assert!(!self.finished, "add on a finished block builder");
        assert!(
            self.buf.is_empty() || self.comparator.compare(key, &self.last_key) == Ordering::Greater,
            "out-of-order key passed to block builder"
        );

        let shared = if self.counter < self.block_restart_interval {
            let max_shared = self.last_key.len().min(key.len());
            (0..max_shared).take_while(|&i| self.last_key[i] == key[i]).count()
        } else {
            self.counter = 0;
            self.restarts.push(self.buf.len() as u32);
            0
        };
        let non_shared = key.len() - shared;

        put_varint32(&mut self.buf, shared as u32);
        put_varint32(&mut self.buf, non_shared as u32);
        put_varint32(&mut self.buf, value.len() as u32);
        self.buf.extend_from_slice(&key[shared..]);
        self.buf.extend_from_slice(value);

        self.last_key.truncate(shared);
        self.last_key.extend_from_slice(&key[shared..]);
        self.counter += 1;
    }

    /// Whether any entry has been added.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// An upper bound on the finished block's size, used to decide when
    /// to flush.
    pub fn current_size_estimate(&self) -> usize {
        self.buf.len() + self.restarts.len() * 4 + 4
    }

    /// Appends the restart-point array and its count, producing the
    /// complete block body (without the 5-byte trailer, which the
    /// table builder adds).
    pub fn finish(mut self) -> Vec<u8> {
        for &restart in &self.restarts {
            self.buf.extend_from_slice(&restart.to_le_bytes());
        }
        self.buf.extend_from_slice(&(self.restarts.len() as u32).to_le_bytes());
        self.finished = true;
        self.buf
    }
}

/// A finished, parsed block body ready to be iterated.
pub struct Block {
    data: Arc<[u8]>,
    num_restarts: usize,
    restart_offset: usize,
}

impl Block {
    /// Parses `data` (a block body, without its 5-byte trailer),
    /// validating the restart-point count against the buffer length.
    pub fn new(data: Vec<u8>) -> Result<Self, Error> {
        if data.len() < 4 {
            return Err(Error::Corruption("block shorter than its restart count field".into()));
        }
        let num_restarts = u32::from_le_bytes(data[data.len() - 4..].try_into().unwrap()) as usize;
        if num_restarts == 0 {
            return Err(Error::Corruption("block has zero restart points".into()));
        }
        let max_restarts_allowed = (data.len() - 4) / 4;
        if num_restarts > max_restarts_allowed {
            return Err(Error::Corruption("block restart count exceeds block size".into()));
        }
        let restart_offset = data.len() - (num_restarts + 1) * 4;
        Ok(Block { data: Arc::from(data), num_restarts, restart_offset })
    }

    /// A fresh iterator over this block's entries, ordered by `comparator`.
    pub fn iter(&self, comparator: Arc<dyn Comparator>) -> BlockIter {
        BlockIter {
            data: self.data.clone(),
            num_restarts: self.num_restarts,
            restart_offset: self.restart_offset,
            comparator,
            current_offset: self.restart_offset,
            restart_index: self.num_restarts,
            key: Vec::new(),
            value_range: (0, 0),
            corrupted: false,
        }
    }
}

/// A bidirectional cursor over a [`Block`]'s entries.
pub struct BlockIter {
    data: Arc<[u8]>,
    num_restarts: usize,
    restart_offset: usize,
    comparator: Arc<dyn Comparator>,
    current_offset: usize,
    restart_index: usize,
    key: Vec<u8>,
    value_range: (usize, usize),
    corrupted: bool,
}

impl BlockIter {
    fn get_restart_point(&self, index: usize) -> usize {
        let off = self.restart_offset + index * 4;
        u32::from_le_bytes(self.data[off..off + 4].try_into().unwrap()) as usize
    }

    fn seek_to_restart_point(&mut self, index: usize) {
        self.restart_index = index;
        self.key.clear();
        self.current_offset = self.get_restart_point(index);
    }

    fn mark_invalid(&mut self) {
        self.current_offset = self.restart_offset;
        self.restart_index = self.num_restarts;
    }

    /// Decodes the entry header at `offset`, returning
    /// `(shared, non_shared, value_len, header_len)`, or `None` if the
    /// header or its claimed lengths are malformed.
    fn decode_entry(&self, offset: usize) -> Option<(usize, usize, usize, usize)> {
        let buf = self.data.get(offset..self.restart_offset)?;
        let (shared, n1) = get_varint32(buf).ok()?;
        let (non_shared, n2) = get_varint32(buf.get(n1..)?).ok()?;
        let (value_len, n3) = get_varint32(buf.get(n1 + n2..)?).ok()?;
        let header_len = n1 + n2 + n3;
        let remaining = buf.len().checked_sub(header_len)?;
        if (non_shared as usize) + (value_len as usize) > remaining {
            return None;
        }
        Some((shared as usize, non_shared as usize, value_len as usize, header_len))
    }

    /// Parses the entry at `current_offset` into `self.key`/`value_range`
    /// and advances `current_offset` past it. Returns `false` (and marks
    /// the iterator invalid) at the last entry or on corruption.
    fn parse_next_key(&mut self) -> bool {
        if self.current_offset >= self.restart_offset {
            self.mark_invalid();
            return false;
        }

        let offset = self.current_offset;
        let (shared, non_shared, value_len, header_len) = match self.decode_entry(offset) {
            Some(v) => v,
            None => {
                self.corrupted = true;
                self.mark_invalid();
                return false;
            }
        };
        if shared > self.key.len() {
            self.corrupted = true;
            self.mark_invalid();
            return false;
        }

        self.key.truncate(shared);
        let entry_start = offset + header_len;
        self.key.extend_from_slice(&self.data[entry_start..entry_start + non_shared]);
        let value_start = entry_start + non_shared;
        self.value_range = (value_start, value_start + value_len);

        while self.restart_index + 1 < self.num_restarts && self.get_restart_point(self.restart_index + 1) < offset {
            self.restart_index += 1;
        }

        self.current_offset = value_start + value_len;
        true
    }
}

impl OrderedIterator for BlockIter {
    fn valid(&self) -> bool {
        !self.corrupted && self.current_offset < self.restart_offset
    }

    fn seek_to_first(&mut self) {
        self.seek_to_restart_point(0);
        self.parse_next_key();
    }

    fn seek_to_last(&mut self) {
        self.seek_to_restart_point(self.num_restarts - 1);
        while self.parse_next_key() {}
    }

    fn seek(&mut self, target: &[u8]) {
        let mut left = 0usize;
        let mut right = self.num_restarts - 1;
        while left < right {
            let mid = left + (right - left + 1) / 2;
            let region_offset = self.get_restart_point(mid);
            match self.decode_entry(region_offset) {
                Some((0, non_shared, _, header_len)) => {
                    let key_start = region_offset + header_len;
                    let mid_key = &self.data[key_start..key_start + non_shared];
                    if self.comparator.compare(mid_key, target) == Ordering::Less {
                        left = mid;
                    } else {
                        right = mid - 1;
                    }
                }
                _ => {
                    self.corrupted = true;
                    self.mark_invalid();
                    return;
                }
            }
        }

        self.seek_to_restart_point(left);
        loop {
            if !self.parse_next_key() {
                return;
            }
            if self.comparator.compare(&self.key, target) != Ordering::Less {
                return;
            }
        }
    }

    fn next(&mut self) {
        if self.corrupted {
            return;
        }
        assert!(self.valid(), "next on invalid block iterator");
        self.parse_next_key();
    }

    fn prev(&mut self) {
        if self.corrupted {
            return;
        }
        assert!(self.valid(), "prev on invalid block iterator");
        let original_offset = self.current_offset;

        while self.get_restart_point(self.restart_index) >= original_offset {
            if self.restart_index == 0 {
                self.mark_invalid();
                return;
            }
            self.restart_index -= 1;
        }

        self.seek_to_restart_point(self.restart_index);
        loop {
            if !self.parse_next_key() {
                break;
            }
            if self.current_offset >= original_offset {
                break;
            }
        }
    }

    fn key(&self) -> &[u8] {
        &self.key
    }

    fn value(&self) -> &[u8] {
        &self.data[self.value_range.0..self.value_range.1]
    }

    fn status(&self) -> crate::error::Result<()> {
        if self.corrupted {
            Err(Error::Corruption("corrupt block entry".into()))
        } else {
            Ok(())
        }
    }
}
