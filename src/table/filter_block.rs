//! Per-data-block filter array, indexed by data block starting offset
//! (spec §3 "Filter block", §4.5), grounded in
//! `original_source/sstable/filter_block.go`.

use std::sync::Arc;

use crate::bloom::FilterPolicy;

/// `2^11 = 2 KiB` of data-block coverage per filter slot.
pub const FILTER_BASE_LG: u32 = 11;
const FILTER_BASE: u64 = 1 << FILTER_BASE_LG;

/// Accumulates keys, per data block, into one filter per `2 KiB` of
/// data-block coverage (spec §4.5).
pub struct FilterBlockBuilder {
    policy: Arc<dyn FilterPolicy>,
    keys: Vec<u8>,
    starts: Vec<usize>,
    filter_offsets: Vec<u32>,
    result: Vec<u8>,
}

impl FilterBlockBuilder {
    /// Builds an empty filter block using `policy`.
    pub fn new(policy: Arc<dyn FilterPolicy>) -> Self {
        FilterBlockBuilder {
            policy,
            keys: Vec::new(),
            starts: Vec::new(),
            filter_offsets: Vec::new(),
            result: Vec::new(),
        }
    }

    /// Signals that the data block about to be written starts at
    /// `block_offset`, backfilling empty filters for any index range
    /// skipped since the last call (spec §4.5).
    pub fn start_block(&mut self, block_offset: u64) {
        let filter_index = (block_offset / FILTER_BASE) as usize;
        while filter_index > self.filter_offsets.len() {
            self.generate_filter();
        }
    }

    /// Accumulates `key`, to be folded into the filter for the data
    /// block currently being written.
    pub fn add_key(&mut self, key: &[u8]) {
        self.starts.push(self.keys.len());
        self.keys.extend_from_slice(key);
    }

    /// Flushes any pending keys and appends the offset array, emitting
    /// the complete filter block body.
    pub fn finish(mut self) -> Vec<u8> {
        if !self.starts.is_empty() {
            self.generate_filter();
        }

        let array_offset = self.result.len() as u32;
        for &offset in &self.filter_offsets {
            self.result.extend_from_slice(&offset.to_le_bytes());
        }
        self.result.extend_from_slice(&array_offset.to_le_bytes());
        self.result.push(FILTER_BASE_LG as u8);
        self.result
    }

    fn generate_filter(&mut self) {
        if self.starts.is_empty() {
            // No keys accumulated for this range: record an empty
            // filter (its offset equals the next filter's, which the
            // reader recognizes as "definitely absent" rather than
            // "out of range").
            self.filter_offsets.push(self.result.len() as u32);
            return;
        }

        self.starts.push(self.keys.len());
        let keys: Vec<&[u8]> = self.starts.windows(2).map(|w| &self.keys[w[0]..w[1]]).collect();

        self.filter_offsets.push(self.result.len() as u32);
        let filter = self.policy.create_filter(&keys);
        self.result.extend_from_slice(&filter);

        self.keys.clear();
        self.starts.clear();
    }
}

/// Reads a filter block built by [`FilterBlockBuilder`].
pub struct FilterBlockReader {
    policy: Arc<dyn FilterPolicy>,
    data: Arc<[u8]>,
    base_lg: u32,
    offset: usize,
    num: usize,
}

impl FilterBlockReader {
    /// Parses `data` (a complete filter block body).
    pub fn new(policy: Arc<dyn FilterPolicy>, data: Vec<u8>) -> Self {
        if data.len() < 5 {
            return FilterBlockReader { policy, data: Arc::from(Vec::new()), base_lg: 0, offset: 0, num: 0 };
        }
        let base_lg = data[data.len() - 1] as u32;
        let array_offset_pos = data.len() - 5;
        let offset =
            u32::from_le_bytes(data[array_offset_pos..array_offset_pos + 4].try_into().unwrap()) as usize;
        let num = if offset <= array_offset_pos { (array_offset_pos - offset) / 4 } else { 0 };
        FilterBlockReader { policy, data: Arc::from(data), base_lg, offset, num }
    }

    /// Whether `key` might be present in the data block starting at
    /// `block_offset`. `false` is a guarantee of absence.
    pub fn may_contain(&self, block_offset: u64, key: &[u8]) -> bool {
        let filter_index = (block_offset >> self.base_lg) as usize;
        if filter_index >= self.num {
            return true;
        }

        let x = self.offset + filter_index * 4;
        let start = u32::from_le_bytes(self.data[x..x + 4].try_into().unwrap()) as usize;
        let limit = u32::from_le_bytes(self.data[x + 4..x + 8].try_into().unwrap()) as usize;
        if start <= limit && limit <= self.offset {
            if start == limit {
                return false;
            }
            self.policy.may_contain(&self.data[start..limit], key)
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bloom::BloomFilterPolicy;

    fn policy() -> Arc<dyn FilterPolicy> {
        Arc::new(BloomFilterPolicy::new(10))
    }

    #[test]
    fn single_block_filter_recognizes_its_keys() {
        let mut builder = FilterBlockBuilder::new(policy());
        builder.start_block(0);
        builder.add_key(b"foo");
        builder.add_key(b"bar");
        let raw = builder.finish();

        let reader = FilterBlockReader::new(policy(), raw);
        assert!(reader.may_contain(0, b"foo"));
        assert!(reader.may_contain(0, b"bar"));
    }

    #[test]
    fn skipped_range_produces_empty_filter_not_conservative_true() {
        let mut builder = FilterBlockBuilder::new(policy());
        builder.start_block(0);
        builder.add_key(b"foo");
        // Jump straight to the third 2 KiB range without adding keys
        // for the second, leaving an empty filter in between.
        builder.start_block(2 * (1u64 << FILTER_BASE_LG));
        builder.add_key(b"quux");
        let raw = builder.finish();

        let reader = FilterBlockReader::new(policy(), raw);
        assert!(reader.may_contain(0, b"foo"));
        // The skipped middle range has an empty filter: definitely absent.
        assert!(!reader.may_contain(1u64 << FILTER_BASE_LG, b"anything"));
        assert!(reader.may_contain(2 * (1u64 << FILTER_BASE_LG), b"quux"));
    }

    #[test]
    fn out_of_range_index_is_conservatively_true() {
        let mut builder = FilterBlockBuilder::new(policy());
        builder.start_block(0);
        builder.add_key(b"foo");
        let raw = builder.finish();

        let reader = FilterBlockReader::new(policy(), raw);
        assert!(reader.may_contain(1_000_000 * (1u64 << FILTER_BASE_LG), b"anything"));
    }
}
