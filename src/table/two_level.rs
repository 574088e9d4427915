//! Two-level iterator: an index-block cursor over handles into data
//! blocks, each opened on demand (spec §3 "Two-level iterator", §4.8).
//!
//! The Go port (`original_source/sstable/table.go`) only implements
//! forward iteration (`SeekToFirst`/`Next`); `Seek`/`SeekToLast`/`Prev`
//! are supplied fresh here, following the same empty-block-skipping
//! shape as its forward path (spec §9).

use crate::error::{Error, Result};
use crate::iterator::OrderedIterator;
use crate::options::ReadOptions;
use crate::table::format::BlockHandle;
use crate::table::reader::Table;
use crate::table::block::BlockIter;

/// Iterates a table's entries in key order by walking the index block
/// and, for each entry it points at, opening and walking the
/// corresponding data block.
pub struct TwoLevelIterator<'a> {
    table: &'a Table,
    read_options: ReadOptions,
    index_iter: BlockIter,
    data_iter: Option<BlockIter>,
    status: Option<Error>,
}

impl<'a> TwoLevelIterator<'a> {
    pub(crate) fn new(table: &'a Table, read_options: ReadOptions) -> Self {
        TwoLevelIterator { index_iter: table.index_iter(), table, read_options, data_iter: None, status: None }
    }

    fn init_data_block(&mut self) {
        if !self.index_iter.valid() {
            self.data_iter = None;
            return;
        }
        let handle = match BlockHandle::decode_from(self.index_iter.value()) {
            Ok((h, _)) => h,
            Err(e) => {
                self.status = Some(Error::Corruption(e.to_string()));
                self.data_iter = None;
                return;
            }
        };
        match self.table.read_data_block(&self.read_options, handle) {
            Ok(iter) => self.data_iter = Some(iter),
            Err(e) => {
                self.status = Some(e.into());
                self.data_iter = None;
            }
        }
    }

    fn skip_empty_forward(&mut self) {
        while self.data_iter.as_ref().is_none_or(|d| !d.valid()) {
            if !self.index_iter.valid() {
                self.data_iter = None;
                return;
            }
            self.index_iter.next();
            self.init_data_block();
            if let Some(data_iter) = &mut self.data_iter {
                data_iter.seek_to_first();
            }
        }
    }

    fn skip_empty_backward(&mut self) {
        while self.data_iter.as_ref().is_none_or(|d| !d.valid()) {
            if !self.index_iter.valid() {
                self.data_iter = None;
                return;
            }
            self.index_iter.prev();
            self.init_data_block();
            if let Some(data_iter) = &mut self.data_iter {
                data_iter.seek_to_last();
            }
        }
    }
}

impl<'a> OrderedIterator for TwoLevelIterator<'a> {
    fn valid(&self) -> bool {
        self.data_iter.as_ref().is_some_and(|d| d.valid())
    }

    fn seek_to_first(&mut self) {
        self.index_iter.seek_to_first();
        self.init_data_block();
        if let Some(data_iter) = &mut self.data_iter {
            data_iter.seek_to_first();
        }
        self.skip_empty_forward();
    }

    fn seek_to_last(&mut self) {
        self.index_iter.seek_to_last();
        self.init_data_block();
        if let Some(data_iter) = &mut self.data_iter {
            data_iter.seek_to_last();
        }
        self.skip_empty_backward();
    }

    fn seek(&mut self, target: &[u8]) {
        self.index_iter.seek(target);
        self.init_data_block();
        if let Some(data_iter) = &mut self.data_iter {
            data_iter.seek(target);
        }
        self.skip_empty_forward();
    }

    fn next(&mut self) {
        if self.status().is_err() {
            return;
        }
        assert!(self.valid(), "next on invalid two-level iterator");
        self.data_iter.as_mut().unwrap().next();
        self.skip_empty_forward();
    }

    fn prev(&mut self) {
        if self.status().is_err() {
            return;
        }
        assert!(self.valid(), "prev on invalid two-level iterator");
        self.data_iter.as_mut().unwrap().prev();
        self.skip_empty_backward();
    }

    fn key(&self) -> &[u8] {
        self.data_iter.as_ref().expect("key on invalid two-level iterator").key()
    }

    fn value(&self) -> &[u8] {
        self.data_iter.as_ref().expect("value on invalid two-level iterator").value()
    }

    fn status(&self) -> Result<()> {
        if let Some(e) = &self.status {
            return Err(Error::Corruption(e.to_string()));
        }
        self.index_iter.status()?;
        if let Some(data_iter) = &self.data_iter {
            data_iter.status()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::{Env, MemEnv};
    use crate::options::Options;
    use crate::table::builder::TableBuilder;
    use std::path::Path;

    fn open_table(entries: &[(&[u8], &[u8])], block_size: usize) -> (MemEnv, Options) {
        let env = MemEnv::new();
        let path = Path::new("/tl.sst");
        let options = Options { block_restart_interval: 2, block_size, ..Options::default() };
        let file = env.new_writable_file(path).unwrap();
        let mut builder = TableBuilder::new(options.clone(), file);
        for (k, v) in entries {
            builder.add(k, v);
        }
        builder.finish().unwrap();
        (env, options)
    }

    fn load(env: &MemEnv, options: Options) -> Table {
        let path = Path::new("/tl.sst");
        let size = env.get_file_size(path).unwrap();
        let file = env.new_random_access_file(path).unwrap();
        Table::open(options, file, size).unwrap()
    }

    #[test]
    fn forward_and_backward_iteration_span_multiple_blocks() {
        let entries: Vec<(&[u8], &[u8])> = (0..20)
            .map(|i| (Box::leak(format!("key{i:03}").into_boxed_str()).as_bytes(), b"v" as &[u8]))
            .collect();
        let (env, options) = open_table(&entries, 24);
        let table = load(&env, options);

        let mut it = table.new_iterator(ReadOptions::default());
        it.seek_to_first();
        let mut forward = Vec::new();
        while it.valid() {
            forward.push(it.key().to_vec());
            it.next();
        }
        assert_eq!(forward.len(), 20);

        it.seek_to_last();
        let mut backward = Vec::new();
        while it.valid() {
            backward.push(it.key().to_vec());
            it.prev();
        }
        backward.reverse();
        assert_eq!(forward, backward);
    }

    #[test]
    fn seek_lands_on_first_key_greater_or_equal_across_blocks() {
        let entries: Vec<(&[u8], &[u8])> =
            vec![(b"a", b"1"), (b"c", b"2"), (b"e", b"3"), (b"g", b"4"), (b"i", b"5")];
        let (env, options) = open_table(&entries, 16);
        let table = load(&env, options);

        let mut it = table.new_iterator(ReadOptions::default());
        it.seek(b"d");
        assert_eq!(it.key(), b"e");

        it.seek(b"z");
        assert!(!it.valid());
    }
}
