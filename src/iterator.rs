//! Shared ordered-iterator abstraction (spec §4.8, §4.9: "a common
//! ordered-iterator abstraction that supports merging"), grounded in
//! `original_source/iterator.go`'s `Iterator` interface.
//!
//! Every ordered view this crate exposes — a skip list, a memtable, a
//! data/index block, a two-level table, or a merge of several of
//! those — implements [`OrderedIterator`] so that two-level iteration
//! and merging can be written once, polymorphically, instead of once
//! per concrete source.

use crate::error::Result;

/// A bidirectional, seekable, pull-based cursor over `(key, value)`
/// pairs in comparator order.
///
/// Positioning (`seek_to_first`, `seek_to_last`, `seek`) and
/// `next`/`prev` define a state machine; `key`/`value` are only
/// meaningful while [`valid`](OrderedIterator::valid) returns `true`.
/// Calling `next`/`prev`/`key`/`value` on an invalid iterator is a
/// programming error (spec §4.2, §7) and implementations panic rather
/// than return a `Result`.
pub trait OrderedIterator {
    /// Whether the iterator is currently positioned at an entry.
    fn valid(&self) -> bool;

    /// Positions at the first entry, if any.
    fn seek_to_first(&mut self);

    /// Positions at the last entry, if any.
    fn seek_to_last(&mut self);

    /// Positions at the first entry with key `>= target`.
    fn seek(&mut self, target: &[u8]);

    /// Advances to the next entry. Requires `valid()`.
    fn next(&mut self);

    /// Moves to the previous entry. Requires `valid()`.
    fn prev(&mut self);

    /// The current entry's key. Requires `valid()`.
    fn key(&self) -> &[u8];

    /// The current entry's value. Requires `valid()`.
    fn value(&self) -> &[u8];

    /// Corruption observed mid-iteration (spec §7): once an
    /// implementation detects corruption it reports `!valid()` and
    /// further positioning calls become no-ops; `status` surfaces the
    /// underlying error rather than panicking.
    fn status(&self) -> Result<()> {
        Ok(())
    }
}
