//! In-memory mutable table backed by a skip list (spec §3 "Memtable",
//! §4.3), grounded in `original_source/memtable/memtable.go`.
//!
//! Records are stored in the skip list as
//! `varint(internal_key_len) || user_key || tag(8B LE) || varint(value_len) || value`
//! (the "memtable key" format); the skip list itself only ever compares
//! these blobs through [`MemtableComparator`], which strips the varint
//! prefix before delegating to the internal-key comparator — exactly
//! `memtable.go`'s `keyComparator`.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::coding::{get_fixed64, get_varint32, put_fixed64, put_varint32};
use crate::comparator::Comparator;
use crate::iterator::OrderedIterator;
use crate::key::{pack_tag, unpack_tag, InternalKeyComparator, LookupKey, ValueType};
use crate::skiplist::{SkipList, SkipListIterator};

/// The outcome of a memtable point lookup (spec §4.3), distinguishing
/// a live value, an explicit tombstone, and the absence of any record
/// — the Go port collapses the latter two into a single error, but
/// spec §8 property 3 requires the distinction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupResult {
    /// A live value was found.
    Found(Vec<u8>),
    /// The most recent record for this key (at or before the snapshot)
    /// is a deletion marker.
    Deleted,
    /// No record for this key exists at or before the snapshot.
    NotFound,
}

/// Strips the `varint(len) || bytes` prefix used by the skip list's
/// opaque key blobs, returning the `bytes` portion.
fn length_prefixed_slice(buf: &[u8]) -> &[u8] {
    let (len, n) = get_varint32(buf).expect("corrupt memtable entry: bad length prefix");
    &buf[n..n + len as usize]
}

struct MemtableComparator {
    icmp: InternalKeyComparator,
}

impl Comparator for MemtableComparator {
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        self.icmp.compare(length_prefixed_slice(a), length_prefixed_slice(b))
    }

    fn name(&self) -> &'static str {
        self.icmp.name()
    }

    fn find_shortest_separator(&self, a: &[u8], limit: &[u8]) -> Vec<u8> {
        self.icmp.find_shortest_separator(a, limit)
    }

    fn find_shortest_successor(&self, key: &[u8]) -> Vec<u8> {
        self.icmp.find_shortest_successor(key)
    }
}

/// A mutable, sorted, in-memory table of internal-keyed records
/// (spec §4.3).
pub struct Memtable {
    user_comparator: Arc<dyn Comparator>,
    list: SkipList,
}

impl Memtable {
    /// Builds an empty memtable ordering user keys with `user_comparator`.
    pub fn new(user_comparator: Arc<dyn Comparator>) -> Self {
        let icmp = InternalKeyComparator::new(user_comparator.clone());
        let mem_comparator = Arc::new(MemtableComparator { icmp });
        Memtable { user_comparator, list: SkipList::new(mem_comparator) }
    }

    /// Approximate memory consumed by this memtable's arena, used by a
    /// higher layer to decide when to roll over to a new memtable.
    pub fn approximate_memory_usage(&self) -> usize {
        self.list.arena().memory_usage()
    }

    /// Records `key -> value` (or a tombstone, for [`ValueType::Deletion`])
    /// at `sequence`.
    pub fn add(&self, sequence: u64, value_type: ValueType, key: &[u8], value: &[u8]) {
        let internal_key_len = key.len() + 8;
        let mut buf = Vec::with_capacity(5 + internal_key_len + 5 + value.len());
        put_varint32(&mut buf, internal_key_len as u32);
        buf.extend_from_slice(key);
        put_fixed64(&mut buf, pack_tag(sequence, value_type));
        put_varint32(&mut buf, value.len() as u32);
        buf.extend_from_slice(value);
        self.list.insert(&buf);
    }

    /// Looks up the newest record for `lookup_key.user_key()` at or
    /// before `lookup_key`'s snapshot sequence (spec §4.3).
    pub fn get(&self, lookup_key: &LookupKey) -> LookupResult {
        let mut iter = self.list.iter();
        iter.seek(lookup_key.memtable_key());
        if !iter.valid() {
            return LookupResult::NotFound;
        }

        let entry = iter.key();
        let (internal_key_len, n) = get_varint32(entry).expect("corrupt memtable entry: bad length prefix");
        let internal_key_len = internal_key_len as usize;
        let user_key_end = n + internal_key_len - 8;
        let found_user_key = &entry[n..user_key_end];

        if self.user_comparator.compare(found_user_key, lookup_key.user_key()) != Ordering::Equal {
            return LookupResult::NotFound;
        }

        let tag = get_fixed64(&entry[user_key_end..user_key_end + 8]).expect("corrupt memtable entry: bad tag");
        let (_, value_type) = unpack_tag(tag).expect("corrupt memtable entry: bad value type");
        match value_type {
            ValueType::Deletion => LookupResult::Deleted,
            ValueType::Value => {
                let value_start = user_key_end + 8;
                let (value_len, vn) =
                    get_varint32(&entry[value_start..]).expect("corrupt memtable entry: bad value length");
                let value = &entry[value_start + vn..value_start + vn + value_len as usize];
                LookupResult::Found(value.to_vec())
            }
        }
    }

    /// An iterator over this memtable's records, exposing internal keys
    /// (`user_key || tag`) and plain values — the format every other
    /// [`crate::iterator::OrderedIterator`] in this crate uses, so a
    /// memtable iterator can sit directly among a merging iterator's
    /// children (spec §4.9).
    pub fn iter(&self) -> MemtableIterator<'_> {
        MemtableIterator { inner: self.list.iter() }
    }
}

/// An internal-key/value view over a [`Memtable`]'s skip list.
pub struct MemtableIterator<'a> {
    inner: SkipListIterator<'a>,
}

impl<'a> OrderedIterator for MemtableIterator<'a> {
    fn valid(&self) -> bool {
        self.inner.valid()
    }

    fn seek_to_first(&mut self) {
        self.inner.seek_to_first();
    }

    fn seek_to_last(&mut self) {
        self.inner.seek_to_last();
    }

    fn seek(&mut self, target: &[u8]) {
        let mut memtable_key = Vec::with_capacity(target.len() + 5);
        put_varint32(&mut memtable_key, target.len() as u32);
        memtable_key.extend_from_slice(target);
        self.inner.seek(&memtable_key);
    }

    fn next(&mut self) {
        self.inner.next();
    }

    fn prev(&mut self) {
        self.inner.prev();
    }

    fn key(&self) -> &[u8] {
        length_prefixed_slice(self.inner.key())
    }

    fn value(&self) -> &[u8] {
        let entry = self.inner.key();
        let internal_key = length_prefixed_slice(entry);
        let (_, n) = get_varint32(entry).expect("corrupt memtable entry: bad length prefix");
        let value_start = n + internal_key.len();
        length_prefixed_slice(&entry[value_start..])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparator::BytewiseComparator;

    fn new_memtable() -> Memtable {
        Memtable::new(Arc::new(BytewiseComparator))
    }

    #[test]
    fn found_after_add() {
        let mt = new_memtable();
        mt.add(1, ValueType::Value, b"key", b"value");
        let result = mt.get(&LookupKey::new(b"key", 10));
        assert_eq!(result, LookupResult::Found(b"value".to_vec()));
    }

    #[test]
    fn not_found_for_missing_key() {
        let mt = new_memtable();
        mt.add(1, ValueType::Value, b"key", b"value");
        assert_eq!(mt.get(&LookupKey::new(b"other", 10)), LookupResult::NotFound);
    }

    #[test]
    fn deletion_is_distinct_from_not_found() {
        let mt = new_memtable();
        mt.add(1, ValueType::Value, b"key", b"value");
        mt.add(2, ValueType::Deletion, b"key", b"");
        assert_eq!(mt.get(&LookupKey::new(b"key", 10)), LookupResult::Deleted);
    }

    #[test]
    fn snapshot_sees_newest_record_at_or_before_sequence() {
        let mt = new_memtable();
        mt.add(1, ValueType::Value, b"key", b"v1");
        mt.add(5, ValueType::Value, b"key", b"v5");
        mt.add(9, ValueType::Value, b"key", b"v9");

        assert_eq!(mt.get(&LookupKey::new(b"key", 6)), LookupResult::Found(b"v5".to_vec()));
        assert_eq!(mt.get(&LookupKey::new(b"key", 100)), LookupResult::Found(b"v9".to_vec()));
    }

    #[test]
    fn iterator_exposes_internal_keys_in_order() {
        let mt = new_memtable();
        mt.add(1, ValueType::Value, b"b", b"2");
        mt.add(1, ValueType::Value, b"a", b"1");
        let mut it = mt.iter();
        it.seek_to_first();
        let (user_a, _) = crate::key::split_internal_key(it.key()).unwrap();
        assert_eq!(user_a, b"a");
        assert_eq!(it.value(), b"1");
        it.next();
        let (user_b, _) = crate::key::split_internal_key(it.key()).unwrap();
        assert_eq!(user_b, b"b");
        assert_eq!(it.value(), b"2");
    }
}
