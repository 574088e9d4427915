//! Concurrent-reader skip list for the memtable (spec §3, §4.2),
//! grounded in `original_source/memtable/skiplist.go`.
//!
//! The Go port represents a node as a `reflect`-sized block of raw
//! memory carved from the arena, with forward pointers written
//! directly into that block. Rust's alignment rules make writing a
//! pointer-containing struct into an arbitrarily-aligned byte slice
//! unsound, so nodes here are held in a growable `Vec` and referenced
//! by index instead of by pointer — the representation spec.md's
//! design notes (§9) suggest for implementations with strict
//! ownership. Only key bytes, the actual data the spec's memory
//! accounting is concerned with, live in the [`Arena`]; node headers
//! (the `next` index arrays) are ordinary heap allocations owned by
//! the `SkipList` itself.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::slice;
use std::sync::Arc;

use rand::Rng;

use crate::arena::Arena;
use crate::comparator::Comparator;
use crate::iterator::OrderedIterator;

const MAX_HEIGHT: usize = 12;
const BRANCHING_FACTOR: u32 = 4;

/// Sentinel meaning "no node" in a `next` slot.
const NIL: u32 = u32::MAX;
/// The index permanently reserved for the head sentinel.
const HEAD: u32 = 0;

struct NodeData {
    key_ptr: *const u8,
    key_len: u32,
    next: Vec<u32>,
}

/// An arena-backed, singly-linked probabilistic skip list ordered by a
/// user-supplied [`Comparator`] (spec §4.2).
///
/// Not thread-safe: spec §5's single-writer model applies, and nothing
/// here synchronizes concurrent `insert` calls with each other. Several
/// [`SkipListIterator`]s may read concurrently with a single writer
/// only if the caller upholds that discipline externally; this type
/// itself does no locking.
pub struct SkipList {
    comparator: Arc<dyn Comparator>,
    arena: Arena,
    nodes: RefCell<Vec<NodeData>>,
    max_height: std::cell::Cell<usize>,
}

impl SkipList {
    /// Builds an empty skip list ordering entries with `comparator`.
    pub fn new(comparator: Arc<dyn Comparator>) -> Self {
        let head = NodeData { key_ptr: std::ptr::null(), key_len: 0, next: vec![NIL; MAX_HEIGHT] };
        SkipList {
            comparator,
            arena: Arena::new(),
            nodes: RefCell::new(vec![head]),
            max_height: std::cell::Cell::new(1),
        }
    }

    /// The arena backing this skip list's key storage, exposed so a
    /// memtable built on top can carve its own bookkeeping allocations
    /// from the same pool for an accurate combined memory estimate.
    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    /// Inserts `key`. Does not check for or reject duplicates; callers
    /// needing set semantics must check with [`SkipList::contains`]
    /// first (spec §4.2: "duplicate keys ... are permitted").
    pub fn insert(&self, key: &[u8]) {
        let max_height = self.max_height.get();
        let mut prev = [HEAD; MAX_HEIGHT];
        self.find_greater_or_equal(key, Some(&mut prev));

        let height = self.random_height();
        if height > max_height {
            for slot in prev.iter_mut().take(height).skip(max_height) {
                *slot = HEAD;
            }
            self.max_height.set(height);
        }

        let node = self.new_node(key, height);
        for level in 0..height {
            let next = self.nodes.borrow()[prev[level] as usize].next[level];
            self.nodes.borrow_mut()[node as usize].next[level] = next;
            self.nodes.borrow_mut()[prev[level] as usize].next[level] = node;
        }
    }

    /// Whether an entry comparing equal to `key` exists.
    pub fn contains(&self, key: &[u8]) -> bool {
        match self.find_greater_or_equal(key, None) {
            Some(idx) => self.comparator.compare(self.node_key(idx), key) == Ordering::Equal,
            None => false,
        }
    }

    /// A fresh iterator positioned before the first entry.
    pub fn iter(&self) -> SkipListIterator<'_> {
        SkipListIterator { list: self, current: None }
    }

    fn random_height(&self) -> usize {
        let mut height = 1;
        let mut rng = rand::rng();
        while height < MAX_HEIGHT && rng.random_ratio(1, BRANCHING_FACTOR) {
            height += 1;
        }
        height
    }

    fn node_key(&self, idx: u32) -> &[u8] {
        let (ptr, len) = {
            let nodes = self.nodes.borrow();
            let n = &nodes[idx as usize];
            (n.key_ptr, n.key_len)
        };
        // SAFETY: `ptr` was returned by `self.arena.allocate` and copied
        // into `nodes` once at insertion time; the arena never moves or
        // frees that region while `self` is alive, and `nodes` is
        // append-only, so this slice stays valid for `self`'s lifetime.
        unsafe { slice::from_raw_parts(ptr, len as usize) }
    }

    fn raw_next(&self, idx: u32, level: usize) -> u32 {
        self.nodes.borrow()[idx as usize].next[level]
    }

    fn new_node(&self, key: &[u8], height: usize) -> u32 {
        let region = self.arena.allocate(key.len());
        region.copy_from_slice(key);
        let key_ptr = region.as_ptr();

        let mut nodes = self.nodes.borrow_mut();
        let idx = nodes.len() as u32;
        nodes.push(NodeData { key_ptr, key_len: key.len() as u32, next: vec![NIL; height] });
        idx
    }

    fn key_is_after_node(&self, key: &[u8], n: u32) -> bool {
        n != NIL && self.comparator.compare(self.node_key(n), key) == Ordering::Less
    }

    /// Returns the index of the first node with key `>= key`, or `NIL`
    /// if none. When `prev` is supplied, fills it with the index of the
    /// node immediately preceding the target at each level (used by
    /// `insert`).
    fn find_greater_or_equal(&self, key: &[u8], mut prev: Option<&mut [u32; MAX_HEIGHT]>) -> Option<u32> {
        let mut x = HEAD;
        let mut level = self.max_height.get() - 1;
        loop {
            let next = self.raw_next(x, level);
            if self.key_is_after_node(key, next) {
                x = next;
            } else {
                if let Some(p) = prev.as_deref_mut() {
                    p[level] = x;
                }
                if level == 0 {
                    return if next == NIL { None } else { Some(next) };
                }
                level -= 1;
            }
        }
    }

    /// Returns the index of the last node with key `< key`, or `None`
    /// if no such node exists (i.e. the answer is the head sentinel).
    fn find_less_than(&self, key: &[u8]) -> Option<u32> {
        let mut x = HEAD;
        let mut level = self.max_height.get() - 1;
        loop {
            let next = self.raw_next(x, level);
            if next != NIL && self.comparator.compare(self.node_key(next), key) == Ordering::Less {
                x = next;
            } else if level == 0 {
                return if x == HEAD { None } else { Some(x) };
            } else {
                level -= 1;
            }
        }
    }

    /// Returns the index of the last node in the list, or `None` if empty.
    fn find_last(&self) -> Option<u32> {
        let mut x = HEAD;
        let mut level = self.max_height.get() - 1;
        loop {
            let next = self.raw_next(x, level);
            if next != NIL {
                x = next;
            } else if level == 0 {
                return if x == HEAD { None } else { Some(x) };
            } else {
                level -= 1;
            }
        }
    }

    fn first(&self) -> Option<u32> {
        let next = self.raw_next(HEAD, 0);
        if next == NIL {
            None
        } else {
            Some(next)
        }
    }
}

/// A bidirectional cursor over a [`SkipList`]'s entries (spec §4.2).
pub struct SkipListIterator<'a> {
    list: &'a SkipList,
    current: Option<u32>,
}

impl<'a> OrderedIterator for SkipListIterator<'a> {
    fn valid(&self) -> bool {
        self.current.is_some()
    }

    fn seek_to_first(&mut self) {
        self.current = self.list.first();
    }

    fn seek_to_last(&mut self) {
        self.current = self.list.find_last();
    }

    fn seek(&mut self, target: &[u8]) {
        self.current = self.list.find_greater_or_equal(target, None);
    }

    fn next(&mut self) {
        let cur = self.current.expect("next on invalid skip list iterator");
        let next = self.list.raw_next(cur, 0);
        self.current = if next == NIL { None } else { Some(next) };
    }

    fn prev(&mut self) {
        let cur = self.current.expect("prev on invalid skip list iterator");
        let key = self.list.node_key(cur);
        self.current = self.list.find_less_than(key);
    }

    fn key(&self) -> &[u8] {
        self.list.node_key(self.current.expect("key on invalid skip list iterator"))
    }

    fn value(&self) -> &[u8] {
        // The skip list orders opaque byte strings; callers that need a
        // separate value (the memtable) encode it inside the key blob
        // and decode it themselves (see `crate::memtable`).
        &[]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparator::BytewiseComparator;

    fn new_list() -> SkipList {
        SkipList::new(Arc::new(BytewiseComparator))
    }

    #[test]
    fn insert_and_contains() {
        let list = new_list();
        for key in [b"b".as_slice(), b"d", b"a", b"c"] {
            list.insert(key);
        }
        assert!(list.contains(b"a"));
        assert!(list.contains(b"b"));
        assert!(list.contains(b"c"));
        assert!(list.contains(b"d"));
        assert!(!list.contains(b"z"));
    }

    #[test]
    fn forward_iteration_is_sorted() {
        let list = new_list();
        for key in [b"banana".as_slice(), b"apple", b"cherry", b"date"] {
            list.insert(key);
        }
        let mut it = list.iter();
        it.seek_to_first();
        let mut seen = Vec::new();
        while it.valid() {
            seen.push(it.key().to_vec());
            it.next();
        }
        assert_eq!(seen, vec![b"apple".to_vec(), b"banana".to_vec(), b"cherry".to_vec(), b"date".to_vec()]);
    }

    #[test]
    fn backward_iteration_is_reverse_sorted() {
        let list = new_list();
        for key in [b"banana".as_slice(), b"apple", b"cherry"] {
            list.insert(key);
        }
        let mut it = list.iter();
        it.seek_to_last();
        let mut seen = Vec::new();
        while it.valid() {
            seen.push(it.key().to_vec());
            it.prev();
        }
        assert_eq!(seen, vec![b"cherry".to_vec(), b"banana".to_vec(), b"apple".to_vec()]);
    }

    #[test]
    fn seek_lands_on_first_key_greater_or_equal() {
        let list = new_list();
        for key in [b"a".as_slice(), b"c", b"e"] {
            list.insert(key);
        }
        let mut it = list.iter();
        it.seek(b"b");
        assert!(it.valid());
        assert_eq!(it.key(), b"c");

        it.seek(b"z");
        assert!(!it.valid());
    }

    #[test]
    fn empty_list_iterator_is_never_valid() {
        let list = new_list();
        let mut it = list.iter();
        it.seek_to_first();
        assert!(!it.valid());
        it.seek_to_last();
        assert!(!it.valid());
    }

    #[test]
    fn many_insertions_preserve_order_with_duplicates() {
        let list = new_list();
        let mut keys: Vec<Vec<u8>> = (0..500u32).map(|i| i.to_be_bytes().to_vec()).collect();
        keys.push(250u32.to_be_bytes().to_vec()); // duplicate
        for k in &keys {
            list.insert(k);
        }
        let mut it = list.iter();
        it.seek_to_first();
        let mut prev: Option<Vec<u8>> = None;
        let mut count = 0;
        while it.valid() {
            if let Some(p) = &prev {
                assert!(p.as_slice() <= it.key());
            }
            prev = Some(it.key().to_vec());
            count += 1;
            it.next();
        }
        assert_eq!(count, keys.len());
    }
}
