//! N-way merging iterator (spec §3 "Merging iterator", §4.9), grounded
//! in `original_source/merger.go`.
//!
//! Ties are broken by child index: when two children are both
//! positioned at an equal key, the lowest-index child's entry is
//! surfaced, matching the Go port's linear scan order.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::comparator::Comparator;
use crate::error::Result;
use crate::iterator::OrderedIterator;

#[derive(PartialEq, Eq, Clone, Copy)]
enum Direction {
    Forward,
    Reverse,
}

/// Merges several already-ordered iterators into a single ordered view.
///
/// Built once from a fixed set of children; the merge itself does not
/// own or dedupe by user key (spec §4.9: a higher layer is responsible
/// for hiding obsolete versions by user key, same as in the Go port).
pub struct MergingIterator<'a> {
    comparator: Arc<dyn Comparator>,
    children: Vec<Box<dyn OrderedIterator + 'a>>,
    current: Option<usize>,
    direction: Direction,
}

impl<'a> MergingIterator<'a> {
    /// Builds a merge of `children`, ordered by `comparator`. Initially
    /// invalid; call a positioning method before reading.
    pub fn new(comparator: Arc<dyn Comparator>, children: Vec<Box<dyn OrderedIterator + 'a>>) -> Self {
        MergingIterator { comparator, children, current: None, direction: Direction::Forward }
    }

    fn find_smallest(&self) -> Option<usize> {
        let mut smallest: Option<usize> = None;
        for i in 0..self.children.len() {
            if !self.children[i].valid() {
                continue;
            }
            smallest = match smallest {
                None => Some(i),
                Some(s) => {
                    if self.comparator.compare(self.children[i].key(), self.children[s].key()) == Ordering::Less {
                        Some(i)
                    } else {
                        Some(s)
                    }
                }
            };
        }
        smallest
    }

    fn find_largest(&self) -> Option<usize> {
        let mut largest: Option<usize> = None;
        for i in 0..self.children.len() {
            if !self.children[i].valid() {
                continue;
            }
            largest = match largest {
                None => Some(i),
                Some(l) => {
                    if self.comparator.compare(self.children[i].key(), self.children[l].key()) == Ordering::Greater {
                        Some(i)
                    } else {
                        Some(l)
                    }
                }
            };
        }
        largest
    }
}

impl<'a> OrderedIterator for MergingIterator<'a> {
    fn valid(&self) -> bool {
        self.current.is_some()
    }

    fn seek_to_first(&mut self) {
        for child in &mut self.children {
            child.seek_to_first();
        }
        self.direction = Direction::Forward;
        self.current = self.find_smallest();
    }

    fn seek_to_last(&mut self) {
        for child in &mut self.children {
            child.seek_to_last();
        }
        self.direction = Direction::Reverse;
        self.current = self.find_largest();
    }

    fn seek(&mut self, target: &[u8]) {
        for child in &mut self.children {
            child.seek(target);
        }
        self.direction = Direction::Forward;
        self.current = self.find_smallest();
    }

    fn next(&mut self) {
        let current = self.current.expect("next on invalid merging iterator");

        if self.direction != Direction::Forward {
            let key = self.key().to_vec();
            for i in 0..self.children.len() {
                if i == current {
                    continue;
                }
                let child = &mut self.children[i];
                child.seek(&key);
                if child.valid() && self.comparator.compare(child.key(), &key) == Ordering::Equal {
                    child.next();
                }
            }
            self.direction = Direction::Forward;
        }

        self.children[current].next();
        self.current = self.find_smallest();
    }

    fn prev(&mut self) {
        let current = self.current.expect("prev on invalid merging iterator");

        if self.direction != Direction::Reverse {
            let key = self.key().to_vec();
            for i in 0..self.children.len() {
                if i == current {
                    continue;
                }
                let child = &mut self.children[i];
                child.seek(&key);
                if child.valid() {
                    child.prev();
                } else {
                    child.seek_to_last();
                }
            }
            self.direction = Direction::Reverse;
        }

        self.children[current].prev();
        self.current = self.find_largest();
    }

    fn key(&self) -> &[u8] {
        self.children[self.current.expect("key on invalid merging iterator")].key()
    }

    fn value(&self) -> &[u8] {
        self.children[self.current.expect("value on invalid merging iterator")].value()
    }

    fn status(&self) -> Result<()> {
        for child in &self.children {
            child.status()?;
        }
        Ok(())
    }
}
