//! Total ordering over byte strings, plus key-shrinking hints used by
//! the block builder's index (spec §3).

use std::cmp::Ordering;

/// A total order over byte strings with separator/successor hints.
///
/// `find_shortest_separator`/`find_shortest_successor` let a table
/// builder store a shorter key than the true boundary in its index
/// block, provided the shortened key still partitions the keyspace
/// correctly; see spec §9(a) — this crate enables the optimization.
pub trait Comparator: Send + Sync {
    /// Orders `a` relative to `b`.
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering;

    /// The comparator's name, embedded in on-disk metadata (spec §6).
    fn name(&self) -> &'static str;

    /// Returns a key `s` with `a <= s < b`, possibly shorter than both.
    ///
    /// `a` must compare less than `b`. Implementations that cannot
    /// shorten may return `a` unchanged.
    fn find_shortest_separator(&self, a: &[u8], limit: &[u8]) -> Vec<u8>;

    /// Returns a key `s >= key`, possibly shorter than `key`.
    fn find_shortest_successor(&self, key: &[u8]) -> Vec<u8>;
}

/// Plain lexicographic (memcmp) ordering over raw bytes.
///
/// Grounded in `original_source/comparator.go`'s `byteWiseComparator`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BytewiseComparator;

impl Comparator for BytewiseComparator {
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        a.cmp(b)
    }

    fn name(&self) -> &'static str {
        "leveldb.BytewiseComparator"
    }

    fn find_shortest_separator(&self, a: &[u8], limit: &[u8]) -> Vec<u8> {
        let min_len = a.len().min(limit.len());
        let diff_index = (0..min_len).find(|&i| a[i] != limit[i]).unwrap_or(min_len);

        if diff_index >= min_len {
            // One is a prefix of the other; no shortening is possible.
            return a.to_vec();
        }

        let diff_byte = a[diff_index];
        if diff_byte < 0xff && diff_byte + 1 < limit[diff_index] {
            let mut separator = a[..=diff_index].to_vec();
            separator[diff_index] += 1;
            debug_assert_eq!(self.compare(&separator, limit), Ordering::Less);
            separator
        } else {
            a.to_vec()
        }
    }

    fn find_shortest_successor(&self, key: &[u8]) -> Vec<u8> {
        for i in 0..key.len() {
            if key[i] != 0xff {
                let mut successor = key[..=i].to_vec();
                successor[i] += 1;
                return successor;
            }
        }
        // Every byte is 0xff; no shorter successor exists.
        key.to_vec()
    }
}
