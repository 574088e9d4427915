//! Internal key packing (spec §3): `user_key || tag`, where
//! `tag = (sequence << 8) | type`, plus the derived comparator and the
//! lookup-key buffer layout, grounded in `original_source/dbformat.go`.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::coding::{put_fixed64, put_varint32};
use crate::comparator::Comparator;

/// A deletion marker or a live value (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ValueType {
    /// A tombstone record.
    Deletion = 0,
    /// A live value.
    Value = 1,
}

impl ValueType {
    /// Decodes the low byte of a tag.
    pub fn from_u8(b: u8) -> Option<Self> {
        match b {
            0 => Some(ValueType::Deletion),
            1 => Some(ValueType::Value),
            _ => None,
        }
    }
}

/// The value type used when constructing a lookup key for a snapshot
/// read, matching `dbformat.go`'s `LookupKey` construction (it always
/// packs `TypeValue`, regardless of whether the record turns out to
/// be a deletion — the memtable inspects the stored record's own type
/// once it locates it).
pub const VALUE_TYPE_FOR_SEEK: ValueType = ValueType::Value;

/// The largest representable sequence number (56 bits), used when
/// synthesizing a separator/successor internal key that must sort
/// before any real record sharing its shortened user key.
pub const MAX_SEQUENCE_NUMBER: u64 = (1u64 << 56) - 1;

/// Packs `(sequence, value_type)` into the 64-bit little-endian tag.
pub fn pack_tag(sequence: u64, value_type: ValueType) -> u64 {
    (sequence << 8) | (value_type as u64)
}

/// Unpacks a tag into `(sequence, value_type)`.
///
/// Returns `None` if the low byte is not a recognized [`ValueType`].
pub fn unpack_tag(tag: u64) -> Option<(u64, ValueType)> {
    let value_type = ValueType::from_u8((tag & 0xff) as u8)?;
    Some((tag >> 8, value_type))
}

/// Appends an internal key (`user_key || tag` as 8 little-endian bytes)
/// to `buf`.
pub fn append_internal_key(buf: &mut Vec<u8>, user_key: &[u8], sequence: u64, value_type: ValueType) {
    buf.extend_from_slice(user_key);
    put_fixed64(buf, pack_tag(sequence, value_type));
}

/// Splits an internal key into its user-key slice and decoded tag.
///
/// Returns `None` if `internal_key` is shorter than the 8-byte tag.
pub fn split_internal_key(internal_key: &[u8]) -> Option<(&[u8], u64)> {
    if internal_key.len() < 8 {
        return None;
    }
    let split = internal_key.len() - 8;
    let tag_bytes: [u8; 8] = internal_key[split..].try_into().ok()?;
    Some((&internal_key[..split], u64::from_le_bytes(tag_bytes)))
}

/// Orders internal keys by user key ascending, then by tag descending
/// (spec §3: "for equal user keys the newest record appears first").
#[derive(Clone)]
pub struct InternalKeyComparator {
    user_comparator: Arc<dyn Comparator>,
}

impl InternalKeyComparator {
    /// Builds an internal-key comparator delegating user-key order to
    /// `user_comparator`.
    pub fn new(user_comparator: Arc<dyn Comparator>) -> Self {
        InternalKeyComparator { user_comparator }
    }

    /// The comparator used for the user-key portion.
    pub fn user_comparator(&self) -> &Arc<dyn Comparator> {
        &self.user_comparator
    }
}

impl Comparator for InternalKeyComparator {
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        let (a_user, a_tag) = match split_internal_key(a) {
            Some(v) => v,
            None => return a.cmp(b),
        };
        let (b_user, b_tag) = match split_internal_key(b) {
            Some(v) => v,
            None => return a.cmp(b),
        };
        match self.user_comparator.compare(a_user, b_user) {
            Ordering::Equal => b_tag.cmp(&a_tag),
            other => other,
        }
    }

    fn name(&self) -> &'static str {
        "leveldb.InternalKeyComparator"
    }

    fn find_shortest_separator(&self, a: &[u8], limit: &[u8]) -> Vec<u8> {
        let (a_user, _) = match split_internal_key(a) {
            Some(v) => v,
            None => return a.to_vec(),
        };
        let (limit_user, _) = match split_internal_key(limit) {
            Some(v) => v,
            None => return a.to_vec(),
        };

        let shortened = self.user_comparator.find_shortest_separator(a_user, limit_user);
        if shortened.len() < a_user.len()
            && self.user_comparator.compare(a_user, &shortened) == Ordering::Less
        {
            // `tmp` already holds the shortened user key; append a tag
            // with the maximal sequence number so it still sorts ahead
            // of any real record at that user key (LevelDB's
            // `PackSequenceAndType(kMaxSequenceNumber, kValueTypeForSeek)`).
            let mut tmp = shortened;
            put_fixed64(&mut tmp, pack_tag(MAX_SEQUENCE_NUMBER, VALUE_TYPE_FOR_SEEK));
            debug_assert_eq!(self.compare(a, &tmp), Ordering::Less);
            debug_assert_eq!(self.compare(&tmp, limit), Ordering::Less);
            tmp
        } else {
            a.to_vec()
        }
    }

    fn find_shortest_successor(&self, key: &[u8]) -> Vec<u8> {
        let (user_key, _) = match split_internal_key(key) {
            Some(v) => v,
            None => return key.to_vec(),
        };
        let shortened = self.user_comparator.find_shortest_successor(user_key);
        if shortened.len() < user_key.len()
            && self.user_comparator.compare(user_key, &shortened) == Ordering::Less
        {
            let mut tmp = shortened;
            put_fixed64(&mut tmp, pack_tag(MAX_SEQUENCE_NUMBER, VALUE_TYPE_FOR_SEEK));
            debug_assert_eq!(self.compare(key, &tmp), Ordering::Less);
            tmp
        } else {
            key.to_vec()
        }
    }
}

/// The on-stack buffer backing a point lookup (spec §3):
/// `varint(user_key_len + 8) || user_key || tag(snapshot, Value)`.
///
/// Slices of this buffer expose the memtable key (with the varint
/// prefix, as stored in the skip list), the internal key (without the
/// prefix), and the bare user key.
pub struct LookupKey {
    buf: Vec<u8>,
    /// Offset where the internal key (user_key || tag) begins.
    internal_key_start: usize,
}

impl LookupKey {
    /// Builds a lookup key for `user_key` at snapshot `sequence`.
    pub fn new(user_key: &[u8], sequence: u64) -> Self {
        let mut buf = Vec::with_capacity(user_key.len() + 13);
        let internal_len = user_key.len() + 8;
        put_varint32(&mut buf, internal_len as u32);
        let internal_key_start = buf.len();
        append_internal_key(&mut buf, user_key, sequence, VALUE_TYPE_FOR_SEEK);
        LookupKey { buf, internal_key_start }
    }

    /// The memtable key: `varint(internal_key_len) || internal_key`,
    /// exactly as stored as a skip-list entry's key prefix.
    pub fn memtable_key(&self) -> &[u8] {
        &self.buf
    }

    /// The internal key: `user_key || tag`, without the varint prefix.
    pub fn internal_key(&self) -> &[u8] {
        &self.buf[self.internal_key_start..]
    }

    /// The bare user key.
    pub fn user_key(&self) -> &[u8] {
        &self.buf[self.internal_key_start..self.buf.len() - 8]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparator::BytewiseComparator;

    #[test]
    fn tag_round_trip() {
        let tag = pack_tag(42, ValueType::Value);
        assert_eq!(unpack_tag(tag), Some((42, ValueType::Value)));
        let tag = pack_tag(7, ValueType::Deletion);
        assert_eq!(unpack_tag(tag), Some((7, ValueType::Deletion)));
    }

    #[test]
    fn internal_comparator_orders_by_descending_tag_on_tie() {
        let icmp = InternalKeyComparator::new(Arc::new(BytewiseComparator));
        let mut newer = Vec::new();
        append_internal_key(&mut newer, b"k", 5, ValueType::Value);
        let mut older = Vec::new();
        append_internal_key(&mut older, b"k", 1, ValueType::Value);
        assert_eq!(icmp.compare(&newer, &older), Ordering::Less);
    }

    #[test]
    fn internal_comparator_orders_by_user_key_first() {
        let icmp = InternalKeyComparator::new(Arc::new(BytewiseComparator));
        let mut a = Vec::new();
        append_internal_key(&mut a, b"a", 100, ValueType::Value);
        let mut b = Vec::new();
        append_internal_key(&mut b, b"b", 1, ValueType::Value);
        assert_eq!(icmp.compare(&a, &b), Ordering::Less);
    }

    #[test]
    fn lookup_key_exposes_user_key() {
        let lk = LookupKey::new(b"hello", 99);
        assert_eq!(lk.user_key(), b"hello");
        let (user, tag) = split_internal_key(lk.internal_key()).unwrap();
        assert_eq!(user, b"hello");
        assert_eq!(unpack_tag(tag), Some((99, ValueType::Value)));
    }
}
