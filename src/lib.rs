//! # lsmcore
//!
//! The core, engine-agnostic building blocks of an LSM-tree storage
//! engine: a bump-allocating arena, a concurrent-reader skip list and
//! the memtable built on it, the on-disk SSTable format (prefix-
//! compressed blocks, a bloom filter block, a two-level iterator), an
//! N-way merging iterator, write-ahead log record framing, and the
//! filesystem abstraction everything above is written against.
//!
//! ## What this crate is not
//!
//! There is no database façade here: no `Engine::open`/`get`/`put`, no
//! version/manifest bookkeeping, no compaction controller, no
//! command-line tool. Those live one layer up, composed from the
//! pieces below. The block cache referenced by [`options::ReadOptions`]
//! is a seam, not an implementation — this crate never allocates one.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`arena`] | Bump allocator backing skip-list node and key storage |
//! | [`skiplist`] | Concurrent-reader skip list ordered by a [`comparator::Comparator`] |
//! | [`memtable`] | In-memory write buffer: internal-key encoding over a skip list |
//! | [`key`] | Internal-key packing (`user_key \|\| tag`) and the internal-key comparator |
//! | [`table`] | SST block format, builder, reader, filter block, two-level iterator |
//! | [`merge`] | N-way merging iterator over any [`iterator::OrderedIterator`] |
//! | [`log`] | Write-ahead log record writer and corruption-recovering reader |
//! | [`env`] | Filesystem façade (`PosixEnv`, and `MemEnv` for tests) |
//! | [`bloom`] | Bloom filter policy used by the SST filter block |
//! | [`hash`] | The 32-bit hash the bloom filter is built on |
//! | [`comparator`] | Total ordering over byte strings, plus separator/successor hints |
//! | [`coding`] | Varint and fixed-width binary coding primitives |
//! | [`options`] | Tunable `Options`/`ReadOptions`/`WriteOptions` |
//! | [`error`] | The crate-level error type composing each subsystem's own |
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use lsmcore::comparator::BytewiseComparator;
//! use lsmcore::iterator::OrderedIterator;
//! use lsmcore::key::ValueType;
//! use lsmcore::memtable::{LookupResult, Memtable};
//! use lsmcore::key::LookupKey;
//!
//! let memtable = Memtable::new(Arc::new(BytewiseComparator));
//! memtable.add(1, ValueType::Value, b"hello", b"world");
//!
//! match memtable.get(&LookupKey::new(b"hello", 100)) {
//!     LookupResult::Found(value) => assert_eq!(value, b"world"),
//!     _ => unreachable!(),
//! }
//! ```

pub mod arena;
pub mod bloom;
pub mod coding;
pub mod comparator;
pub mod env;
pub mod error;
pub mod hash;
pub mod iterator;
pub mod key;
pub mod log;
pub mod memtable;
pub mod merge;
pub mod options;
pub mod skiplist;
pub mod table;

pub use error::{Error, Result};
