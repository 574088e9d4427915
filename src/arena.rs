//! Bump allocator over fixed-size blocks (spec §4.1), grounded in
//! `original_source/arena.go`.
//!
//! Unlike the Go port's global `-arena_block_size` flag, the block
//! size is a per-[`Arena`] constructor argument — this crate has no
//! process entry point to parse flags for.
//!
//! # Why `unsafe`
//!
//! The skip list needs node key bytes that stay valid for the whole
//! arena's lifetime while the arena keeps handing out further
//! allocations — a shape no safe `&mut self` API can express, because
//! each outstanding allocation would have to borrow the arena
//! exclusively forever. [`Arena::allocate`] instead takes `&self` and
//! returns a slice whose lifetime is tied to that shared reference, the
//! same shape `bumpalo::Bump::alloc` uses. Soundness rests on two
//! invariants upheld entirely within this module: every block is a
//! `Box<[u8]>` whose heap address never moves once created, and
//! `blocks` is append-only, so a pointer handed out by one call is
//! never invalidated by a later one.

use std::cell::RefCell;
use std::slice;

struct ArenaState {
    blocks: Vec<Box<[u8]>>,
    alloc_ptr: *mut u8,
    alloc_bytes_remaining: usize,
    memory_usage: usize,
}

/// A growable sequence of allocated blocks handing out byte regions
/// that live until the arena itself is dropped (spec §3 "Arena").
pub struct Arena {
    block_size: usize,
    state: RefCell<ArenaState>,
}

const DEFAULT_BLOCK_SIZE: usize = 4 * 1024;

impl Default for Arena {
    fn default() -> Self {
        Arena::with_block_size(DEFAULT_BLOCK_SIZE)
    }
}

impl Arena {
    /// Builds an arena with the default 4 KiB block size.
    pub fn new() -> Self {
        Arena::default()
    }

    /// Builds an arena whose non-oversized allocations are carved from
    /// `block_size`-byte blocks.
    pub fn with_block_size(block_size: usize) -> Self {
        assert!(block_size > 0, "arena block size must be positive");
        Arena {
            block_size,
            state: RefCell::new(ArenaState {
                blocks: Vec::new(),
                alloc_ptr: std::ptr::null_mut(),
                alloc_bytes_remaining: 0,
                memory_usage: 0,
            }),
        }
    }

    /// Returns `n` freshly allocated, zero-initialized bytes.
    ///
    /// `n == 0` returns an empty slice without touching arena state.
    /// `n` is always non-negative in this API (it is a `usize`); a
    /// caller attempting to allocate a negative byte count has no way
    /// to express that here, consistent with spec §4.1 treating it as
    /// a programming error rather than a recoverable one.
    pub fn allocate(&self, n: usize) -> &mut [u8] {
        if n == 0 {
            return &mut [];
        }

        let mut state = self.state.borrow_mut();
        let ptr = if n <= state.alloc_bytes_remaining {
            let p = state.alloc_ptr;
            // SAFETY: `alloc_bytes_remaining` bytes starting at
            // `alloc_ptr` belong to the active block and have not been
            // handed out yet.
            state.alloc_ptr = unsafe { state.alloc_ptr.add(n) };
            state.alloc_bytes_remaining -= n;
            p
        } else {
            self.allocate_fallback(&mut state, n)
        };

        // SAFETY: `ptr` addresses `n` bytes owned by a `Box<[u8]>` in
        // `state.blocks`, which outlives `self` and is never moved or
        // reused; `state`'s borrow is dropped before returning, so no
        // `&mut Arena` alias of this region can be created concurrently
        // under the single-writer model spec §5 assumes.
        unsafe { slice::from_raw_parts_mut(ptr, n) }
    }

    fn allocate_fallback(&self, state: &mut ArenaState, n: usize) -> *mut u8 {
        if n > self.block_size / 4 {
            // Large allocations get a dedicated block and do not
            // become the active block, so they never waste the
            // remainder of a shared block.
            return Self::new_block(state, n);
        }

        let block_size = self.block_size;
        let ptr = Self::new_block(state, block_size);
        state.alloc_ptr = unsafe { ptr.add(n) };
        state.alloc_bytes_remaining = block_size - n;
        ptr
    }

    fn new_block(state: &mut ArenaState, n: usize) -> *mut u8 {
        let mut block: Box<[u8]> = vec![0u8; n].into_boxed_slice();
        let ptr = block.as_mut_ptr();
        state.memory_usage += n;
        state.blocks.push(block);
        ptr
    }

    /// Total bytes acquired from the underlying allocator across every
    /// block, not the bytes actually handed out to callers.
    pub fn memory_usage(&self) -> usize {
        self.state.borrow().memory_usage
    }
}

// An `Arena`'s blocks are heap-owned and never aliased across threads
// without external synchronization; `RefCell` makes it `!Sync`, which
// matches spec §5's single-writer model directly instead of requiring
// callers to uphold it by convention.

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocations_never_alias() {
        let arena = Arena::with_block_size(64);
        let a = arena.allocate(16);
        a.copy_from_slice(&[1u8; 16]);
        let b = arena.allocate(16);
        b.copy_from_slice(&[2u8; 16]);
        assert_eq!(arena.allocate(0).len(), 0);
        // Re-borrow by re-allocating nothing; verify earlier writes
        // were not clobbered by the later allocation.
        let check_a = unsafe { slice::from_raw_parts(a.as_ptr(), 16) };
        assert_eq!(check_a, &[1u8; 16]);
    }

    #[test]
    fn oversized_allocation_gets_dedicated_block() {
        let arena = Arena::with_block_size(64);
        let big = arena.allocate(100);
        assert_eq!(big.len(), 100);
        // A subsequent small allocation must not have been served from
        // the oversized block (which never becomes active).
        let small = arena.allocate(8);
        assert_eq!(small.len(), 8);
        assert_eq!(arena.memory_usage(), 100 + 64);
    }

    #[test]
    fn memory_usage_bounds_match_spec() {
        // spec §8 property 1, seed 71, 100 draws in [1, 8192) (scenario S1).
        let block_size = 4096usize;
        let arena = Arena::with_block_size(block_size);
        let mut rng_state = 71u64;
        let mut upper_bound = 0usize;
        for _ in 0..100 {
            rng_state = rng_state.wrapping_mul(6364136223846793005).wrapping_add(1);
            let n = 1 + (rng_state % 8191) as usize;
            let region = arena.allocate(n);
            assert_eq!(region.len(), n);
            upper_bound += n.div_ceil(block_size) * block_size;
        }
        assert!(arena.memory_usage() <= upper_bound + block_size);
    }
}
