//! Bounded lock-free LIFO of reusable raw storage blocks
//!
//! # Safety
//!
//! The list never dereferences the block pointers it stores; they are
//! opaque payloads. All list mechanics operate on slot *indices*:
//!
//! - A fixed array of `CAP` slots holds the cached block pointers.
//! - Two Treiber stacks of indices partition the slots into `cached`
//!   (holding a block) and `vacant` (empty), each packed as
//!   `(generation tag, top index)` in a single `AtomicU64`.
//! - The tag increments on every successful CAS, so a stale
//!   `(tag, top, next)` observation can never be installed (no ABA), and
//!   indices never dangle the way recycled node pointers can.
//! - `bounded_push` fails exactly when the vacant stack is empty, which
//!   happens exactly when `CAP` blocks are already cached: the capacity
//!   bound is strict, never approximate.
//!
//! ## Invariants
//!
//! - Every slot index lives on exactly one of the two stacks, or is
//!   privately owned by the single thread that popped it and has not yet
//!   pushed it back.
//! - A cached entry is a pointer to an unused allocation of exactly
//!   `block_layout()` obtained from the global allocator.
//! - The `Release` CAS that publishes an index on `cached` orders the
//!   slot's pointer store before it; the `Acquire` on the consuming pop
//!   observes it.

use std::alloc::{self, Layout};
use std::ptr::NonNull;
use std::sync::atomic::{AtomicPtr, AtomicU32, AtomicU64, AtomicUsize, Ordering};

use crate::utils::Backoff;

/// Sentinel index marking an empty stack
const NIL: u32 = u32::MAX;

const fn pack(tag: u32, top: u32) -> u64 {
    ((tag as u64) << 32) | top as u64
}

const fn unpack(word: u64) -> (u32, u32) {
    ((word >> 32) as u32, word as u32)
}

/// Bounded concurrent LIFO stack of raw, currently-unused storage blocks
/// of one fixed layout
///
/// `new` is `const`, so a list can live in a `static` and serve as the
/// process-scoped recycling cache for one block type:
///
/// ```
/// use std::alloc::Layout;
/// use netout::FreeList;
///
/// static BLOCKS: FreeList<64> = FreeList::new(Layout::new::<[u8; 256]>());
/// assert_eq!(BLOCKS.capacity(), 64);
/// assert_eq!(BLOCKS.len(), 0);
/// ```
///
/// There is no teardown at process exit; environments that need
/// deterministic shutdown call [`FreeList::drain`].
pub struct FreeList<const CAP: usize> {
    /// Stack of slot indices currently holding a cached block
    cached: AtomicU64,
    /// Stack of slot indices currently unused
    vacant: AtomicU64,
    /// Per-slot link to the index below it on its stack
    next: [AtomicU32; CAP],
    /// Cached block pointers, one per slot
    slots: [AtomicPtr<u8>; CAP],
    /// Number of cached blocks, tracked for observability
    len: AtomicUsize,
    layout: Layout,
}

impl<const CAP: usize> FreeList<CAP> {
    /// Create an empty free list for blocks of `layout`.
    ///
    /// Panics at const-evaluation time when `CAP` is zero or out of index
    /// range, or when `layout` is zero-sized.
    pub const fn new(layout: Layout) -> Self {
        assert!(CAP > 0, "free list capacity must be non-zero");
        assert!(CAP < NIL as usize, "free list capacity exceeds index range");
        assert!(layout.size() > 0, "free list blocks must have a non-zero size");

        // Link all slots onto the vacant stack: 0 -> 1 -> ... -> CAP-1.
        let mut next = [const { AtomicU32::new(NIL) }; CAP];
        let mut i = 0;
        while i + 1 < CAP {
            next[i] = AtomicU32::new((i + 1) as u32);
            i += 1;
        }

        Self {
            cached: AtomicU64::new(pack(0, NIL)),
            vacant: AtomicU64::new(pack(0, 0)),
            next,
            slots: [const { AtomicPtr::new(std::ptr::null_mut()) }; CAP],
            len: AtomicUsize::new(0),
            layout,
        }
    }

    /// Pop the most-recently-pushed block, if any.
    ///
    /// The returned storage is uninitialized; constructing a value in it is
    /// the caller's responsibility.
    pub fn pop(&self) -> Option<NonNull<u8>> {
        let slot = self.pop_index(&self.cached)?;
        // The claiming CAS made this thread the slot's exclusive owner.
        let block = self.slots[slot as usize].load(Ordering::Relaxed);
        self.push_index(&self.vacant, slot);
        self.len.fetch_sub(1, Ordering::Relaxed);

        debug_assert!(!block.is_null(), "cached slot held a null block");
        NonNull::new(block)
    }

    /// Try to cache `block` for reuse.
    ///
    /// Returns `false` without touching the block when `CAP` entries are
    /// already held; the caller then releases the block to the heap.
    ///
    /// # Safety
    ///
    /// `block` must point to an unused allocation of exactly
    /// [`block_layout`](Self::block_layout) obtained from the global
    /// allocator, must not already be on the list, and must not be read,
    /// written, or freed by the caller afterwards.
    pub unsafe fn bounded_push(&self, block: NonNull<u8>) -> bool {
        let Some(slot) = self.pop_index(&self.vacant) else {
            return false;
        };
        self.slots[slot as usize].store(block.as_ptr(), Ordering::Relaxed);
        // The Release CAS inside push_index publishes the store above.
        self.push_index(&self.cached, slot);
        self.len.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Release every cached block back to the heap.
    ///
    /// This is the explicit reset hook for tests and hosts that need
    /// deterministic shutdown. Returns the number of blocks released.
    /// Callers must ensure no concurrent pool traffic is in flight, or the
    /// drain races with new pushes and only empties a snapshot.
    pub fn drain(&self) -> usize {
        let mut released = 0;
        while let Some(block) = self.pop() {
            // SAFETY: cached entries are unused allocations of `layout`
            // from the global allocator (bounded_push contract).
            unsafe { alloc::dealloc(block.as_ptr(), self.layout) };
            released += 1;
        }
        released
    }

    /// Number of blocks currently cached
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    /// Whether no blocks are cached
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of cached blocks
    pub const fn capacity(&self) -> usize {
        CAP
    }

    /// Layout of every block on this list
    pub const fn block_layout(&self) -> Layout {
        self.layout
    }

    /// Pop the top index off `stack`, claiming exclusive ownership of it.
    fn pop_index(&self, stack: &AtomicU64) -> Option<u32> {
        let mut backoff = Backoff::new();
        let mut observed = stack.load(Ordering::Acquire);
        loop {
            let (tag, top) = unpack(observed);
            if top == NIL {
                return None;
            }
            // `top` stays a valid slot index even if another thread pops it
            // concurrently, so this read never dangles; a stale `below` is
            // rejected by the tagged CAS.
            let below = self.next[top as usize].load(Ordering::Relaxed);
            let replacement = pack(tag.wrapping_add(1), below);
            match stack.compare_exchange_weak(
                observed,
                replacement,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Some(top),
                Err(current) => {
                    observed = current;
                    backoff.spin();
                }
            }
        }
    }

    /// Push an exclusively-owned index onto `stack`, giving ownership up.
    fn push_index(&self, stack: &AtomicU64, index: u32) {
        let mut backoff = Backoff::new();
        let mut observed = stack.load(Ordering::Acquire);
        loop {
            let (tag, top) = unpack(observed);
            self.next[index as usize].store(top, Ordering::Relaxed);
            let replacement = pack(tag.wrapping_add(1), index);
            match stack.compare_exchange_weak(
                observed,
                replacement,
                Ordering::Release,
                Ordering::Acquire,
            ) {
                Ok(_) => return,
                Err(current) => {
                    observed = current;
                    backoff.spin();
                }
            }
        }
    }
}

/// Capacity-erased view of a [`FreeList`], letting shared-ownership blocks
/// return themselves to whichever list they came from without carrying the
/// list's const-generic capacity in their type.
pub(crate) trait BlockList: Send + Sync {
    /// Same contract as [`FreeList::bounded_push`].
    ///
    /// # Safety
    ///
    /// See [`FreeList::bounded_push`].
    unsafe fn bounded_push_erased(&self, block: NonNull<u8>) -> bool;

    /// Layout of every block on this list
    fn erased_block_layout(&self) -> Layout;
}

impl<const CAP: usize> BlockList for FreeList<CAP> {
    unsafe fn bounded_push_erased(&self, block: NonNull<u8>) -> bool {
        // SAFETY: forwarded contract.
        unsafe { self.bounded_push(block) }
    }

    fn erased_block_layout(&self) -> Layout {
        self.layout
    }
}
