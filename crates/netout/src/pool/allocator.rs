//! Pooled single-object allocators
//!
//! [`PooledAllocator`] is the generic recycling allocator: it serves
//! exactly one object per request, preferring a block off its free list
//! and falling back to the heap on a miss. [`MessageAllocator`] binds it
//! to the outbound-message type over the process-scoped message free
//! list, the way every message in the system is actually allocated.

use std::alloc::{self, Layout};
use std::fmt;
use std::marker::PhantomData;
use std::ptr::NonNull;

use tracing::debug;

use crate::config::FREE_LIST_CAPACITY;
use crate::error::{PoolError, Result};
use crate::message::OutboundMessage;
use crate::pool::free_list::FreeList;
use crate::pool::shared::{Pooled, shared_block_layout};

/// Shared-ownership handle to an [`OutboundMessage`]
///
/// Cloned when the send path takes over a buffer; the storage returns to
/// the message free list when the last handle drops, from any thread.
pub type MessageRef = Pooled<OutboundMessage>;

/// Process-scoped recycling cache for message blocks. No teardown at exit;
/// [`MessageAllocator::drain_free_list`] is the explicit reset hook.
static MESSAGE_BLOCKS: FreeList<FREE_LIST_CAPACITY> =
    FreeList::new(shared_block_layout::<OutboundMessage>());

/// Capacity-bounded recycling allocator for single objects of type `T`
///
/// A thin, copyable handle over a `static` [`FreeList`] whose block layout
/// is `Layout::new::<T>()`. All instances over the same list are
/// interchangeable: the allocator is stateless with respect to identity,
/// so copying, moving, or re-creating one never invalidates outstanding
/// blocks.
pub struct PooledAllocator<T, const CAP: usize> {
    list: &'static FreeList<CAP>,
    _marker: PhantomData<fn(T) -> T>,
}

impl<T, const CAP: usize> PooledAllocator<T, CAP> {
    /// Bind an allocator for `T` to `list`.
    ///
    /// Panics when the list's block layout does not match `T`.
    pub fn new(list: &'static FreeList<CAP>) -> Self {
        assert_eq!(
            list.block_layout(),
            Layout::new::<T>(),
            "free list layout does not match the allocated type"
        );
        Self { list, _marker: PhantomData }
    }

    /// Obtain uninitialized storage for exactly one `T`.
    ///
    /// Only `count == 1` is supported; any other count is a contract
    /// violation reported as [`PoolError::AllocationContract`]; it means
    /// the adapter is being driven outside its single-object contract.
    /// Construction in the returned storage is the caller's
    /// responsibility.
    pub fn allocate(&self, count: usize) -> Result<NonNull<T>> {
        if count != 1 {
            return Err(PoolError::allocation_contract(count));
        }
        if let Some(block) = self.list.pop() {
            return Ok(block.cast());
        }
        let layout = Layout::new::<T>();
        // SAFETY: the layout is non-zero-sized (FreeList::new rejects
        // zero-sized block layouts).
        let raw = unsafe { alloc::alloc(layout) };
        NonNull::new(raw.cast()).ok_or_else(|| PoolError::out_of_memory(layout.size()))
    }

    /// Return storage for one `T` to the pool.
    ///
    /// A null `ptr` or a `count` other than one is a silent no-op, never
    /// an error. A free list at capacity silently releases the block to
    /// the heap instead.
    ///
    /// # Safety
    ///
    /// A non-null `ptr` with `count == 1` must come from
    /// [`allocate`](Self::allocate) on an equivalent allocator, with the
    /// contained value already dropped (or never constructed), and must
    /// not be used afterwards.
    pub unsafe fn deallocate(&self, ptr: *mut T, count: usize) {
        if count != 1 {
            return;
        }
        let Some(block) = NonNull::new(ptr.cast::<u8>()) else {
            return;
        };
        // SAFETY: caller guarantees the block is an unused allocation of
        // this list's layout.
        if !unsafe { self.list.bounded_push(block) } {
            // SAFETY: the block came from the global allocator with this
            // exact layout.
            unsafe { alloc::dealloc(block.as_ptr(), Layout::new::<T>()) };
        }
    }

    /// The free list backing this allocator
    pub fn free_list(&self) -> &'static FreeList<CAP> {
        self.list
    }
}

impl<T, const CAP: usize> Clone for PooledAllocator<T, CAP> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T, const CAP: usize> Copy for PooledAllocator<T, CAP> {}

impl<T, const CAP: usize> PartialEq for PooledAllocator<T, CAP> {
    fn eq(&self, _other: &Self) -> bool {
        // Stateless identity: any two allocators for the same type are
        // equivalent, so containers carrying one never reallocate when it
        // is copied or rebound.
        true
    }
}

impl<T, const CAP: usize> Eq for PooledAllocator<T, CAP> {}

impl<T, const CAP: usize> fmt::Debug for PooledAllocator<T, CAP> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledAllocator")
            .field("capacity", &CAP)
            .field("cached", &self.list.len())
            .finish()
    }
}

/// Allocator binding for outbound messages
///
/// The shared-ownership wrapper needs one combined control-plus-value
/// block per message; this adapter serves it from the process-scoped
/// message free list, bounding resident reusable storage to
/// [`FREE_LIST_CAPACITY`] blocks.
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageAllocator;

impl MessageAllocator {
    /// Construct a fresh, empty message with exactly one owner.
    pub fn allocate_message() -> Result<MessageRef> {
        Pooled::new_in(OutboundMessage::new(), &MESSAGE_BLOCKS)
    }

    /// Number of message blocks currently cached for reuse
    pub fn free_list_len() -> usize {
        MESSAGE_BLOCKS.len()
    }

    /// Release all cached message blocks to the heap.
    ///
    /// Reset hook for tests and hosts needing deterministic shutdown; must
    /// not run concurrently with message traffic. Returns the number of
    /// blocks released.
    pub fn drain_free_list() -> usize {
        let released = MESSAGE_BLOCKS.drain();
        debug!(released, "drained message free list");
        released
    }
}
