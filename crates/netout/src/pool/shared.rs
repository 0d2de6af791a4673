//! Shared-ownership wrapper over pool-allocated values
//!
//! [`Pooled<T>`] is the subsystem's `Arc` analogue with one difference
//! that matters here: the reference count and the value live in a single
//! combined block drawn from a [`FreeList`]-backed allocator, and when the
//! last reference drops, on whichever thread that happens, the raw block
//! goes back to the originating free list (or to the heap when the list is
//! at capacity).
//!
//! # Safety
//!
//! The refcount discipline mirrors `std::sync::Arc`: relaxed increments on
//! clone (an existing reference keeps the block alive), a release
//! decrement on drop, and an acquire fence before the final teardown so
//! the last owner observes all writes made through other handles.

use std::alloc::{self, Layout};
use std::fmt;
use std::marker::PhantomData;
use std::ops::Deref;
use std::process;
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicUsize, Ordering, fence};

use crate::error::Result;
use crate::pool::allocator::PooledAllocator;
use crate::pool::free_list::{BlockList, FreeList};

/// Past this count something is leaking clones; bail out the way Arc does
/// rather than risk an overflow-induced use-after-free.
const MAX_REFCOUNT: usize = isize::MAX as usize;

/// Combined control-structure-plus-value block. This is the one auxiliary
/// type the shared-ownership wrapper allocates, and it comes from the same
/// pooled-allocation path as everything else.
pub(crate) struct SharedInner<T> {
    refs: AtomicUsize,
    list: &'static dyn BlockList,
    value: T,
}

/// Layout of the combined block a [`Pooled<T>`] occupies.
///
/// A free list meant to back `Pooled<T>` values must be created with this
/// layout, not `Layout::new::<T>()`:
///
/// ```
/// use netout::{FreeList, Pooled, shared_block_layout};
///
/// static BLOCKS: FreeList<16> = FreeList::new(shared_block_layout::<u64>());
///
/// let value = Pooled::new_in(7u64, &BLOCKS).unwrap();
/// assert_eq!(*value, 7);
/// ```
pub const fn shared_block_layout<T>() -> Layout {
    Layout::new::<SharedInner<T>>()
}

/// Shared-ownership handle to a pool-allocated value
pub struct Pooled<T> {
    ptr: NonNull<SharedInner<T>>,
    _marker: PhantomData<SharedInner<T>>,
}

// SAFETY: same reasoning as Arc<T>. The handle can move to (Send) and be
// shared across (Sync) threads whenever T supports both, because any
// thread may end up dropping the value or reading through the handle.
unsafe impl<T: Send + Sync> Send for Pooled<T> {}
unsafe impl<T: Send + Sync> Sync for Pooled<T> {}

impl<T> Pooled<T> {
    /// Construct `value` in a block drawn from `list`, with exactly one
    /// owner (the returned handle).
    ///
    /// Panics when `list` was not created with
    /// [`shared_block_layout::<T>()`](shared_block_layout).
    pub fn new_in<const CAP: usize>(value: T, list: &'static FreeList<CAP>) -> Result<Self> {
        let allocator: PooledAllocator<SharedInner<T>, CAP> = PooledAllocator::new(list);
        let block = allocator.allocate(1)?;
        // SAFETY: `block` is unique, properly aligned, uninitialized
        // storage for one SharedInner<T>.
        unsafe {
            block
                .as_ptr()
                .write(SharedInner { refs: AtomicUsize::new(1), list, value });
        }
        Ok(Self { ptr: block, _marker: PhantomData })
    }

    fn inner(&self) -> &SharedInner<T> {
        // SAFETY: the block stays initialized until the last handle drops,
        // and we hold a handle.
        unsafe { self.ptr.as_ref() }
    }

    /// Number of live handles to this value
    pub fn ref_count(&self) -> usize {
        self.inner().refs.load(Ordering::Acquire)
    }

    /// Whether two handles refer to the same block
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        this.ptr == other.ptr
    }

    /// Raw pointer to the value, for identity checks
    pub fn as_ptr(&self) -> *const T {
        &raw const self.inner().value
    }

    /// Mutable access while this handle is the only owner.
    ///
    /// Returns `None` as soon as a second handle exists: a buffer is either
    /// exclusively being written by its owning connection, or in transit to
    /// the transport, never both.
    pub fn get_mut(&mut self) -> Option<&mut T> {
        if self.inner().refs.load(Ordering::Acquire) == 1 {
            // SAFETY: sole owner plus `&mut self` means no other access.
            Some(unsafe { &mut (*self.ptr.as_ptr()).value })
        } else {
            None
        }
    }
}

impl<T> Deref for Pooled<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner().value
    }
}

impl<T> Clone for Pooled<T> {
    fn clone(&self) -> Self {
        let old = self.inner().refs.fetch_add(1, Ordering::Relaxed);
        if old > MAX_REFCOUNT {
            process::abort();
        }
        Self { ptr: self.ptr, _marker: PhantomData }
    }
}

impl<T> Drop for Pooled<T> {
    fn drop(&mut self) {
        if self.inner().refs.fetch_sub(1, Ordering::Release) != 1 {
            return;
        }
        // Synchronize with every other handle's release decrement before
        // tearing the value down.
        fence(Ordering::Acquire);

        let raw = self.ptr.as_ptr();
        // SAFETY: this was the last handle, so the block is exclusively
        // ours. The list reference is copied out before the value is
        // dropped; refs/list are plain-old-data and need no teardown.
        unsafe {
            let list = (*raw).list;
            ptr::drop_in_place(&raw mut (*raw).value);
            let block = NonNull::new_unchecked(raw.cast::<u8>());
            if !list.bounded_push_erased(block) {
                alloc::dealloc(block.as_ptr(), list.erased_block_layout());
            }
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Pooled<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}
