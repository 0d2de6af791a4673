//! Pooled allocation for outbound messages
//!
//! Three layers, leaves first:
//!
//! - [`FreeList`]: bounded lock-free LIFO of raw storage blocks, the only
//!   structure in the subsystem touched concurrently by many threads.
//! - [`PooledAllocator`] / [`MessageAllocator`]: single-object allocation
//!   preferring recycled blocks, with silent heap fallback both ways.
//! - [`Pooled`] / [`MessageRef`]: shared-ownership handles whose combined
//!   control-plus-value block returns to the free list on last drop, from
//!   whichever thread that happens.

mod allocator;
mod free_list;
mod shared;

pub use allocator::{MessageAllocator, MessageRef, PooledAllocator};
pub use free_list::FreeList;
pub use shared::{Pooled, shared_block_layout};
