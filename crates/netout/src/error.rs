//! Error types for the outbound-message subsystem
//!
//! Only two conditions are ever reported as errors: requesting anything
//! other than a single object from a pooled allocator (a contract
//! violation at a layer that never does so through its own call sites),
//! and a genuine out-of-memory from the heap fallback. Everything else in
//! this subsystem degrades silently: deallocating a null pointer or with
//! a wrong count is a no-op, and a free list at capacity simply releases
//! blocks to the heap.

use thiserror::Error;

/// Result type for pool operations
pub type Result<T> = std::result::Result<T, PoolError>;

/// Errors raised by the message pool and its allocators
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    /// A pooled allocator was asked for other than exactly one object
    #[error("pooled allocation supports exactly one object per request, got {requested}")]
    AllocationContract {
        /// Number of objects the caller requested
        requested: usize,
    },

    /// The heap fallback failed to provide storage
    #[error("out of memory: failed to allocate {size} bytes")]
    OutOfMemory {
        /// Size of the failed allocation in bytes
        size: usize,
    },

    /// A write did not fit into a message buffer
    #[error("message buffer full: write of {requested} bytes, {remaining} of {capacity} remaining")]
    BufferFull {
        /// Bytes the write attempted to append
        requested: usize,
        /// Bytes still unused in the buffer
        remaining: usize,
        /// Total buffer capacity
        capacity: usize,
    },
}

impl PoolError {
    /// Create an allocation-contract violation error
    pub fn allocation_contract(requested: usize) -> Self {
        Self::AllocationContract { requested }
    }

    /// Create an out of memory error
    pub fn out_of_memory(size: usize) -> Self {
        Self::OutOfMemory { size }
    }

    /// Create a buffer-full error
    pub fn buffer_full(requested: usize, remaining: usize, capacity: usize) -> Self {
        Self::BufferFull { requested, remaining, capacity }
    }
}
