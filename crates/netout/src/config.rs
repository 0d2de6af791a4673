//! Tunable constants and runtime configuration
//!
//! Two knobs govern the subsystem's core trade-offs:
//!
//! - [`FREE_LIST_CAPACITY`] bounds the number of reusable message blocks
//!   kept resident per pooled type. More capacity means fewer heap trips
//!   under bursty load at the cost of steady-state memory. The capacity is
//!   a compile-time constant because the free lists are `static`s sized by
//!   it.
//! - The autosend delay is the batching window: every registered
//!   connection's pending bytes are flushed at most this long after they
//!   were written, and many small writes inside the window coalesce into
//!   one send. It is runtime-configurable per pool via [`PoolConfig`].

use std::time::Duration;

/// Maximum number of recycled blocks a free list keeps resident.
///
/// Pushes beyond this bound release blocks to the heap instead.
pub const FREE_LIST_CAPACITY: usize = 2048;

/// Default delay between successive autosend flush passes.
pub const AUTOSEND_DELAY: Duration = Duration::from_millis(10);

/// Fixed capacity of one outbound message buffer, in bytes.
pub const MESSAGE_BUFFER_CAPACITY: usize = 16 * 1024;

/// Runtime configuration for a [`MessagePool`](crate::MessagePool)
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Delay between successive flush passes while connections are
    /// registered for autosend
    pub autosend_delay: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self { autosend_delay: AUTOSEND_DELAY }
    }
}

impl PoolConfig {
    /// Set the autosend delay
    pub fn with_autosend_delay(mut self, delay: Duration) -> Self {
        self.autosend_delay = delay;
        self
    }
}
