//! Message pool: buffer acquisition plus the autosend flush cycle
//!
//! Connections that opt into batched delivery register here. While any
//! are registered, a flush task stays armed on the scheduler: each time
//! it fires it walks the registry, hands every non-empty pending buffer
//! to its connection's send path, and re-arms itself iff the registry is
//! still non-empty. An empty registry lets the cycle go dormant until the
//! next registration.
//!
//! Registry mutation and flush passes happen exclusively on the
//! dispatcher thread, enforced by [`DispatcherBound`], so the registry
//! itself carries no lock. Buffer acquisition and release remain
//! lock-free and may come from any thread.

use std::sync::{Arc, Weak};

use tracing::{debug, trace};

use crate::config::PoolConfig;
use crate::dispatcher::DispatcherBound;
use crate::error::Result;
use crate::pool::{MessageAllocator, MessageRef};
use crate::protocol::Protocol;
use crate::scheduler::Scheduler;

/// Registry plus flush arming state, owned by the dispatcher thread as a
/// unit so the at-most-one-armed-task invariant cannot race itself.
#[derive(Default)]
struct AutosendState {
    registry: Vec<Arc<dyn Protocol>>,
    flush_armed: bool,
}

struct PoolShared {
    state: DispatcherBound<AutosendState>,
    scheduler: Arc<dyn Scheduler>,
    config: PoolConfig,
}

/// Pool of outbound message buffers with periodic batched delivery
///
/// Cloning is cheap and shares the same registry and flush cycle.
#[derive(Clone)]
pub struct MessagePool {
    shared: Arc<PoolShared>,
}

impl MessagePool {
    /// Create a pool flushing through `scheduler` with the default
    /// configuration.
    pub fn new(scheduler: Arc<dyn Scheduler>) -> Self {
        Self::with_config(scheduler, PoolConfig::default())
    }

    /// Create a pool with a custom configuration.
    pub fn with_config(scheduler: Arc<dyn Scheduler>, config: PoolConfig) -> Self {
        Self {
            shared: Arc::new(PoolShared {
                state: DispatcherBound::new(AutosendState::default()),
                scheduler,
                config,
            }),
        }
    }

    /// Obtain a fresh, empty message buffer with exactly one owner.
    ///
    /// Storage comes off the recycling free list when available, the heap
    /// otherwise; either way the buffer starts fully constructed and
    /// empty. Callable from any thread.
    pub fn acquire(&self) -> Result<MessageRef> {
        MessageAllocator::allocate_message()
    }

    /// Opt `protocol` into batched delivery.
    ///
    /// Registering an already-registered connection is a no-op. Arms the
    /// flush task when none is armed. Dispatcher thread only.
    pub fn register_for_autosend(&self, protocol: Arc<dyn Protocol>) {
        let arm = self.shared.state.with(|state| {
            if state.registry.iter().any(|p| Arc::ptr_eq(p, &protocol)) {
                debug!("connection already registered for autosend");
                return false;
            }
            state.registry.push(protocol);
            debug!(registered = state.registry.len(), "connection joined autosend");
            if state.flush_armed {
                false
            } else {
                state.flush_armed = true;
                true
            }
        });
        if arm {
            Self::arm_flush(&self.shared);
        }
    }

    /// Remove `protocol` from batched delivery.
    ///
    /// A no-op when the connection is not registered. Removal swaps the
    /// last entry into the vacated slot, so relative order among the
    /// remaining connections is not preserved. Dispatcher thread only.
    pub fn unregister_from_autosend(&self, protocol: &Arc<dyn Protocol>) {
        self.shared.state.with(|state| {
            if let Some(position) = state
                .registry
                .iter()
                .position(|p| Arc::ptr_eq(p, protocol))
            {
                state.registry.swap_remove(position);
                debug!(registered = state.registry.len(), "connection left autosend");
            }
        });
    }

    /// Number of connections currently registered. Dispatcher thread only.
    pub fn registered_count(&self) -> usize {
        self.shared.state.with(|state| state.registry.len())
    }

    fn arm_flush(shared: &Arc<PoolShared>) {
        // The callback holds only a weak reference: a task that outlives
        // the pool upgrades to None and dies instead of dangling.
        let weak: Weak<PoolShared> = Arc::downgrade(shared);
        let delay = shared.config.autosend_delay;
        trace!(delay_ms = delay.as_millis() as u64, "armed autosend flush");
        shared.scheduler.add_event(
            delay,
            Box::new(move || {
                if let Some(shared) = weak.upgrade() {
                    PoolShared::flush(&shared);
                }
            }),
        );
    }
}

impl PoolShared {
    /// One flush pass; runs on the dispatcher thread via the scheduler.
    fn flush(shared: &Arc<Self>) {
        // Iterate a snapshot so send implementations may re-enter
        // register/unregister without aliasing the live registry.
        let snapshot = shared.state.with(|state| state.registry.clone());

        let mut delivered = 0usize;
        for protocol in &snapshot {
            if let Some(message) = protocol.current_buffer() {
                if !message.is_empty() {
                    protocol.send(message);
                    delivered += 1;
                }
            }
        }
        trace!(connections = snapshot.len(), delivered, "flush pass complete");

        let rearm = shared.state.with(|state| {
            state.flush_armed = !state.registry.is_empty();
            state.flush_armed
        });
        if rearm {
            MessagePool::arm_flush(shared);
        }
    }
}
