//! Deferred-execution contract consumed by the message pool
//!
//! The pool does not own a timer or an event loop; it relies on the
//! server's dispatcher to run a one-shot callback after a delay, on the
//! dispatcher thread. Repetition is the pool's own doing: each flush pass
//! decides whether to schedule the next one.

use std::time::Duration;

/// One-shot deferred callback execution on the dispatcher thread
pub trait Scheduler: Send + Sync {
    /// Run `callback` once, roughly `delay` from now, on the dispatcher
    /// thread.
    ///
    /// Implementations must invoke callbacks on the same single logical
    /// thread that mutates the pool's registry; the pool's thread-affinity
    /// checks will reject anything else.
    fn add_event(&self, delay: Duration, callback: Box<dyn FnOnce() + Send + 'static>);
}
