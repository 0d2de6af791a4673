//! Single-thread affinity cell for dispatcher-owned state
//!
//! The connection registry is mutated only from the dispatcher thread, by
//! contract, which is exactly why it needs no lock. [`DispatcherBound`]
//! turns that contract into a checked one: the first thread to access the
//! cell becomes its owner, and any access from another thread (or a
//! re-entrant access from the owner) panics instead of racing.
//!
//! # Safety
//!
//! `DispatcherBound<T>` is `Sync` even though it wraps an `UnsafeCell`:
//!
//! - Only the owner thread ever reaches the cell body; all other threads
//!   panic on the owner check before touching it.
//! - The owner is bound exactly once (`OnceCell`), so two threads cannot
//!   both believe they own the cell.
//! - The re-entrancy flag is only read or written after the owner check
//!   passes, i.e. from one thread.
//!
//! Together these make every `&mut T` handed to [`with`](DispatcherBound::with)
//! exclusive.

use std::cell::{Cell, UnsafeCell};
use std::thread::{self, ThreadId};

use once_cell::sync::OnceCell;

/// Wrapper pinning its contents to the first thread that touches them
pub struct DispatcherBound<T> {
    cell: UnsafeCell<T>,
    owner: OnceCell<ThreadId>,
    entered: Cell<bool>,
}

// SAFETY: see the module docs; access is funneled through `with`, which
// admits exactly one thread and rejects re-entrancy.
unsafe impl<T: Send> Sync for DispatcherBound<T> {}

impl<T> DispatcherBound<T> {
    /// Wrap `value`; ownership is bound lazily on first access.
    pub fn new(value: T) -> Self {
        Self {
            cell: UnsafeCell::new(value),
            owner: OnceCell::new(),
            entered: Cell::new(false),
        }
    }

    /// Run `f` with exclusive access to the contents.
    ///
    /// Panics when called from any thread but the owner, or re-entrantly
    /// from within another `with` on the same cell.
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let current = thread::current().id();
        let owner = *self.owner.get_or_init(|| current);
        assert_eq!(
            owner, current,
            "dispatcher-bound state accessed from a non-dispatcher thread"
        );
        assert!(
            !self.entered.replace(true),
            "dispatcher-bound state accessed re-entrantly"
        );
        let _reset = ResetOnDrop(&self.entered);

        // SAFETY: owner check plus re-entrancy flag guarantee exclusivity.
        f(unsafe { &mut *self.cell.get() })
    }
}

/// Clears the re-entrancy flag even when the closure unwinds.
struct ResetOnDrop<'a>(&'a Cell<bool>);

impl Drop for ResetOnDrop<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}
