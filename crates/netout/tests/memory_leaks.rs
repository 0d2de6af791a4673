//! Accounting tests: every acquired buffer is released exactly once, no
//! block is ever owned by two handles, and values drop exactly when their
//! last handle does.

use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use proptest::prelude::*;

use netout::{FreeList, Pooled, shared_block_layout};

struct Tracked {
    drops: &'static AtomicUsize,
}

impl Drop for Tracked {
    fn drop(&mut self) {
        self.drops.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn every_value_drops_exactly_once() {
    static LIST: FreeList<16> = FreeList::new(shared_block_layout::<Tracked>());
    static DROPS: AtomicUsize = AtomicUsize::new(0);

    const ROUNDS: usize = 64;
    for _ in 0..ROUNDS {
        let handle = Pooled::new_in(Tracked { drops: &DROPS }, &LIST).unwrap();
        let clones: Vec<_> = (0..4).map(|_| handle.clone()).collect();
        drop(clones);
        drop(handle);
    }

    assert_eq!(DROPS.load(Ordering::SeqCst), ROUNDS);
    LIST.drain();
}

#[test]
fn cross_thread_churn_keeps_ownership_unique() {
    static LIST: FreeList<32> = FreeList::new(shared_block_layout::<Tracked>());
    static DROPS: AtomicUsize = AtomicUsize::new(0);

    let live = Mutex::new(HashSet::new());
    let acquired = AtomicUsize::new(0);

    thread::scope(|scope| {
        for _ in 0..8 {
            scope.spawn(|| {
                for _ in 0..300 {
                    let handle = Pooled::new_in(Tracked { drops: &DROPS }, &LIST).unwrap();
                    acquired.fetch_add(1, Ordering::Relaxed);

                    let address = Pooled::as_ptr(&handle) as usize;
                    assert!(
                        live.lock().unwrap().insert(address),
                        "two live buffers share one block"
                    );

                    // Ship a clone to another thread and let it drop last
                    // half the time, so final release alternates threads.
                    let clone = handle.clone();
                    drop(handle);
                    assert!(live.lock().unwrap().remove(&address));
                    drop(clone);
                }
            });
        }
    });

    // All handles are gone; drops must match acquisitions.
    assert_eq!(DROPS.load(Ordering::SeqCst), acquired.load(Ordering::Relaxed));
    assert!(LIST.len() <= LIST.capacity());
    LIST.drain();
}

#[test]
fn overflow_blocks_go_to_the_heap_not_the_list() {
    static LIST: FreeList<2> = FreeList::new(shared_block_layout::<Tracked>());
    static DROPS: AtomicUsize = AtomicUsize::new(0);

    let handles: Vec<_> = (0..5)
        .map(|_| Pooled::new_in(Tracked { drops: &DROPS }, &LIST).unwrap())
        .collect();
    drop(handles);

    assert_eq!(DROPS.load(Ordering::SeqCst), 5, "all five values dropped");
    assert_eq!(LIST.len(), 2, "only the capacity's worth of blocks cached");
    assert_eq!(LIST.drain(), 2);
}

proptest! {
    // Random interleavings of acquire / clone / release never unbalance
    // the drop accounting.
    #[test]
    fn interleaved_lifecycles_balance(ops in prop::collection::vec(0u8..3, 1..200)) {
        static LIST: FreeList<8> = FreeList::new(shared_block_layout::<Tracked>());
        static DROPS: AtomicUsize = AtomicUsize::new(0);

        let before = DROPS.load(Ordering::SeqCst);
        let mut created = 0usize;
        let mut held: Vec<Pooled<Tracked>> = Vec::new();

        for op in ops {
            match op {
                0 => {
                    held.push(Pooled::new_in(Tracked { drops: &DROPS }, &LIST).unwrap());
                    created += 1;
                }
                1 => {
                    if let Some(clone) = held.last().map(Pooled::clone) {
                        held.push(clone);
                    }
                }
                _ => {
                    held.pop();
                }
            }
        }
        drop(held);

        prop_assert_eq!(DROPS.load(Ordering::SeqCst) - before, created);
    }
}
