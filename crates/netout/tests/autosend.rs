//! Flush-cycle tests driven by a manually stepped scheduler.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use netout::{MessagePool, MessageRef, PoolConfig, Protocol, Scheduler};

type Task = Box<dyn FnOnce() + Send + 'static>;

/// Scheduler that queues tasks and only runs them when the test says so.
#[derive(Default)]
struct ManualScheduler {
    queue: Mutex<VecDeque<(Duration, Task)>>,
}

impl ManualScheduler {
    fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    /// Run the oldest queued task, returning its requested delay.
    fn fire_next(&self) -> Duration {
        // Pop before running: the task may schedule its successor.
        let (delay, task) = self.queue.lock().pop_front().expect("no task queued");
        task();
        delay
    }
}

impl Scheduler for ManualScheduler {
    fn add_event(&self, delay: Duration, callback: Task) {
        self.queue.lock().push_back((delay, callback));
    }
}

/// Connection stub recording which buffers get flushed, in what order.
struct TestConnection {
    id: u32,
    pending: Mutex<Option<MessageRef>>,
    sent: AtomicUsize,
    log: Arc<Mutex<Vec<u32>>>,
}

impl TestConnection {
    fn new(id: u32, log: Arc<Mutex<Vec<u32>>>) -> Arc<Self> {
        Arc::new(Self { id, pending: Mutex::new(None), sent: AtomicUsize::new(0), log })
    }

    fn buffer_bytes(&self, pool: &MessagePool, bytes: &[u8]) {
        let mut message = pool.acquire().unwrap();
        message.get_mut().unwrap().write_bytes(bytes).unwrap();
        *self.pending.lock() = Some(message);
    }
}

impl Protocol for TestConnection {
    fn current_buffer(&self) -> Option<MessageRef> {
        self.pending.lock().clone()
    }

    fn send(&self, message: MessageRef) {
        assert!(!message.is_empty(), "flush must never send empty buffers");
        self.log.lock().push(self.id);
        self.sent.fetch_add(1, Ordering::SeqCst);
        *self.pending.lock() = None;
    }
}

fn fixture() -> (Arc<ManualScheduler>, MessagePool, Arc<Mutex<Vec<u32>>>) {
    let scheduler = Arc::new(ManualScheduler::default());
    let pool = MessagePool::new(Arc::clone(&scheduler) as Arc<dyn Scheduler>);
    (scheduler, pool, Arc::new(Mutex::new(Vec::new())))
}

#[test]
fn first_registration_arms_exactly_one_flush_task() {
    let (scheduler, pool, log) = fixture();
    let first = TestConnection::new(1, Arc::clone(&log));
    let second = TestConnection::new(2, Arc::clone(&log));

    assert_eq!(scheduler.pending(), 0);
    pool.register_for_autosend(first);
    assert_eq!(scheduler.pending(), 1);

    // A second registration rides the already-armed task.
    pool.register_for_autosend(second);
    assert_eq!(scheduler.pending(), 1);
    assert_eq!(pool.registered_count(), 2);
}

#[test]
fn flush_task_honours_the_configured_delay() {
    let scheduler = Arc::new(ManualScheduler::default());
    let config = PoolConfig::default().with_autosend_delay(Duration::from_millis(25));
    let pool = MessagePool::with_config(Arc::clone(&scheduler) as Arc<dyn Scheduler>, config);

    let log = Arc::new(Mutex::new(Vec::new()));
    pool.register_for_autosend(TestConnection::new(1, log));
    assert_eq!(scheduler.fire_next(), Duration::from_millis(25));
}

#[test]
fn flush_sends_only_nonempty_buffers_and_rearms() {
    let (scheduler, pool, log) = fixture();
    let idle = TestConnection::new(1, Arc::clone(&log));
    let busy = TestConnection::new(2, Arc::clone(&log));
    let empty = TestConnection::new(3, Arc::clone(&log));

    pool.register_for_autosend(Arc::clone(&idle) as Arc<dyn Protocol>);
    pool.register_for_autosend(Arc::clone(&busy) as Arc<dyn Protocol>);
    pool.register_for_autosend(Arc::clone(&empty) as Arc<dyn Protocol>);

    // Only the middle connection has bytes waiting; the third holds an
    // acquired but still-empty buffer.
    busy.buffer_bytes(&pool, b"update");
    *empty.pending.lock() = Some(pool.acquire().unwrap());

    scheduler.fire_next();

    assert_eq!(*log.lock(), vec![2]);
    assert_eq!(idle.sent.load(Ordering::SeqCst), 0);
    assert_eq!(busy.sent.load(Ordering::SeqCst), 1);
    assert_eq!(empty.sent.load(Ordering::SeqCst), 0);

    // Registry still populated, so the cycle re-armed itself.
    assert_eq!(scheduler.pending(), 1);
}

#[test]
fn unregistered_connections_are_skipped() {
    let (scheduler, pool, log) = fixture();
    let first = TestConnection::new(1, Arc::clone(&log));
    let second = TestConnection::new(2, Arc::clone(&log));
    let third = TestConnection::new(3, Arc::clone(&log));

    for connection in [&first, &second, &third] {
        connection.buffer_bytes(&pool, b"data");
        pool.register_for_autosend(Arc::clone(connection) as Arc<dyn Protocol>);
    }

    let gone = Arc::clone(&first) as Arc<dyn Protocol>;
    pool.unregister_from_autosend(&gone);
    assert_eq!(pool.registered_count(), 2);

    scheduler.fire_next();

    // Removal swapped the last entry into the vacated slot.
    assert_eq!(*log.lock(), vec![3, 2]);
    assert_eq!(first.sent.load(Ordering::SeqCst), 0);
}

#[test]
fn unregistering_an_unknown_connection_is_a_noop() {
    let (scheduler, pool, log) = fixture();
    let known = TestConnection::new(1, Arc::clone(&log));
    let stranger = TestConnection::new(2, log);

    pool.register_for_autosend(Arc::clone(&known) as Arc<dyn Protocol>);
    pool.unregister_from_autosend(&(stranger as Arc<dyn Protocol>));

    assert_eq!(pool.registered_count(), 1);
    assert_eq!(scheduler.pending(), 1);
}

#[test]
fn duplicate_registration_is_ignored() {
    let (scheduler, pool, log) = fixture();
    let connection = TestConnection::new(1, log);

    pool.register_for_autosend(Arc::clone(&connection) as Arc<dyn Protocol>);
    pool.register_for_autosend(Arc::clone(&connection) as Arc<dyn Protocol>);

    assert_eq!(pool.registered_count(), 1);
    assert_eq!(scheduler.pending(), 1);
}

#[test]
fn cycle_goes_dormant_when_the_registry_empties() {
    let (scheduler, pool, log) = fixture();
    let connection = TestConnection::new(1, log);

    pool.register_for_autosend(Arc::clone(&connection) as Arc<dyn Protocol>);
    pool.unregister_from_autosend(&(Arc::clone(&connection) as Arc<dyn Protocol>));

    // The armed task fires against an empty registry and does not re-arm.
    scheduler.fire_next();
    assert_eq!(scheduler.pending(), 0);

    // The next registration starts a fresh cycle.
    pool.register_for_autosend(connection);
    assert_eq!(scheduler.pending(), 1);
}

#[test]
fn queued_task_outliving_the_pool_is_inert() {
    let (scheduler, pool, log) = fixture();
    let connection = TestConnection::new(1, log);
    connection.buffer_bytes(&pool, b"late");
    pool.register_for_autosend(Arc::clone(&connection) as Arc<dyn Protocol>);

    drop(pool);

    // The task upgrades its weak pool reference, finds nothing, and dies.
    scheduler.fire_next();
    assert_eq!(connection.sent.load(Ordering::SeqCst), 0);
    assert_eq!(scheduler.pending(), 0);
}

#[test]
fn repeated_cycles_deliver_fresh_buffers_each_tick() {
    let (scheduler, pool, log) = fixture();
    let connection = TestConnection::new(1, Arc::clone(&log));
    pool.register_for_autosend(Arc::clone(&connection) as Arc<dyn Protocol>);

    for _ in 0..3 {
        connection.buffer_bytes(&pool, b"tick");
        scheduler.fire_next();
    }

    assert_eq!(connection.sent.load(Ordering::SeqCst), 3);
    assert_eq!(*log.lock(), vec![1, 1, 1]);
    assert_eq!(scheduler.pending(), 1);
}
