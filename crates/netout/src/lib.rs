//! Outbound message buffering and pooled allocation for a game server's
//! network layer
//!
//! Every byte the server sends passes through an [`OutboundMessage`]
//! buffer. Buffers are allocated constantly and live briefly, so their
//! backing blocks are recycled through a bounded lock-free [`FreeList`]
//! instead of hitting the global allocator on every message. On top of
//! the allocation layer, [`MessagePool`] runs the autosend cycle: while
//! any connection is registered, a periodic flush pass hands each
//! connection's accumulated buffer to its send path.
//!
//! # Threading model
//!
//! Buffer acquisition and release are lock-free and safe from any thread.
//! The connection registry belongs to the dispatcher thread alone;
//! [`DispatcherBound`] enforces that at runtime, so registration,
//! unregistration, and flush passes all happen there, with no lock.
//!
//! # Integration
//!
//! The host supplies two things: a [`Scheduler`] that runs one-shot
//! callbacks on the dispatcher thread after a delay, and a [`Protocol`]
//! implementation per connection exposing its pending buffer and its
//! send path.
//!
//! ```
//! use std::sync::{Arc, Mutex};
//! use std::time::Duration;
//!
//! use netout::{MessagePool, MessageRef, Protocol, Scheduler};
//!
//! struct InlineScheduler;
//!
//! impl Scheduler for InlineScheduler {
//!     fn add_event(&self, _delay: Duration, callback: Box<dyn FnOnce() + Send + 'static>) {
//!         callback();
//!     }
//! }
//!
//! struct Connection {
//!     pending: Mutex<Option<MessageRef>>,
//! }
//!
//! impl Protocol for Connection {
//!     fn current_buffer(&self) -> Option<MessageRef> {
//!         self.pending.lock().unwrap().clone()
//!     }
//!     fn send(&self, message: MessageRef) {
//!         // hand `message` to the transport
//!         let _ = message;
//!     }
//! }
//!
//! let pool = MessagePool::new(Arc::new(InlineScheduler));
//! let mut message = pool.acquire()?;
//! message.get_mut().unwrap().write_bytes(b"ping")?;
//! # Ok::<(), netout::PoolError>(())
//! ```

#![warn(missing_docs)]

mod autosend;
pub mod config;
mod dispatcher;
mod error;
mod message;
pub mod pool;
mod protocol;
mod scheduler;
mod utils;

pub use autosend::MessagePool;
pub use config::{AUTOSEND_DELAY, FREE_LIST_CAPACITY, MESSAGE_BUFFER_CAPACITY, PoolConfig};
pub use dispatcher::DispatcherBound;
pub use error::{PoolError, Result};
pub use message::OutboundMessage;
pub use pool::{FreeList, MessageAllocator, MessageRef, Pooled, PooledAllocator, shared_block_layout};
pub use protocol::Protocol;
pub use scheduler::Scheduler;
