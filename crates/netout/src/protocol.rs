//! Per-connection contract consumed by the flush cycle
//!
//! One implementation exists per connection. The pool only ever asks two
//! things of it: hand over the buffer it has been accumulating, and take
//! ownership of a buffer for transmission. Transport-level outcomes stay
//! entirely on the connection's side; the pool neither inspects nor
//! reacts to them.

use crate::pool::MessageRef;

/// A connection's view as seen by the autosend flush cycle
pub trait Protocol: Send + Sync {
    /// The buffer this connection is currently accumulating, if any.
    ///
    /// Must not block. Returning `None`, or a handle to an empty buffer,
    /// makes the flush pass skip this connection for the tick. The
    /// connection is expected to supply a fresh buffer to future writers
    /// on demand; the pool does not track buffer state.
    fn current_buffer(&self) -> Option<MessageRef>;

    /// Take ownership of a non-empty buffer for eventual transmission.
    ///
    /// Called only from the dispatcher thread, only with non-empty
    /// buffers. Send failures are the connection's business.
    fn send(&self, message: MessageRef);
}
