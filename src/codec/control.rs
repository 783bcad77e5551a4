//! Control-message queue
//!
//! Every API call that does codec work enqueues one control message on the
//! host side of the instance. Messages are dispatched strictly in enqueue
//! order by the process-queue loop; a message that cannot make progress
//! (input while the backend is saturated) reports `NotProcessed` and stays at
//! the head, stalling everything behind it.

use std::collections::VecDeque;

use super::core::CodecAdapter;

/// A queued codec operation, constructed at API-call time and destroyed when
/// it is dispatched or when the queue is cleared by reset/close.
pub(crate) enum ControlMessage<A: CodecAdapter> {
    /// Apply a configuration (blocking: stalls the queue until the backend
    /// reports completion).
    Configure(A::Config),
    /// Encode one frame or decode one chunk.
    Input(A::Input, A::Options),
    /// Drain the backend and settle the waiter with the given id.
    Flush(u64),
}

/// Outcome of running one control message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MessageOutcome {
    /// Dequeue the message and keep processing.
    Processed,
    /// Leave the message at the head and stop processing.
    NotProcessed,
}

/// FIFO of pending control messages, owned by the host side.
pub(crate) struct ControlQueue<A: CodecAdapter> {
    messages: VecDeque<ControlMessage<A>>,
}

impl<A: CodecAdapter> ControlQueue<A> {
    pub(crate) fn new() -> Self {
        Self {
            messages: VecDeque::new(),
        }
    }

    pub(crate) fn enqueue(&mut self, message: ControlMessage<A>) {
        self.messages.push_back(message);
    }

    pub(crate) fn front(&self) -> Option<&ControlMessage<A>> {
        self.messages.front()
    }

    pub(crate) fn pop(&mut self) -> Option<ControlMessage<A>> {
        self.messages.pop_front()
    }

    pub(crate) fn clear(&mut self) {
        self.messages.clear();
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
