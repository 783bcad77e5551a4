//! Task source - worker to host channel
//!
//! The worker never touches host-side state directly. Everything it has to
//! say (outputs, saturation transitions, configure/drain completion, fatal
//! errors) travels as a task over a per-instance FIFO channel and is applied
//! by the dispatcher thread. Tasks carry the epoch current when they were
//! posted; the dispatcher discards tasks from before the latest reset/close,
//! which is how post-cancellation outputs are prevented from leaking through.

use crossbeam::channel::Sender;

use super::backend::BackendError;
use super::core::CodecAdapter;

/// One unit of work posted back to the host side.
pub(crate) struct HostTask<A: CodecAdapter> {
    pub(crate) epoch: u64,
    pub(crate) kind: TaskKind<A>,
}

pub(crate) enum TaskKind<A: CodecAdapter> {
    /// One input batch worth of backend outputs, in emission order.
    Outputs(Vec<A::BackendOutput>),
    /// The configure work item finished; unblock the control queue or close
    /// the instance with an error.
    ConfigureDone(Result<(), BackendError>),
    /// Backend refused input; stop dispatching until `Unsaturated` arrives.
    Saturated,
    /// Backend accepted the retried input; resume dispatching.
    Unsaturated,
    /// The drain work item for the given flush waiter finished.
    DrainDone(u64, Result<(), BackendError>),
    /// Unrecoverable backend failure while processing input.
    Fatal(BackendError),
    /// Coalesced queue-size notification (host-posted, epoch-exempt).
    Dequeue,
    /// Stop the dispatcher thread (epoch-exempt).
    Terminate,
}

/// Sending half of the task source.
///
/// Send failures are ignored: they only happen while the instance is tearing
/// down and the dispatcher is already gone.
pub(crate) struct TaskSender<A: CodecAdapter> {
    tx: Sender<HostTask<A>>,
}

impl<A: CodecAdapter> TaskSender<A> {
    pub(crate) fn new(tx: Sender<HostTask<A>>) -> Self {
        Self { tx }
    }

    pub(crate) fn post(&self, epoch: u64, kind: TaskKind<A>) {
        let _ = self.tx.send(HostTask { epoch, kind });
    }
}

impl<A: CodecAdapter> Clone for TaskSender<A> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}
