//! Generic codec core - the processing model shared by all four codec types
//!
//! One `CodecCore` backs each encoder/decoder instance. The host side owns
//! the state machine, the control-message queue, queue-size accounting,
//! saturation mirroring and flush bookkeeping; a dedicated worker thread owns
//! the backend; a dedicated dispatcher thread applies worker tasks and runs
//! the output/error/dequeue callbacks. API entry points never block.
//!
//! Type-specific behavior (input validation, orientation locking, metadata
//! derivation) is injected through the `CodecAdapter` capability bundle.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver};
use tokio::sync::oneshot;
use tracing::{debug, trace};

use crate::webcodecs::error::{abort_error, invalid_state_error, WebCodecsError, WebCodecsResult};

use super::backend::BackendError;
use super::control::{ControlMessage, ControlQueue, MessageOutcome};
use super::resource::{CodecKind, ReclaimTarget, ResourceManager};
use super::task::{HostTask, TaskKind, TaskSender};
use super::work::{BackendFactory, WorkItem, WorkItemKind, Worker};

/// Codec lifecycle state. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CodecState {
    /// Not configured; `encode`/`decode`/`flush` fail with InvalidStateError
    #[default]
    Unconfigured,
    /// Configured and accepting input
    Configured,
    /// Closed; every further call fails with InvalidStateError
    Closed,
}

impl CodecState {
    /// Spec-facing state string.
    pub fn as_str(&self) -> &'static str {
        match self {
            CodecState::Unconfigured => "unconfigured",
            CodecState::Configured => "configured",
            CodecState::Closed => "closed",
        }
    }
}

/// Output callback registered at construction; invoked on the dispatcher
/// thread, in backend emission order.
pub type OutputCallback<O> = Arc<dyn Fn(O) + Send + Sync>;

/// Error callback registered at construction; invoked before the instance
/// transitions to `Closed`.
pub type ErrorCallback = Arc<dyn Fn(WebCodecsError) + Send + Sync>;

/// Coalesced queue-size notification; receives the current queue size.
pub type DequeueCallback = Arc<dyn Fn(u32) + Send + Sync>;

/// Type-specific capability bundle plugged into the generic core.
///
/// Adapters carry the per-type host-side state the processing model needs:
/// the video encoder's orientation lock and decoder-config dedup slot, the
/// decoders' first-chunk-must-be-key flag.
pub trait CodecAdapter: Send + 'static {
    /// Configuration dictionary for this codec type.
    type Config: Clone + Send + 'static;
    /// Input unit (frame or chunk).
    type Input: Send + 'static;
    /// Per-input options.
    type Options: Clone + Default + Send + 'static;
    /// Raw output from the backend.
    type BackendOutput: Send + 'static;
    /// Finished output delivered to the output callback.
    type Output: Send + 'static;

    /// Which of the four codec types this adapter implements.
    const KIND: CodecKind;

    /// Structural validation, before any control message is enqueued.
    fn validate_config(config: &Self::Config) -> WebCodecsResult<()>;

    /// Clone the input into the instance. Fails with TypeError when the
    /// input has been detached; the clone is the only reference used
    /// internally from here on.
    fn claim_input(&self, input: &Self::Input) -> WebCodecsResult<Self::Input>;

    /// Type-specific acceptance check on the claimed input, run before the
    /// queue-size increment. Locks orientation / clears the key-chunk gate
    /// as a side effect of acceptance.
    fn accept_input(&mut self, input: &Self::Input) -> WebCodecsResult<()>;

    /// A configuration was applied on the host side.
    fn on_configure(&mut self, config: &Self::Config);

    /// The instance was reset or closed; drop per-stream state.
    fn on_reset(&mut self);

    /// Turn one backend output into the callback-facing output, deriving
    /// per-output metadata. Runs on the dispatcher thread in emission order.
    fn finish_output(&mut self, config: &Self::Config, raw: Self::BackendOutput) -> Self::Output;
}

/// Single-assignment completion handle returned by `flush()`.
///
/// Resolves when every input queued before the flush has been emitted;
/// rejects with `AbortError` on reset/close and with `EncodingError` /
/// `DecodingError` when the drain fails in the backend.
pub struct FlushHandle {
    rx: oneshot::Receiver<WebCodecsResult<()>>,
}

impl FlushHandle {
    fn settled(result: WebCodecsResult<()>) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(result);
        Self { rx }
    }

    /// Await completion.
    pub async fn wait(self) -> WebCodecsResult<()> {
        match self.rx.await {
            Ok(result) => result,
            Err(_) => Err(abort_error("codec instance dropped")),
        }
    }

    /// Block the calling thread until completion. Must not be called from
    /// an async runtime thread.
    pub fn wait_blocking(self) -> WebCodecsResult<()> {
        match self.rx.blocking_recv() {
            Ok(result) => result,
            Err(_) => Err(abort_error("codec instance dropped")),
        }
    }
}

impl Future for FlushHandle {
    type Output = WebCodecsResult<()>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(|received| match received {
            Ok(result) => result,
            Err(_) => Err(abort_error("codec instance dropped")),
        })
    }
}

static NEXT_INSTANCE_ID: AtomicU64 = AtomicU64::new(1);

/// Host-thread-only state. Everything here is touched only with the inner
/// lock held; callbacks are always invoked after releasing it.
struct CodecInner<A: CodecAdapter> {
    state: CodecState,
    queue_size: u32,
    message_queue_blocked: bool,
    codec_saturated: bool,
    dequeue_event_scheduled: bool,
    /// Mirror of the shared epoch counter, used to stamp outgoing items.
    epoch: u64,
    active_config: Option<A::Config>,
    adapter: A,
    control_queue: ControlQueue<A>,
    pending_flushes: Vec<(u64, oneshot::Sender<WebCodecsResult<()>>)>,
    next_flush_id: u64,
    output_callback: OutputCallback<A::Output>,
    error_callback: ErrorCallback,
    dequeue_callback: Option<DequeueCallback>,
    work_tx: channel::Sender<WorkItem<A>>,
    tasks: TaskSender<A>,
}

impl<A: CodecAdapter> CodecInner<A> {
    /// The process-queue algorithm. Re-entrancy-safe: it only ever runs with
    /// the inner lock held and never invokes callbacks.
    fn process_queue(&mut self) {
        while !self.message_queue_blocked && !self.control_queue.is_empty() {
            if self.run_front_message() == MessageOutcome::NotProcessed {
                break;
            }
        }
    }

    fn run_front_message(&mut self) -> MessageOutcome {
        if self.codec_saturated
            && matches!(self.control_queue.front(), Some(ControlMessage::Input(..)))
        {
            return MessageOutcome::NotProcessed;
        }
        let Some(message) = self.control_queue.pop() else {
            return MessageOutcome::NotProcessed;
        };
        match message {
            ControlMessage::Configure(config) => {
                trace!("dispatching configure to worker");
                self.message_queue_blocked = true;
                self.send_work(WorkItemKind::Configure(config));
            }
            ControlMessage::Input(input, options) => {
                self.queue_size = self.queue_size.saturating_sub(1);
                self.schedule_dequeue_event();
                self.send_work(WorkItemKind::SubmitInput(input, options));
            }
            ControlMessage::Flush(waiter_id) => {
                self.send_work(WorkItemKind::Drain(waiter_id));
            }
        }
        MessageOutcome::Processed
    }

    fn send_work(&mut self, kind: WorkItemKind<A>) {
        let _ = self.work_tx.send(WorkItem {
            epoch: self.epoch,
            kind,
        });
    }

    /// At most one dequeue notification per host turn, however many
    /// decrements happen in between.
    fn schedule_dequeue_event(&mut self) {
        if self.dequeue_event_scheduled {
            return;
        }
        self.dequeue_event_scheduled = true;
        self.tasks.post(self.epoch, TaskKind::Dequeue);
    }

    fn take_flush_waiter(&mut self, waiter_id: u64) -> Option<oneshot::Sender<WebCodecsResult<()>>> {
        let position = self
            .pending_flushes
            .iter()
            .position(|(id, _)| *id == waiter_id)?;
        Some(self.pending_flushes.remove(position).1)
    }
}

/// State shared between the API surface, the worker and the dispatcher.
pub(crate) struct CodecShared<A: CodecAdapter> {
    inner: Mutex<CodecInner<A>>,
    /// Bumped on every reset/close; stale work items and tasks are dropped.
    epoch: Arc<AtomicU64>,
    instance_id: u64,
    resources: Arc<ResourceManager>,
}

impl<A: CodecAdapter> CodecShared<A> {
    fn lock_inner(&self) -> MutexGuard<'_, CodecInner<A>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reset semantics (spec steps 1-7), with the lock held. The reason is
    /// what pending flush waiters reject with: `AbortError` for user-driven
    /// reset/close, the fatal error itself for close-on-error.
    fn reset_locked(&self, inner: &mut CodecInner<A>, reason: WebCodecsError) {
        let epoch = self.epoch.fetch_add(1, Ordering::AcqRel) + 1;
        debug!(epoch, "resetting codec");
        inner.epoch = epoch;
        inner.control_queue.clear();
        for (_, waiter) in inner.pending_flushes.drain(..) {
            let _ = waiter.send(Err(reason.clone()));
        }
        if inner.queue_size > 0 {
            inner.queue_size = 0;
            inner.schedule_dequeue_event();
        }
        inner.codec_saturated = false;
        inner.message_queue_blocked = false;
        inner.active_config = None;
        inner.adapter.on_reset();
        inner.send_work(WorkItemKind::ReleaseBackend);
        inner.state = CodecState::Unconfigured;
    }

    fn close_locked(&self, inner: &mut CodecInner<A>, reason: WebCodecsError) {
        self.reset_locked(inner, reason);
        inner.state = CodecState::Closed;
        inner.send_work(WorkItemKind::Shutdown);
        let epoch = inner.epoch;
        inner.tasks.post(epoch, TaskKind::Terminate);
        self.resources.unregister(self.instance_id);
    }

    /// Close triggered by an internal error (fatal backend failure, failed
    /// configure, reclamation). The error callback observes the instance
    /// before it transitions to `Closed`; pending flushes reject with the
    /// same kind. Returns false when the instance was already closed.
    pub(crate) fn close_with_error(&self, error: WebCodecsError) -> bool {
        let mut inner = self.lock_inner();
        if inner.state == CodecState::Closed {
            return false;
        }
        debug!(error = %error, "closing codec with error");
        self.reset_locked(&mut inner, error.clone());
        let error_callback = inner.error_callback.clone();
        drop(inner);

        error_callback(error);

        let mut inner = self.lock_inner();
        if inner.state != CodecState::Closed {
            inner.state = CodecState::Closed;
            inner.send_work(WorkItemKind::Shutdown);
            let epoch = inner.epoch;
            inner.tasks.post(epoch, TaskKind::Terminate);
            drop(inner);
            self.resources.unregister(self.instance_id);
        }
        true
    }

    fn deliver_outputs(&self, raws: Vec<A::BackendOutput>) {
        let mut inner = self.lock_inner();
        if inner.state == CodecState::Closed {
            return;
        }
        let Some(config) = inner.active_config.clone() else {
            return;
        };
        let mut outputs = Vec::with_capacity(raws.len());
        for raw in raws {
            outputs.push(inner.adapter.finish_output(&config, raw));
        }
        let callback = inner.output_callback.clone();
        drop(inner);

        self.resources.record_activity(self.instance_id);
        for output in outputs {
            callback(output);
        }
    }

    fn fire_dequeue_event(&self) {
        let mut inner = self.lock_inner();
        inner.dequeue_event_scheduled = false;
        if inner.state == CodecState::Closed {
            return;
        }
        let Some(callback) = inner.dequeue_callback.clone() else {
            return;
        };
        let queue_size = inner.queue_size;
        drop(inner);
        callback(queue_size);
    }

    fn handle_task(&self, kind: TaskKind<A>) {
        match kind {
            TaskKind::Outputs(raws) => self.deliver_outputs(raws),
            TaskKind::ConfigureDone(Ok(())) => {
                let mut inner = self.lock_inner();
                if inner.state != CodecState::Configured {
                    return;
                }
                inner.message_queue_blocked = false;
                inner.process_queue();
            }
            TaskKind::ConfigureDone(Err(err)) => {
                self.close_with_error(configure_error(A::KIND, err));
            }
            TaskKind::Saturated => {
                self.lock_inner().codec_saturated = true;
            }
            TaskKind::Unsaturated => {
                let mut inner = self.lock_inner();
                inner.codec_saturated = false;
                inner.process_queue();
            }
            TaskKind::DrainDone(waiter_id, Ok(())) => {
                let waiter = self.lock_inner().take_flush_waiter(waiter_id);
                if let Some(waiter) = waiter {
                    let _ = waiter.send(Ok(()));
                }
            }
            TaskKind::DrainDone(waiter_id, Err(err)) => {
                let error = fatal_error(A::KIND, &err);
                let waiter = self.lock_inner().take_flush_waiter(waiter_id);
                if let Some(waiter) = waiter {
                    let _ = waiter.send(Err(error.clone()));
                }
                self.close_with_error(error);
            }
            TaskKind::Fatal(err) => {
                self.close_with_error(fatal_error(A::KIND, &err));
            }
            // Routed by the dispatcher before epoch filtering.
            TaskKind::Dequeue | TaskKind::Terminate => {}
        }
    }
}

impl<A: CodecAdapter> ReclaimTarget for CodecShared<A> {
    fn reclaim(&self, error: WebCodecsError) -> bool {
        self.close_with_error(error)
    }
}

fn configure_error(kind: CodecKind, err: BackendError) -> WebCodecsError {
    match err {
        BackendError::Unsupported(m) | BackendError::Configuration(m) => {
            WebCodecsError::NotSupported(m)
        }
        BackendError::Fatal(_) => fatal_error(kind, &err),
    }
}

fn fatal_error(kind: CodecKind, err: &BackendError) -> WebCodecsError {
    if kind.is_encoder() {
        WebCodecsError::Encoding(err.to_string())
    } else {
        WebCodecsError::Decoding(err.to_string())
    }
}

/// The dispatcher thread main loop: the host-side task source consumer.
fn run_dispatcher<A: CodecAdapter>(shared: Arc<CodecShared<A>>, task_rx: Receiver<HostTask<A>>) {
    while let Ok(task) = task_rx.recv() {
        match task.kind {
            TaskKind::Terminate => break,
            // Epoch-exempt: a stale dequeue task still has to clear the
            // coalescing flag, and firing after reset is harmless.
            TaskKind::Dequeue => shared.fire_dequeue_event(),
            kind => {
                if task.epoch < shared.epoch.load(Ordering::Acquire) {
                    trace!(epoch = task.epoch, "discarding stale host task");
                    continue;
                }
                shared.handle_task(kind);
            }
        }
    }
    debug!("codec dispatcher shutting down");
}

/// Generic codec instance driving one backend through the two-tier queue
/// processing model. The four public codec shells wrap one of these.
pub(crate) struct CodecCore<A: CodecAdapter> {
    shared: Arc<CodecShared<A>>,
    worker: Option<JoinHandle<()>>,
    dispatcher: Option<JoinHandle<()>>,
}

impl<A: CodecAdapter> CodecCore<A> {
    pub(crate) fn new(
        adapter: A,
        factory: BackendFactory<A>,
        output_callback: OutputCallback<A::Output>,
        error_callback: ErrorCallback,
        resources: Arc<ResourceManager>,
    ) -> Self {
        let instance_id = NEXT_INSTANCE_ID.fetch_add(1, Ordering::Relaxed);
        let epoch = Arc::new(AtomicU64::new(0));
        let (work_tx, work_rx) = channel::unbounded();
        let (task_tx, task_rx) = channel::unbounded();
        let tasks = TaskSender::new(task_tx);

        let inner = CodecInner {
            state: CodecState::Unconfigured,
            queue_size: 0,
            message_queue_blocked: false,
            codec_saturated: false,
            dequeue_event_scheduled: false,
            epoch: 0,
            active_config: None,
            adapter,
            control_queue: ControlQueue::new(),
            pending_flushes: Vec::new(),
            next_flush_id: 1,
            output_callback,
            error_callback,
            dequeue_callback: None,
            work_tx,
            tasks: tasks.clone(),
        };
        let shared = Arc::new(CodecShared {
            inner: Mutex::new(inner),
            epoch: epoch.clone(),
            instance_id,
            resources: resources.clone(),
        });

        let reclaim_target: Arc<dyn ReclaimTarget> = shared.clone();
        resources.register(instance_id, A::KIND, Arc::downgrade(&reclaim_target));

        let worker = Worker::new(work_rx, tasks, factory, epoch);
        let worker_handle = thread::spawn(move || worker.run());
        let dispatcher_handle = {
            let shared = shared.clone();
            thread::spawn(move || run_dispatcher(shared, task_rx))
        };

        debug!(instance_id, kind = ?A::KIND, "codec instance created");
        Self {
            shared,
            worker: Some(worker_handle),
            dispatcher: Some(dispatcher_handle),
        }
    }

    pub(crate) fn state(&self) -> CodecState {
        self.shared.lock_inner().state
    }

    pub(crate) fn queue_size(&self) -> u32 {
        self.shared.lock_inner().queue_size
    }

    pub(crate) fn instance_id(&self) -> u64 {
        self.shared.instance_id
    }

    pub(crate) fn set_dequeue_callback(&self, callback: Option<DequeueCallback>) {
        self.shared.lock_inner().dequeue_callback = callback;
    }

    /// Mark this instance background/foreground for reclamation purposes.
    pub(crate) fn set_background(&self, background: bool) {
        self.shared
            .resources
            .set_background(self.shared.instance_id, background);
    }

    /// Assign this instance to a logical group (e.g. a transcoding pair).
    pub(crate) fn set_reclaim_group(&self, group: Option<u64>) {
        self.shared
            .resources
            .set_group(self.shared.instance_id, group);
    }

    pub(crate) fn configure(&self, config: A::Config) -> WebCodecsResult<()> {
        A::validate_config(&config)?;
        let mut inner = self.shared.lock_inner();
        if inner.state == CodecState::Closed {
            return Err(invalid_state_error("codec is closed"));
        }
        inner.state = CodecState::Configured;
        inner.active_config = Some(config.clone());
        inner.adapter.on_configure(&config);
        inner
            .control_queue
            .enqueue(ControlMessage::Configure(config));
        inner.process_queue();
        Ok(())
    }

    /// Shared body of `encode`/`decode`: validate, clone, count, enqueue.
    pub(crate) fn submit(&self, input: &A::Input, options: A::Options) -> WebCodecsResult<()> {
        let mut inner = self.shared.lock_inner();
        match inner.state {
            CodecState::Configured => {}
            CodecState::Unconfigured => {
                return Err(invalid_state_error("codec is not configured"));
            }
            CodecState::Closed => {
                return Err(invalid_state_error("codec is closed"));
            }
        }
        let claimed = inner.adapter.claim_input(input)?;
        inner.adapter.accept_input(&claimed)?;
        inner.queue_size += 1;
        inner
            .control_queue
            .enqueue(ControlMessage::Input(claimed, options));
        inner.process_queue();
        Ok(())
    }

    pub(crate) fn flush(&self) -> FlushHandle {
        let mut inner = self.shared.lock_inner();
        if inner.state != CodecState::Configured {
            return FlushHandle::settled(Err(invalid_state_error("codec is not configured")));
        }
        let (tx, rx) = oneshot::channel();
        let waiter_id = inner.next_flush_id;
        inner.next_flush_id += 1;
        inner.pending_flushes.push((waiter_id, tx));
        inner.control_queue.enqueue(ControlMessage::Flush(waiter_id));
        inner.process_queue();
        FlushHandle { rx }
    }

    pub(crate) fn reset(&self) -> WebCodecsResult<()> {
        let mut inner = self.shared.lock_inner();
        if inner.state == CodecState::Closed {
            return Err(invalid_state_error("codec is closed"));
        }
        self.shared
            .reset_locked(&mut inner, abort_error("codec was reset"));
        Ok(())
    }

    /// Idempotent: closing a closed instance is a silent no-op.
    pub(crate) fn close(&self) {
        let mut inner = self.shared.lock_inner();
        if inner.state == CodecState::Closed {
            return;
        }
        self.shared
            .close_locked(&mut inner, abort_error("codec was closed"));
    }
}

impl<A: CodecAdapter> Drop for CodecCore<A> {
    fn drop(&mut self) {
        self.close();
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.dispatcher.take() {
            let _ = handle.join();
        }
    }
}
