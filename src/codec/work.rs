//! Codec work queue and worker thread
//!
//! Each instance owns one worker thread. The host posts work items derived
//! from control messages; the worker executes them strictly serially against
//! the backend it exclusively owns. Items are tagged with the epoch current
//! at dispatch time; after a reset/close bumps the shared epoch, stale items
//! are skipped so the worker never wastes time encoding input the host has
//! already discarded.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam::channel::Receiver;
use tracing::{debug, trace};

use super::backend::{CodecBackend, SubmitOutcome};
use super::core::CodecAdapter;
use super::task::{TaskKind, TaskSender};

/// Boxed backend instance matching an adapter's associated types.
pub(crate) type BoxedBackend<A> = Box<
    dyn CodecBackend<
        Config = <A as CodecAdapter>::Config,
        Input = <A as CodecAdapter>::Input,
        Options = <A as CodecAdapter>::Options,
        Output = <A as CodecAdapter>::BackendOutput,
    >,
>;

/// Creates the backend on the worker thread when the first configure work
/// item runs.
pub type BackendFactory<A> = Arc<dyn Fn() -> BoxedBackend<A> + Send + Sync>;

/// One unit of worker-thread work, derived from a control message.
pub(crate) struct WorkItem<A: CodecAdapter> {
    pub(crate) epoch: u64,
    pub(crate) kind: WorkItemKind<A>,
}

pub(crate) enum WorkItemKind<A: CodecAdapter> {
    /// Instantiate the backend if needed and apply the configuration.
    Configure(A::Config),
    /// Submit one input, retrying through saturation, then forward outputs.
    SubmitInput(A::Input, A::Options),
    /// Signal end-of-stream, forward remaining outputs, settle the waiter.
    Drain(u64),
    /// Drop the backend (reset/close released it on the host side).
    ReleaseBackend,
    /// Stop the worker thread.
    Shutdown,
}

/// Pause between saturation retries when the backend has no output ready to
/// make room. The worker thread is allowed to wait; the host never does.
const SATURATION_RETRY_PAUSE: Duration = Duration::from_micros(500);

pub(crate) struct Worker<A: CodecAdapter> {
    work_rx: Receiver<WorkItem<A>>,
    tasks: TaskSender<A>,
    factory: BackendFactory<A>,
    epoch: Arc<AtomicU64>,
    backend: Option<BoxedBackend<A>>,
    saturated: bool,
}

impl<A: CodecAdapter> Worker<A> {
    pub(crate) fn new(
        work_rx: Receiver<WorkItem<A>>,
        tasks: TaskSender<A>,
        factory: BackendFactory<A>,
        epoch: Arc<AtomicU64>,
    ) -> Self {
        Self {
            work_rx,
            tasks,
            factory,
            epoch,
            backend: None,
            saturated: false,
        }
    }

    /// Worker thread main loop. Exits on `Shutdown` or when the host side is
    /// gone.
    pub(crate) fn run(mut self) {
        while let Ok(item) = self.work_rx.recv() {
            let stale = item.epoch < self.epoch.load(Ordering::Acquire);
            match item.kind {
                WorkItemKind::Shutdown => {
                    debug!("codec worker shutting down");
                    break;
                }
                _ if stale => {
                    trace!(epoch = item.epoch, "skipping stale work item");
                }
                WorkItemKind::Configure(config) => self.configure(item.epoch, config),
                WorkItemKind::SubmitInput(input, options) => {
                    self.submit(item.epoch, input, &options)
                }
                WorkItemKind::Drain(waiter_id) => self.drain(item.epoch, waiter_id),
                WorkItemKind::ReleaseBackend => {
                    trace!("releasing backend");
                    self.backend = None;
                    self.saturated = false;
                }
            }
        }
        self.backend = None;
    }

    fn configure(&mut self, epoch: u64, config: A::Config) {
        let backend = self.backend.get_or_insert_with(|| (self.factory)());
        let result = backend.configure(&config);
        self.saturated = false;
        self.tasks.post(epoch, TaskKind::ConfigureDone(result));
    }

    /// Submit one input, holding on to it through saturation. The rejected
    /// input is retried after each poll pass; if the engine has nothing ready
    /// yet the worker waits briefly instead of spinning.
    fn submit(&mut self, epoch: u64, input: A::Input, options: &A::Options) {
        let Some(mut backend) = self.backend.take() else {
            // Configure failed before this item; the host is already closing.
            return;
        };
        let mut pending = input;
        loop {
            if epoch < self.epoch.load(Ordering::Acquire) {
                trace!("dropping input invalidated mid-retry");
                break;
            }
            match backend.submit_input(pending, options) {
                SubmitOutcome::Accepted => {
                    if self.saturated {
                        self.saturated = false;
                        self.tasks.post(epoch, TaskKind::Unsaturated);
                    }
                    self.forward_outputs(epoch, backend.as_mut());
                    break;
                }
                SubmitOutcome::Saturated(rejected) => {
                    if !self.saturated {
                        self.saturated = true;
                        self.tasks.post(epoch, TaskKind::Saturated);
                    }
                    pending = rejected;
                    if !self.forward_outputs(epoch, backend.as_mut()) {
                        thread::sleep(SATURATION_RETRY_PAUSE);
                    }
                }
                SubmitOutcome::Fatal(err) => {
                    self.tasks.post(epoch, TaskKind::Fatal(err));
                    break;
                }
            }
        }
        self.backend = Some(backend);
    }

    fn drain(&mut self, epoch: u64, waiter_id: u64) {
        let Some(backend) = self.backend.as_mut() else {
            // Nothing was ever submitted; the flush trivially completes.
            self.tasks.post(epoch, TaskKind::DrainDone(waiter_id, Ok(())));
            return;
        };
        match backend.signal_eof() {
            Ok(()) => {
                let mut outputs = Vec::new();
                while let Some(output) = backend.poll_output() {
                    outputs.push(output);
                }
                if !outputs.is_empty() {
                    self.tasks.post(epoch, TaskKind::Outputs(outputs));
                }
                // The engine needs a reset after end-of-stream before it will
                // accept further input on the same configuration.
                backend.reset();
                if self.saturated {
                    self.saturated = false;
                    self.tasks.post(epoch, TaskKind::Unsaturated);
                }
                self.tasks.post(epoch, TaskKind::DrainDone(waiter_id, Ok(())));
            }
            Err(err) => {
                self.tasks
                    .post(epoch, TaskKind::DrainDone(waiter_id, Err(err)));
            }
        }
    }

    /// Poll every ready output and post them as one batch. Returns whether
    /// anything was forwarded.
    fn forward_outputs(
        &self,
        epoch: u64,
        backend: &mut dyn CodecBackend<
            Config = A::Config,
            Input = A::Input,
            Options = A::Options,
            Output = A::BackendOutput,
        >,
    ) -> bool {
        let mut outputs = Vec::new();
        while let Some(output) = backend.poll_output() {
            outputs.push(output);
        }
        if outputs.is_empty() {
            return false;
        }
        trace!(count = outputs.len(), "forwarding output batch");
        self.tasks.post(epoch, TaskKind::Outputs(outputs));
        true
    }
}
