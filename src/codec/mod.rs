//! Codec processing machinery
//!
//! Everything between the public codec shells and the native engine: the
//! backend contract, the two-tier queueing model (control messages on the
//! host side, work items on a per-instance worker thread), the generic codec
//! core that owns the state machine, and the process-wide resource manager.

pub mod backend;
pub(crate) mod control;
pub(crate) mod core;
pub mod dummy;
pub mod resource;
pub(crate) mod task;
pub(crate) mod work;

pub use self::backend::{
    AudioEncodedPayload, BackendError, CodecBackend, SubmitOutcome, VideoEncodedPayload,
};
pub use self::core::{CodecState, DequeueCallback, ErrorCallback, FlushHandle, OutputCallback};
pub use self::resource::{CodecKind, ResourceManager, DEFAULT_INACTIVITY_WINDOW};
