//! Codec backend contract
//!
//! The native engine behind every codec instance is opaque to the processing
//! model: it is created by a factory when the first configure work item runs,
//! owned exclusively by the instance's worker thread, and driven strictly
//! serially. Anything format-specific (pixel conversion, bitstream parsing,
//! B-frame reordering) happens behind this trait.

use thiserror::Error;

/// Backend failure modes surfaced to the processing model.
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    /// The backend declines the configuration outright.
    #[error("unsupported configuration: {0}")]
    Unsupported(String),

    /// The configuration is recognized but cannot be applied.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// Unrecoverable failure while processing input or draining output.
    #[error("codec failure: {0}")]
    Fatal(String),
}

/// Outcome of handing one input to the backend.
///
/// `Saturated` returns the rejected input to the caller; it must be
/// resubmitted after the next `poll_output` makes progress.
pub enum SubmitOutcome<I> {
    /// Input accepted; outputs may now be ready to poll.
    Accepted,
    /// Backend cannot take more input right now.
    Saturated(I),
    /// Unrecoverable failure; the instance will close with an error.
    Fatal(BackendError),
}

/// One native codec engine instance.
///
/// Exactly one worker thread drives a backend; implementations never need
/// internal locking. Calls may block - the worker thread is allowed to wait
/// inside the engine, the host thread never is.
pub trait CodecBackend: Send {
    /// Codec configuration record this backend understands.
    type Config;
    /// Raw input unit (frame for encoders, chunk for decoders).
    type Input;
    /// Per-input options (key-frame forcing and the like).
    type Options;
    /// Output unit handed back through `poll_output`.
    type Output;

    /// Apply a configuration. Called for the initial configure and again for
    /// every reconfigure on the same instance.
    fn configure(&mut self, config: &Self::Config) -> Result<(), BackendError>;

    /// Hand one input to the engine.
    fn submit_input(
        &mut self,
        input: Self::Input,
        options: &Self::Options,
    ) -> SubmitOutcome<Self::Input>;

    /// Non-blocking poll for the next ready output.
    ///
    /// After `signal_eof` has returned `Ok`, the remaining pipeline contents
    /// must all be observable through successive calls; `None` then means the
    /// pipeline is empty.
    fn poll_output(&mut self) -> Option<Self::Output>;

    /// Flush the internal pipeline so every pending output becomes ready.
    fn signal_eof(&mut self) -> Result<(), BackendError>;

    /// Discard internal state while retaining the applied configuration.
    fn reset(&mut self);
}

/// Encoded bitstream unit produced by a video encoder backend.
#[derive(Debug, Clone)]
pub struct VideoEncodedPayload {
    /// Key frame (decodable independently) vs delta frame.
    pub key: bool,
    /// Encoded bytes.
    pub data: Vec<u8>,
    /// Presentation timestamp in microseconds, from the originating frame.
    pub timestamp_us: i64,
    /// Duration in microseconds, if the originating frame carried one.
    pub duration_us: Option<i64>,
    /// Codec-specific description (e.g. avcC) when the engine exposes one.
    pub extradata: Option<Vec<u8>>,
    /// Temporal layer this payload belongs to, for SVC encodes.
    pub temporal_layer_id: Option<u32>,
    /// Encoded alpha plane side data, when the engine produced one.
    pub alpha_data: Option<Vec<u8>>,
}

/// Encoded bitstream unit produced by an audio encoder backend.
#[derive(Debug, Clone)]
pub struct AudioEncodedPayload {
    /// Key chunk vs delta chunk.
    pub key: bool,
    /// Encoded bytes.
    pub data: Vec<u8>,
    /// Presentation timestamp in microseconds.
    pub timestamp_us: i64,
    /// Duration in microseconds.
    pub duration_us: Option<i64>,
    /// Codec-specific description (e.g. AudioSpecificConfig).
    pub extradata: Option<Vec<u8>>,
}
