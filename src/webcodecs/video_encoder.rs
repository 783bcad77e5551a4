//! VideoEncoder - WebCodecs API implementation
//!
//! Compresses VideoFrame objects into EncodedVideoChunk objects through a
//! caller-supplied backend.
//! See: https://developer.mozilla.org/en-US/docs/Web/API/VideoEncoder
//!
//! Outputs are delivered through the output callback on the instance's
//! dispatcher thread, in encode order. The derived decoder configuration is
//! attached to a chunk's metadata only when it differs from the last one
//! emitted; the encoder's orientation is locked by the first accepted frame.

use std::sync::Arc;

use crate::codec::backend::{CodecBackend, VideoEncodedPayload};
use crate::codec::core::{CodecAdapter, CodecCore, CodecState, FlushHandle};
use crate::codec::resource::{CodecKind, ResourceManager};
use crate::webcodecs::encoded_video_chunk::{
    AlphaOption, EncodedVideoChunk, EncodedVideoChunkType, VideoDecoderConfig, VideoEncoderConfig,
};
use crate::webcodecs::error::{data_error, type_error, WebCodecsError, WebCodecsResult};
use crate::webcodecs::video_frame::VideoFrame;

/// Encode options
#[derive(Debug, Clone, Default)]
pub struct VideoEncoderEncodeOptions {
    /// Force this frame to be a keyframe
    pub key_frame: Option<bool>,
}

/// SVC metadata attached to chunks of temporally scalable encodes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SvcOutputMetadata {
    /// Temporal layer this chunk belongs to
    pub temporal_layer_id: u32,
}

/// Output callback metadata
#[derive(Debug, Clone, Default)]
pub struct EncodedVideoChunkMetadata {
    /// Decoder configuration for this chunk; present on the first chunk and
    /// whenever the derived configuration changes
    pub decoder_config: Option<VideoDecoderConfig>,
    /// Present when the active configuration has more than one temporal layer
    pub svc: Option<SvcOutputMetadata>,
    /// Encoded alpha side data, when `alpha: keep` and the backend produced it
    pub alpha_side_data: Option<Vec<u8>>,
}

/// Boxed backend driving a VideoEncoder.
pub type BoxedVideoEncoderBackend = Box<
    dyn CodecBackend<
        Config = VideoEncoderConfig,
        Input = VideoFrame,
        Options = VideoEncoderEncodeOptions,
        Output = VideoEncodedPayload,
    >,
>;

/// Backend factory, invoked on the worker thread when the first configure
/// work item runs.
pub type VideoEncoderBackendFactory = Arc<dyn Fn() -> BoxedVideoEncoderBackend + Send + Sync>;

/// Host-side per-type state for the generic core.
struct VideoEncodeAdapter {
    /// Locked by the first accepted frame; cleared on configure/reset.
    orientation: Option<(u32, bool)>,
    /// Last decoder config emitted in metadata, for dedup.
    active_output_config: Option<VideoDecoderConfig>,
    temporal_layers: u32,
    alpha: AlphaOption,
}

impl VideoEncodeAdapter {
    fn new() -> Self {
        Self {
            orientation: None,
            active_output_config: None,
            temporal_layers: 1,
            alpha: AlphaOption::Discard,
        }
    }
}

impl CodecAdapter for VideoEncodeAdapter {
    type Config = VideoEncoderConfig;
    type Input = VideoFrame;
    type Options = VideoEncoderEncodeOptions;
    type BackendOutput = VideoEncodedPayload;
    type Output = (EncodedVideoChunk, EncodedVideoChunkMetadata);

    const KIND: CodecKind = CodecKind::VideoEncoder;

    fn validate_config(config: &VideoEncoderConfig) -> WebCodecsResult<()> {
        if config.codec.is_empty() {
            return Err(type_error("codec is required"));
        }
        if config.width == 0 || config.height == 0 {
            return Err(type_error("width and height must be positive"));
        }
        if config.display_width == Some(0) || config.display_height == Some(0) {
            return Err(type_error("displayWidth and displayHeight must be positive"));
        }
        Ok(())
    }

    fn claim_input(&self, frame: &VideoFrame) -> WebCodecsResult<VideoFrame> {
        frame
            .try_clone()
            .map_err(|_| type_error("frame is detached"))
    }

    fn accept_input(&mut self, frame: &VideoFrame) -> WebCodecsResult<()> {
        let orientation = (frame.rotation()?, frame.flip()?);
        match self.orientation {
            Some(locked) if locked != orientation => Err(data_error(
                "frame orientation does not match previously encoded frames",
            )),
            Some(_) => Ok(()),
            None => {
                self.orientation = Some(orientation);
                Ok(())
            }
        }
    }

    fn on_configure(&mut self, config: &VideoEncoderConfig) {
        self.orientation = None;
        self.active_output_config = None;
        self.temporal_layers = config
            .scalability_mode
            .as_deref()
            .and_then(parse_scalability_mode)
            .map(|(_, temporal)| temporal)
            .unwrap_or(1);
        self.alpha = config.alpha;
    }

    fn on_reset(&mut self) {
        self.orientation = None;
        self.active_output_config = None;
        self.temporal_layers = 1;
        self.alpha = AlphaOption::Discard;
    }

    fn finish_output(
        &mut self,
        config: &VideoEncoderConfig,
        payload: VideoEncodedPayload,
    ) -> Self::Output {
        let (rotation, flip) = self.orientation.unwrap_or((0, false));
        let derived = VideoDecoderConfig {
            codec: config.codec.clone(),
            coded_width: Some(config.width),
            coded_height: Some(config.height),
            display_aspect_width: config.display_width,
            display_aspect_height: config.display_height,
            description: payload.extradata.clone(),
            color_space: None,
            hardware_acceleration: config.hardware_acceleration,
            rotation,
            flip,
        };
        let decoder_config = if self.active_output_config.as_ref() != Some(&derived) {
            self.active_output_config = Some(derived.clone());
            Some(derived)
        } else {
            None
        };

        let svc = (self.temporal_layers > 1).then(|| SvcOutputMetadata {
            temporal_layer_id: payload.temporal_layer_id.unwrap_or(0),
        });
        let alpha_side_data = if self.alpha == AlphaOption::Keep {
            payload.alpha_data
        } else {
            None
        };

        let chunk = EncodedVideoChunk::from_parts(
            if payload.key {
                EncodedVideoChunkType::Key
            } else {
                EncodedVideoChunkType::Delta
            },
            payload.timestamp_us,
            payload.duration_us,
            payload.data,
        );

        (
            chunk,
            EncodedVideoChunkMetadata {
                decoder_config,
                svc,
                alpha_side_data,
            },
        )
    }
}

/// VideoEncoder - WebCodecs-compliant video encoder
///
/// Frames are accepted on the caller's thread and dispatched to a dedicated
/// worker that drives the backend; chunks come back through the output
/// callback.
pub struct VideoEncoder {
    core: CodecCore<VideoEncodeAdapter>,
}

impl VideoEncoder {
    /// Create a new VideoEncoder registered with the process-wide resource
    /// manager.
    ///
    /// The output callback receives every encoded chunk with its metadata;
    /// the error callback fires once if the encoder closes on an error.
    pub fn new<O, E>(backend: VideoEncoderBackendFactory, output: O, error: E) -> Self
    where
        O: Fn(EncodedVideoChunk, EncodedVideoChunkMetadata) + Send + Sync + 'static,
        E: Fn(WebCodecsError) + Send + Sync + 'static,
    {
        Self::with_resource_manager(backend, output, error, ResourceManager::global())
    }

    /// Create a VideoEncoder registered with a specific resource manager.
    pub fn with_resource_manager<O, E>(
        backend: VideoEncoderBackendFactory,
        output: O,
        error: E,
        resources: Arc<ResourceManager>,
    ) -> Self
    where
        O: Fn(EncodedVideoChunk, EncodedVideoChunkMetadata) + Send + Sync + 'static,
        E: Fn(WebCodecsError) + Send + Sync + 'static,
    {
        let core = CodecCore::new(
            VideoEncodeAdapter::new(),
            backend,
            Arc::new(move |(chunk, metadata)| output(chunk, metadata)),
            Arc::new(error),
            resources,
        );
        Self { core }
    }

    /// Get encoder state
    pub fn state(&self) -> CodecState {
        self.core.state()
    }

    /// Number of frames accepted but not yet handed to the backend worker
    pub fn encode_queue_size(&self) -> u32 {
        self.core.queue_size()
    }

    /// Resource-manager key for this instance
    pub fn instance_id(&self) -> u64 {
        self.core.instance_id()
    }

    /// Configure the encoder
    pub fn configure(&self, config: VideoEncoderConfig) -> WebCodecsResult<()> {
        self.core.configure(config)
    }

    /// Encode a frame
    pub fn encode(&self, frame: &VideoFrame) -> WebCodecsResult<()> {
        self.core
            .submit(frame, VideoEncoderEncodeOptions::default())
    }

    /// Encode a frame with options (e.g. key-frame forcing)
    pub fn encode_with_options(
        &self,
        frame: &VideoFrame,
        options: VideoEncoderEncodeOptions,
    ) -> WebCodecsResult<()> {
        self.core.submit(frame, options)
    }

    /// Flush all queued frames through the backend. The handle resolves when
    /// every output has been emitted and rejects on reset/close or backend
    /// failure.
    pub fn flush(&self) -> FlushHandle {
        self.core.flush()
    }

    /// Reset the encoder to `Unconfigured`, dropping queued work
    pub fn reset(&self) -> WebCodecsResult<()> {
        self.core.reset()
    }

    /// Close the encoder. Idempotent.
    pub fn close(&self) {
        self.core.close()
    }

    /// Install or clear the coalesced dequeue notification handler
    pub fn set_ondequeue<F>(&self, handler: Option<F>)
    where
        F: Fn(u32) + Send + Sync + 'static,
    {
        self.core
            .set_dequeue_callback(handler.map(|f| Arc::new(f) as _));
    }

    /// Mark this encoder background/foreground for reclamation purposes
    pub fn set_background(&self, background: bool) {
        self.core.set_background(background);
    }

    /// Assign this encoder to a logical reclaim group
    pub fn set_reclaim_group(&self, group: Option<u64>) {
        self.core.set_reclaim_group(group);
    }
}

/// Parse a scalability mode string (e.g. "L1T1", "L1T2", "L1T3").
/// Returns (spatial_layers, temporal_layers).
fn parse_scalability_mode(mode: &str) -> Option<(u32, u32)> {
    let mode_upper = mode.to_uppercase();

    if mode_upper.starts_with('L') && mode_upper.contains('T') {
        let parts: Vec<&str> = mode_upper.split('T').collect();
        if parts.len() == 2 {
            let spatial = parts[0].trim_start_matches('L').parse::<u32>().ok()?;
            let temporal = parts[1].chars().next()?.to_digit(10)?;
            return Some((spatial, temporal));
        }
    }

    None
}
