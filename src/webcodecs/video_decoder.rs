//! VideoDecoder - WebCodecs API implementation
//!
//! Decompresses EncodedVideoChunk objects into VideoFrame objects through a
//! caller-supplied backend.
//! See: https://developer.mozilla.org/en-US/docs/Web/API/VideoDecoder
//!
//! The first chunk after every configure must be a key chunk; that is
//! enforced on the host side before the chunk ever reaches the backend.
//! Later `type` fields are trusted as classified by the producer.

use std::sync::Arc;

use crate::codec::backend::CodecBackend;
use crate::codec::core::{CodecAdapter, CodecCore, CodecState, FlushHandle};
use crate::codec::resource::{CodecKind, ResourceManager};
use crate::webcodecs::encoded_video_chunk::{
    EncodedVideoChunk, EncodedVideoChunkType, VideoDecoderConfig,
};
use crate::webcodecs::error::{data_error, type_error, WebCodecsError, WebCodecsResult};
use crate::webcodecs::video_frame::VideoFrame;

/// Boxed backend driving a VideoDecoder.
pub type BoxedVideoDecoderBackend = Box<
    dyn CodecBackend<
        Config = VideoDecoderConfig,
        Input = EncodedVideoChunk,
        Options = (),
        Output = VideoFrame,
    >,
>;

/// Backend factory, invoked on the worker thread when the first configure
/// work item runs.
pub type VideoDecoderBackendFactory = Arc<dyn Fn() -> BoxedVideoDecoderBackend + Send + Sync>;

struct VideoDecodeAdapter {
    /// Set by configure; cleared by the first accepted chunk.
    await_key_chunk: bool,
}

impl CodecAdapter for VideoDecodeAdapter {
    type Config = VideoDecoderConfig;
    type Input = EncodedVideoChunk;
    type Options = ();
    type BackendOutput = VideoFrame;
    type Output = VideoFrame;

    const KIND: CodecKind = CodecKind::VideoDecoder;

    fn validate_config(config: &VideoDecoderConfig) -> WebCodecsResult<()> {
        if config.codec.is_empty() {
            return Err(type_error("codec is required"));
        }
        if config.coded_width == Some(0) || config.coded_height == Some(0) {
            return Err(type_error("codedWidth and codedHeight must be positive"));
        }
        if !matches!(config.rotation, 0 | 90 | 180 | 270) {
            return Err(type_error("rotation must be one of 0, 90, 180, 270"));
        }
        Ok(())
    }

    fn claim_input(&self, chunk: &EncodedVideoChunk) -> WebCodecsResult<EncodedVideoChunk> {
        Ok(chunk.clone())
    }

    fn accept_input(&mut self, chunk: &EncodedVideoChunk) -> WebCodecsResult<()> {
        if self.await_key_chunk {
            if chunk.chunk_type() != EncodedVideoChunkType::Key {
                return Err(data_error(
                    "first chunk after configure must be a key chunk",
                ));
            }
            self.await_key_chunk = false;
        }
        Ok(())
    }

    fn on_configure(&mut self, _config: &VideoDecoderConfig) {
        self.await_key_chunk = true;
    }

    fn on_reset(&mut self) {
        self.await_key_chunk = true;
    }

    fn finish_output(&mut self, _config: &VideoDecoderConfig, frame: VideoFrame) -> VideoFrame {
        frame
    }
}

/// VideoDecoder - WebCodecs-compliant video decoder
///
/// Chunks are accepted on the caller's thread and dispatched to a dedicated
/// worker that drives the backend; frames come back through the output
/// callback in presentation order (reordering is the backend's concern).
pub struct VideoDecoder {
    core: CodecCore<VideoDecodeAdapter>,
}

impl VideoDecoder {
    /// Create a new VideoDecoder registered with the process-wide resource
    /// manager.
    pub fn new<O, E>(backend: VideoDecoderBackendFactory, output: O, error: E) -> Self
    where
        O: Fn(VideoFrame) + Send + Sync + 'static,
        E: Fn(WebCodecsError) + Send + Sync + 'static,
    {
        Self::with_resource_manager(backend, output, error, ResourceManager::global())
    }

    /// Create a VideoDecoder registered with a specific resource manager.
    pub fn with_resource_manager<O, E>(
        backend: VideoDecoderBackendFactory,
        output: O,
        error: E,
        resources: Arc<ResourceManager>,
    ) -> Self
    where
        O: Fn(VideoFrame) + Send + Sync + 'static,
        E: Fn(WebCodecsError) + Send + Sync + 'static,
    {
        let core = CodecCore::new(
            VideoDecodeAdapter {
                await_key_chunk: true,
            },
            backend,
            Arc::new(output),
            Arc::new(error),
            resources,
        );
        Self { core }
    }

    /// Get decoder state
    pub fn state(&self) -> CodecState {
        self.core.state()
    }

    /// Number of chunks accepted but not yet handed to the backend worker
    pub fn decode_queue_size(&self) -> u32 {
        self.core.queue_size()
    }

    /// Resource-manager key for this instance
    pub fn instance_id(&self) -> u64 {
        self.core.instance_id()
    }

    /// Configure the decoder
    pub fn configure(&self, config: VideoDecoderConfig) -> WebCodecsResult<()> {
        self.core.configure(config)
    }

    /// Decode a chunk
    pub fn decode(&self, chunk: &EncodedVideoChunk) -> WebCodecsResult<()> {
        self.core.submit(chunk, ())
    }

    /// Flush all queued chunks through the backend
    pub fn flush(&self) -> FlushHandle {
        self.core.flush()
    }

    /// Reset the decoder to `Unconfigured`, dropping queued work
    pub fn reset(&self) -> WebCodecsResult<()> {
        self.core.reset()
    }

    /// Close the decoder. Idempotent.
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

    /// Mark this decoder background/foreground for reclamation purposes
    pub fn set_background(&self, background: bool) {
        self.core.set_background(background);
    }

    /// Assign this decoder to a logical reclaim group
    pub fn set_reclaim_group(&self, group: Option<u64>) {
        self.core.set_reclaim_group(group);
    }
}
