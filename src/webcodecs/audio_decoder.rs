//! AudioDecoder - WebCodecs API implementation
//!
//! Decompresses EncodedAudioChunk objects into AudioData objects through a
//! caller-supplied backend.
//! See: https://developer.mozilla.org/en-US/docs/Web/API/AudioDecoder
//!
//! Like the video decoder, the first chunk after every configure must be a
//! key chunk, enforced before the chunk reaches the backend.

use std::sync::Arc;

use crate::codec::backend::CodecBackend;
use crate::codec::core::{CodecAdapter, CodecCore, CodecState, FlushHandle};
use crate::codec::resource::{CodecKind, ResourceManager};
use crate::webcodecs::audio_data::AudioData;
use crate::webcodecs::encoded_audio_chunk::{
    AudioDecoderConfig, EncodedAudioChunk, EncodedAudioChunkType,
};
use crate::webcodecs::error::{data_error, type_error, WebCodecsError, WebCodecsResult};

/// Boxed backend driving an AudioDecoder.
pub type BoxedAudioDecoderBackend = Box<
    dyn CodecBackend<
        Config = AudioDecoderConfig,
        Input = EncodedAudioChunk,
        Options = (),
        Output = AudioData,
    >,
>;

/// Backend factory, invoked on the worker thread when the first configure
/// work item runs.
pub type AudioDecoderBackendFactory = Arc<dyn Fn() -> BoxedAudioDecoderBackend + Send + Sync>;

struct AudioDecodeAdapter {
    /// Set by configure; cleared by the first accepted chunk.
    await_key_chunk: bool,
}

impl CodecAdapter for AudioDecodeAdapter {
    type Config = AudioDecoderConfig;
    type Input = EncodedAudioChunk;
    type Options = ();
    type BackendOutput = AudioData;
    type Output = AudioData;

    const KIND: CodecKind = CodecKind::AudioDecoder;

    fn validate_config(config: &AudioDecoderConfig) -> WebCodecsResult<()> {
        if config.codec.is_empty() {
            return Err(type_error("codec is required"));
        }
        if config.sample_rate == 0 {
            return Err(type_error("sampleRate must be positive"));
        }
        if config.number_of_channels == 0 {
            return Err(type_error("numberOfChannels must be positive"));
        }
        Ok(())
    }

    fn claim_input(&self, chunk: &EncodedAudioChunk) -> WebCodecsResult<EncodedAudioChunk> {
        Ok(chunk.clone())
    }

    fn accept_input(&mut self, chunk: &EncodedAudioChunk) -> WebCodecsResult<()> {
        if self.await_key_chunk {
            if chunk.chunk_type() != EncodedAudioChunkType::Key {
                return Err(data_error(
                    "first chunk after configure must be a key chunk",
                ));
            }
            self.await_key_chunk = false;
        }
        Ok(())
    }

    fn on_configure(&mut self, _config: &AudioDecoderConfig) {
        self.await_key_chunk = true;
    }

    fn on_reset(&mut self) {
        self.await_key_chunk = true;
    }

    fn finish_output(&mut self, _config: &AudioDecoderConfig, data: AudioData) -> AudioData {
        data
    }
}

/// AudioDecoder - WebCodecs-compliant audio decoder
pub struct AudioDecoder {
    core: CodecCore<AudioDecodeAdapter>,
}

impl AudioDecoder {
    /// Create a new AudioDecoder registered with the process-wide resource
    /// manager.
    pub fn new<O, E>(backend: AudioDecoderBackendFactory, output: O, error: E) -> Self
    where
        O: Fn(AudioData) + Send + Sync + 'static,
        E: Fn(WebCodecsError) + Send + Sync + 'static,
    {
        Self::with_resource_manager(backend, output, error, ResourceManager::global())
    }

    /// Create an AudioDecoder registered with a specific resource manager.
    pub fn with_resource_manager<O, E>(
        backend: AudioDecoderBackendFactory,
        output: O,
        error: E,
        resources: Arc<ResourceManager>,
    ) -> Self
    where
        O: Fn(AudioData) + Send + Sync + 'static,
        E: Fn(WebCodecsError) + Send + Sync + 'static,
    {
        let core = CodecCore::new(
            AudioDecodeAdapter {
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
    pub fn configure(&self, config: AudioDecoderConfig) -> WebCodecsResult<()> {
        self.core.configure(config)
    }

    /// Decode a chunk
    pub fn decode(&self, chunk: &EncodedAudioChunk) -> WebCodecsResult<()> {
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
