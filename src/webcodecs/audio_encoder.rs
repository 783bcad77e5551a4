//! AudioEncoder - WebCodecs API implementation
//!
//! Compresses AudioData objects into EncodedAudioChunk objects through a
//! caller-supplied backend.
//! See: https://developer.mozilla.org/en-US/docs/Web/API/AudioEncoder

use std::sync::Arc;

use crate::codec::backend::{AudioEncodedPayload, CodecBackend};
use crate::codec::core::{CodecAdapter, CodecCore, CodecState, FlushHandle};
use crate::codec::resource::{CodecKind, ResourceManager};
use crate::webcodecs::audio_data::AudioData;
use crate::webcodecs::encoded_audio_chunk::{
    AudioDecoderConfig, AudioEncoderConfig, EncodedAudioChunk, EncodedAudioChunkType,
};
use crate::webcodecs::error::{type_error, WebCodecsError, WebCodecsResult};

/// Encode options (reserved for future per-chunk hints)
#[derive(Debug, Clone, Default)]
pub struct AudioEncoderEncodeOptions {}

/// Output callback metadata
#[derive(Debug, Clone, Default)]
pub struct EncodedAudioChunkMetadata {
    /// Decoder configuration for this chunk; present on the first chunk and
    /// whenever the derived configuration changes
    pub decoder_config: Option<AudioDecoderConfig>,
}

/// Boxed backend driving an AudioEncoder.
pub type BoxedAudioEncoderBackend = Box<
    dyn CodecBackend<
        Config = AudioEncoderConfig,
        Input = AudioData,
        Options = AudioEncoderEncodeOptions,
        Output = AudioEncodedPayload,
    >,
>;

/// Backend factory, invoked on the worker thread when the first configure
/// work item runs.
pub type AudioEncoderBackendFactory = Arc<dyn Fn() -> BoxedAudioEncoderBackend + Send + Sync>;

struct AudioEncodeAdapter {
    /// Last decoder config emitted in metadata, for dedup.
    active_output_config: Option<AudioDecoderConfig>,
}

impl CodecAdapter for AudioEncodeAdapter {
    type Config = AudioEncoderConfig;
    type Input = AudioData;
    type Options = AudioEncoderEncodeOptions;
    type BackendOutput = AudioEncodedPayload;
    type Output = (EncodedAudioChunk, EncodedAudioChunkMetadata);

    const KIND: CodecKind = CodecKind::AudioEncoder;

    fn validate_config(config: &AudioEncoderConfig) -> WebCodecsResult<()> {
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

    fn claim_input(&self, data: &AudioData) -> WebCodecsResult<AudioData> {
        data.try_clone()
            .map_err(|_| type_error("AudioData is detached"))
    }

    fn accept_input(&mut self, _data: &AudioData) -> WebCodecsResult<()> {
        Ok(())
    }

    fn on_configure(&mut self, _config: &AudioEncoderConfig) {
        self.active_output_config = None;
    }

    fn on_reset(&mut self) {
        self.active_output_config = None;
    }

    fn finish_output(
        &mut self,
        config: &AudioEncoderConfig,
        payload: AudioEncodedPayload,
    ) -> Self::Output {
        let derived = AudioDecoderConfig {
            codec: config.codec.clone(),
            sample_rate: config.sample_rate,
            number_of_channels: config.number_of_channels,
            description: payload.extradata.clone(),
        };
        let decoder_config = if self.active_output_config.as_ref() != Some(&derived) {
            self.active_output_config = Some(derived.clone());
            Some(derived)
        } else {
            None
        };

        let chunk = EncodedAudioChunk::from_parts(
            if payload.key {
                EncodedAudioChunkType::Key
            } else {
                EncodedAudioChunkType::Delta
            },
            payload.timestamp_us,
            payload.duration_us,
            payload.data,
        );

        (chunk, EncodedAudioChunkMetadata { decoder_config })
    }
}

/// AudioEncoder - WebCodecs-compliant audio encoder
pub struct AudioEncoder {
    core: CodecCore<AudioEncodeAdapter>,
}

impl AudioEncoder {
    /// Create a new AudioEncoder registered with the process-wide resource
    /// manager.
    pub fn new<O, E>(backend: AudioEncoderBackendFactory, output: O, error: E) -> Self
    where
        O: Fn(EncodedAudioChunk, EncodedAudioChunkMetadata) + Send + Sync + 'static,
        E: Fn(WebCodecsError) + Send + Sync + 'static,
    {
        Self::with_resource_manager(backend, output, error, ResourceManager::global())
    }

    /// Create an AudioEncoder registered with a specific resource manager.
    pub fn with_resource_manager<O, E>(
        backend: AudioEncoderBackendFactory,
        output: O,
        error: E,
        resources: Arc<ResourceManager>,
    ) -> Self
    where
        O: Fn(EncodedAudioChunk, EncodedAudioChunkMetadata) + Send + Sync + 'static,
        E: Fn(WebCodecsError) + Send + Sync + 'static,
    {
        let core = CodecCore::new(
            AudioEncodeAdapter {
                active_output_config: None,
            },
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

    /// Number of buffers accepted but not yet handed to the backend worker
    pub fn encode_queue_size(&self) -> u32 {
        self.core.queue_size()
    }

    /// Resource-manager key for this instance
    pub fn instance_id(&self) -> u64 {
        self.core.instance_id()
    }

    /// Configure the encoder
    pub fn configure(&self, config: AudioEncoderConfig) -> WebCodecsResult<()> {
        self.core.configure(config)
    }

    /// Encode an audio buffer
    pub fn encode(&self, data: &AudioData) -> WebCodecsResult<()> {
        self.core
            .submit(data, AudioEncoderEncodeOptions::default())
    }

    /// Flush all queued buffers through the backend
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_validation() {
        let mut config = AudioEncoderConfig {
            codec: "opus".to_string(),
            sample_rate: 48_000,
            number_of_channels: 2,
            ..AudioEncoderConfig::default()
        };
        assert!(AudioEncodeAdapter::validate_config(&config).is_ok());

        config.sample_rate = 0;
        assert_eq!(
            AudioEncodeAdapter::validate_config(&config)
                .err()
                .map(|e| e.name()),
            Some("TypeError")
        );
    }

    #[test]
    fn decoder_config_dedup() {
        let config = AudioEncoderConfig {
            codec: "opus".to_string(),
            sample_rate: 48_000,
            number_of_channels: 2,
            ..AudioEncoderConfig::default()
        };
        let mut adapter = AudioEncodeAdapter {
            active_output_config: None,
        };
        adapter.on_configure(&config);

        let payload = AudioEncodedPayload {
            key: true,
            data: vec![1],
            timestamp_us: 0,
            duration_us: Some(20_000),
            extradata: None,
        };
        let (_, first) = adapter.finish_output(&config, payload.clone());
        assert!(first.decoder_config.is_some());
        let (_, second) = adapter.finish_output(&config, payload);
        assert!(second.decoder_config.is_none());
    }
}
