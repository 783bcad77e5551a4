//! Server-side implementation of the W3C WebCodecs codec processing model
//!
//! Four codec instances - `VideoEncoder`, `VideoDecoder`, `AudioEncoder`,
//! `AudioDecoder` - share one asynchronous processing core: a control-message
//! queue on the host side, a work queue drained by a per-instance worker
//! thread that exclusively owns an opaque codec backend, and a task source
//! delivering outputs, errors and flush completions back to the host.
//!
//! The backend is supplied by the embedder as a [`CodecBackend`]
//! implementation (an FFmpeg wrapper, a hardware engine, or the bundled
//! deterministic dummies in [`codec::dummy`]); everything format-specific
//! lives behind that trait.
//!
//! ```no_run
//! use webcodec_core::codec::dummy::DummyVideoEncoder;
//! use webcodec_core::{VideoEncoder, VideoEncoderConfig};
//!
//! let encoder = VideoEncoder::new(
//!     DummyVideoEncoder::factory(),
//!     |chunk, metadata| {
//!         println!("chunk {} ({} bytes)", chunk.timestamp(), chunk.byte_length());
//!         if metadata.decoder_config.is_some() {
//!             println!("new decoder config");
//!         }
//!     },
//!     |error| eprintln!("encoder error: {error}"),
//! );
//! encoder
//!     .configure(VideoEncoderConfig {
//!         codec: "vp8".to_string(),
//!         width: 640,
//!         height: 360,
//!         ..VideoEncoderConfig::default()
//!     })
//!     .expect("configure");
//! ```

pub mod codec;
pub mod webcodecs;

pub use codec::{
    AudioEncodedPayload, BackendError, CodecBackend, CodecKind, CodecState, FlushHandle,
    ResourceManager, SubmitOutcome, VideoEncodedPayload,
};
pub use webcodecs::{
    AlphaOption, AudioBitrateMode, AudioData, AudioDataInit, AudioDecoder, AudioDecoderConfig,
    AudioEncoder, AudioEncoderConfig, AudioEncoderEncodeOptions, AudioSampleFormat,
    EncodedAudioChunk, EncodedAudioChunkInit, EncodedAudioChunkMetadata, EncodedAudioChunkType,
    EncodedVideoChunk, EncodedVideoChunkInit, EncodedVideoChunkMetadata, EncodedVideoChunkType,
    HardwareAcceleration, LatencyMode, SvcOutputMetadata, VideoColorSpace, VideoDecoder,
    VideoDecoderConfig, VideoEncoder, VideoEncoderBitrateMode, VideoEncoderConfig,
    VideoEncoderEncodeOptions, VideoFrame, VideoFrameInit, VideoPixelFormat, WebCodecsError,
    WebCodecsResult,
};
