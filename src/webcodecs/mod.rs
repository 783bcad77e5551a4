//! WebCodecs API surface
//!
//! The four codec shells plus the raw and encoded media value objects and
//! the configuration dictionaries they exchange.
//! See: https://developer.mozilla.org/en-US/docs/Web/API/WebCodecs_API

mod audio_data;
mod audio_decoder;
mod audio_encoder;
mod encoded_audio_chunk;
mod encoded_video_chunk;
pub mod error;
mod video_decoder;
mod video_encoder;
mod video_frame;

pub use audio_data::{AudioData, AudioDataInit, AudioSampleFormat};
pub use audio_decoder::{AudioDecoder, AudioDecoderBackendFactory, BoxedAudioDecoderBackend};
pub use audio_encoder::{
    AudioEncoder, AudioEncoderBackendFactory, AudioEncoderEncodeOptions, BoxedAudioEncoderBackend,
    EncodedAudioChunkMetadata,
};
pub use encoded_audio_chunk::{
    AudioBitrateMode, AudioDecoderConfig, AudioEncoderConfig, EncodedAudioChunk,
    EncodedAudioChunkInit, EncodedAudioChunkType,
};
pub use encoded_video_chunk::{
    AlphaOption, EncodedVideoChunk, EncodedVideoChunkInit, EncodedVideoChunkType,
    HardwareAcceleration, LatencyMode, VideoColorSpace, VideoDecoderConfig,
    VideoEncoderBitrateMode, VideoEncoderConfig,
};
pub use error::{WebCodecsError, WebCodecsResult};
pub use video_decoder::{BoxedVideoDecoderBackend, VideoDecoder, VideoDecoderBackendFactory};
pub use video_encoder::{
    BoxedVideoEncoderBackend, EncodedVideoChunkMetadata, SvcOutputMetadata, VideoEncoder,
    VideoEncoderBackendFactory, VideoEncoderEncodeOptions,
};
pub use video_frame::{VideoFrame, VideoFrameInit, VideoPixelFormat};
