//! EncodedAudioChunk - encoded audio data and the audio config dictionaries
//!
//! Represents a chunk of encoded audio data.
//! See: https://developer.mozilla.org/en-US/docs/Web/API/EncodedAudioChunk

use std::sync::Arc;

use crate::webcodecs::error::{type_error, WebCodecsResult};

/// Type of encoded audio chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodedAudioChunkType {
  /// Key chunk - can be decoded independently
  Key,
  /// Delta chunk - depends on previous chunks
  Delta,
}

impl EncodedAudioChunkType {
  pub fn as_str(&self) -> &'static str {
    match self {
      EncodedAudioChunkType::Key => "key",
      EncodedAudioChunkType::Delta => "delta",
    }
  }
}

/// Bitrate mode for audio encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AudioBitrateMode {
  /// Variable bitrate (default)
  #[default]
  Variable,
  /// Constant bitrate
  Constant,
}

/// Audio encoder configuration dictionary.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioEncoderConfig {
  /// Codec string (e.g. "opus", "mp4a.40.2")
  pub codec: String,
  /// Samples per second
  pub sample_rate: u32,
  /// Channel count
  pub number_of_channels: u32,
  /// Target bitrate in bits per second
  pub bitrate: Option<u64>,
  /// Bitrate mode
  pub bitrate_mode: AudioBitrateMode,
}

impl Default for AudioEncoderConfig {
  fn default() -> Self {
    Self {
      codec: String::new(),
      sample_rate: 0,
      number_of_channels: 0,
      bitrate: None,
      bitrate_mode: AudioBitrateMode::default(),
    }
  }
}

/// Audio decoder configuration dictionary. Also emitted by audio encoders as
/// per-chunk `decoder_config` metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioDecoderConfig {
  /// Codec string
  pub codec: String,
  /// Samples per second
  pub sample_rate: u32,
  /// Channel count
  pub number_of_channels: u32,
  /// Codec-specific description (e.g. AudioSpecificConfig for AAC)
  pub description: Option<Vec<u8>>,
}

impl Default for AudioDecoderConfig {
  fn default() -> Self {
    Self {
      codec: String::new(),
      sample_rate: 0,
      number_of_channels: 0,
      description: None,
    }
  }
}

/// Options for creating an EncodedAudioChunk
#[derive(Debug, Clone)]
pub struct EncodedAudioChunkInit {
  /// Chunk type (key or delta)
  pub chunk_type: EncodedAudioChunkType,
  /// Timestamp in microseconds
  pub timestamp: i64,
  /// Duration in microseconds (optional)
  pub duration: Option<i64>,
  /// Encoded data
  pub data: Vec<u8>,
}

/// EncodedAudioChunk - represents encoded audio data
///
/// Chunks are immutable; clones share the underlying byte buffer.
#[derive(Clone)]
pub struct EncodedAudioChunk {
  chunk_type: EncodedAudioChunkType,
  timestamp_us: i64,
  duration_us: Option<i64>,
  data: Arc<[u8]>,
}

impl EncodedAudioChunk {
  /// Create a new EncodedAudioChunk
  pub fn new(init: EncodedAudioChunkInit) -> WebCodecsResult<Self> {
    if init.data.is_empty() {
      return Err(type_error("data must not be empty"));
    }
    Ok(Self {
      chunk_type: init.chunk_type,
      timestamp_us: init.timestamp,
      duration_us: init.duration,
      data: init.data.into(),
    })
  }

  /// Build a chunk from backend output without init validation.
  pub(crate) fn from_parts(
    chunk_type: EncodedAudioChunkType,
    timestamp: i64,
    duration: Option<i64>,
    data: Vec<u8>,
  ) -> Self {
    Self {
      chunk_type,
      timestamp_us: timestamp,
      duration_us: duration,
      data: data.into(),
    }
  }

  /// Get the chunk type
  pub fn chunk_type(&self) -> EncodedAudioChunkType {
    self.chunk_type
  }

  /// Get the timestamp in microseconds
  pub fn timestamp(&self) -> i64 {
    self.timestamp_us
  }

  /// Get the duration in microseconds
  pub fn duration(&self) -> Option<i64> {
    self.duration_us
  }

  /// Get the byte length of the encoded data
  pub fn byte_length(&self) -> usize {
    self.data.len()
  }

  /// Borrow the encoded bytes
  pub fn data(&self) -> &[u8] {
    &self.data
  }

  /// Copy the encoded data into `destination`.
  /// Fails with TypeError if the destination is too small.
  pub fn copy_to(&self, destination: &mut [u8]) -> WebCodecsResult<()> {
    if destination.len() < self.data.len() {
      return Err(type_error(&format!(
        "destination is too small: need {} bytes, got {}",
        self.data.len(),
        destination.len()
      )));
    }
    destination[..self.data.len()].copy_from_slice(&self.data);
    Ok(())
  }

  /// Check if this is a key chunk
  pub fn is_key(&self) -> bool {
    self.chunk_type == EncodedAudioChunkType::Key
  }
}
