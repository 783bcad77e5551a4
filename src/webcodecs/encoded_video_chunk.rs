//! EncodedVideoChunk - encoded video data and the video config dictionaries
//!
//! Represents a chunk of encoded video data.
//! See: https://developer.mozilla.org/en-US/docs/Web/API/EncodedVideoChunk

use std::sync::Arc;

use crate::webcodecs::error::{type_error, WebCodecsResult};

/// Type of encoded video chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodedVideoChunkType {
  /// Keyframe - can be decoded independently
  Key,
  /// Delta frame - depends on previous frames
  Delta,
}

impl EncodedVideoChunkType {
  pub fn as_str(&self) -> &'static str {
    match self {
      EncodedVideoChunkType::Key => "key",
      EncodedVideoChunkType::Delta => "delta",
    }
  }
}

/// Hardware acceleration preference (advisory, passed through to the backend)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HardwareAcceleration {
  /// No preference - may use hardware or software
  #[default]
  NoPreference,
  /// Prefer hardware acceleration
  PreferHardware,
  /// Prefer software implementation
  PreferSoftware,
}

/// Latency mode for video encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LatencyMode {
  /// Optimize for quality (default)
  #[default]
  Quality,
  /// Optimize for low latency
  Realtime,
}

/// Bitrate mode for video encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VideoEncoderBitrateMode {
  /// Variable bitrate (default)
  #[default]
  Variable,
  /// Constant bitrate
  Constant,
  /// Use quantizer parameter from codec-specific options
  Quantizer,
}

/// Alpha channel handling option. Default is discard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AlphaOption {
  /// Keep alpha channel if present
  Keep,
  /// Discard alpha channel (default)
  #[default]
  Discard,
}

/// Video encoder configuration dictionary.
/// Unknown concerns are the backend's problem; the core validates structure
/// only.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoEncoderConfig {
  /// Codec string (e.g. "vp8", "avc1.42001f")
  pub codec: String,
  /// Coded width in pixels
  pub width: u32,
  /// Coded height in pixels
  pub height: u32,
  /// Display width in pixels
  pub display_width: Option<u32>,
  /// Display height in pixels
  pub display_height: Option<u32>,
  /// Target bitrate in bits per second
  pub bitrate: Option<u64>,
  /// Expected frame rate, frames per second
  pub framerate: Option<f64>,
  /// Hardware acceleration preference
  pub hardware_acceleration: HardwareAcceleration,
  /// Alpha handling
  pub alpha: AlphaOption,
  /// Scalability mode string (e.g. "L1T2")
  pub scalability_mode: Option<String>,
  /// Latency mode
  pub latency_mode: LatencyMode,
  /// Bitrate mode
  pub bitrate_mode: VideoEncoderBitrateMode,
}

impl Default for VideoEncoderConfig {
  fn default() -> Self {
    Self {
      codec: String::new(),
      width: 0,
      height: 0,
      display_width: None,
      display_height: None,
      bitrate: None,
      framerate: None,
      hardware_acceleration: HardwareAcceleration::default(),
      alpha: AlphaOption::default(),
      scalability_mode: None,
      latency_mode: LatencyMode::default(),
      bitrate_mode: VideoEncoderBitrateMode::default(),
    }
  }
}

/// Color space hints carried by a video decoder configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VideoColorSpace {
  pub primaries: Option<String>,
  pub transfer: Option<String>,
  pub matrix: Option<String>,
  pub full_range: Option<bool>,
}

/// Video decoder configuration dictionary. Also emitted by encoders as
/// per-chunk `decoder_config` metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoDecoderConfig {
  /// Codec string
  pub codec: String,
  /// Coded width in pixels
  pub coded_width: Option<u32>,
  /// Coded height in pixels
  pub coded_height: Option<u32>,
  /// Display aspect width in pixels
  pub display_aspect_width: Option<u32>,
  /// Display aspect height in pixels
  pub display_aspect_height: Option<u32>,
  /// Codec-specific description (e.g. avcC for H.264)
  pub description: Option<Vec<u8>>,
  /// Color space hints
  pub color_space: Option<VideoColorSpace>,
  /// Hardware acceleration preference
  pub hardware_acceleration: HardwareAcceleration,
  /// Rotation applied to decoded frames, clockwise degrees
  pub rotation: u32,
  /// Horizontal flip applied to decoded frames
  pub flip: bool,
}

impl Default for VideoDecoderConfig {
  fn default() -> Self {
    Self {
      codec: String::new(),
      coded_width: None,
      coded_height: None,
      display_aspect_width: None,
      display_aspect_height: None,
      description: None,
      color_space: None,
      hardware_acceleration: HardwareAcceleration::default(),
      rotation: 0,
      flip: false,
    }
  }
}

/// Options for creating an EncodedVideoChunk
#[derive(Debug, Clone)]
pub struct EncodedVideoChunkInit {
  /// Chunk type (key or delta)
  pub chunk_type: EncodedVideoChunkType,
  /// Timestamp in microseconds
  pub timestamp: i64,
  /// Duration in microseconds (optional)
  pub duration: Option<i64>,
  /// Encoded data
  pub data: Vec<u8>,
}

/// EncodedVideoChunk - represents encoded video data
///
/// Chunks are immutable; clones share the underlying byte buffer.
#[derive(Clone)]
pub struct EncodedVideoChunk {
  chunk_type: EncodedVideoChunkType,
  timestamp_us: i64,
  duration_us: Option<i64>,
  data: Arc<[u8]>,
}

impl EncodedVideoChunk {
  /// Create a new EncodedVideoChunk
  pub fn new(init: EncodedVideoChunkInit) -> WebCodecsResult<Self> {
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
    chunk_type: EncodedVideoChunkType,
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
  pub fn chunk_type(&self) -> EncodedVideoChunkType {
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

  /// Check if this is a key frame
  pub fn is_key(&self) -> bool {
    self.chunk_type == EncodedVideoChunkType::Key
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn copy_to_checks_destination_size() {
    let chunk = EncodedVideoChunk::new(EncodedVideoChunkInit {
      chunk_type: EncodedVideoChunkType::Key,
      timestamp: 0,
      duration: None,
      data: vec![1, 2, 3, 4],
    })
    .expect("valid chunk");

    let mut small = [0u8; 2];
    assert_eq!(
      chunk.copy_to(&mut small).err().map(|e| e.name()),
      Some("TypeError")
    );

    let mut big = [0u8; 8];
    chunk.copy_to(&mut big).expect("copy succeeds");
    assert_eq!(&big[..4], &[1, 2, 3, 4]);
  }

  #[test]
  fn clones_share_data() {
    let chunk = EncodedVideoChunk::new(EncodedVideoChunkInit {
      chunk_type: EncodedVideoChunkType::Delta,
      timestamp: 42,
      duration: Some(10),
      data: vec![9; 128],
    })
    .expect("valid chunk");
    let clone = chunk.clone();
    assert_eq!(clone.timestamp(), 42);
    assert_eq!(clone.byte_length(), 128);
    assert!(!clone.is_key());
  }
}
