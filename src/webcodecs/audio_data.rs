//! AudioData - raw audio value object
//!
//! Represents a buffer of unencoded audio samples.
//! See: https://developer.mozilla.org/en-US/docs/Web/API/AudioData
//!
//! Same lifecycle as VideoFrame: `encode` claims a private clone; `close`
//! detaches and later accessors fail with InvalidStateError.

use std::sync::{Arc, PoisonError, RwLock};

use crate::webcodecs::error::{invalid_state_error, type_error, WebCodecsResult};

/// Sample layout of an AudioData buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioSampleFormat {
    /// Unsigned 8-bit, interleaved
    U8,
    /// Signed 16-bit, interleaved
    S16,
    /// Signed 32-bit, interleaved
    S32,
    /// 32-bit float, interleaved
    F32,
    /// 32-bit float, one plane per channel
    F32Planar,
}

impl AudioSampleFormat {
    /// Bytes per sample, per channel.
    pub fn bytes_per_sample(&self) -> usize {
        match self {
            AudioSampleFormat::U8 => 1,
            AudioSampleFormat::S16 => 2,
            AudioSampleFormat::S32 | AudioSampleFormat::F32 | AudioSampleFormat::F32Planar => 4,
        }
    }
}

/// Options for creating an AudioData from a sample buffer.
#[derive(Debug, Clone)]
pub struct AudioDataInit {
    /// Sample format of `data`
    pub format: AudioSampleFormat,
    /// Samples per second
    pub sample_rate: u32,
    /// Frames (samples per channel) in `data`
    pub number_of_frames: u32,
    /// Channel count
    pub number_of_channels: u32,
    /// Presentation timestamp in microseconds
    pub timestamp: i64,
    /// Sample data
    pub data: Vec<u8>,
}

struct AudioDataInner {
    format: AudioSampleFormat,
    sample_rate: u32,
    number_of_frames: u32,
    number_of_channels: u32,
    timestamp_us: i64,
    data: Vec<u8>,
}

/// One buffer of unencoded audio.
pub struct AudioData {
    inner: Arc<RwLock<Option<AudioDataInner>>>,
}

impl AudioData {
    /// Create a new AudioData over an owned sample buffer.
    pub fn new(init: AudioDataInit) -> WebCodecsResult<Self> {
        if init.sample_rate == 0 {
            return Err(type_error("sampleRate must be positive"));
        }
        if init.number_of_frames == 0 || init.number_of_channels == 0 {
            return Err(type_error("frame and channel counts must be positive"));
        }
        let required = init.format.bytes_per_sample()
            * init.number_of_frames as usize
            * init.number_of_channels as usize;
        if init.data.len() < required {
            return Err(type_error(&format!(
                "data is too small: need {} bytes, got {}",
                required,
                init.data.len()
            )));
        }

        let inner = AudioDataInner {
            format: init.format,
            sample_rate: init.sample_rate,
            number_of_frames: init.number_of_frames,
            number_of_channels: init.number_of_channels,
            timestamp_us: init.timestamp,
            data: init.data,
        };
        Ok(Self {
            inner: Arc::new(RwLock::new(Some(inner))),
        })
    }

    /// Get the sample format
    pub fn format(&self) -> WebCodecsResult<AudioSampleFormat> {
        self.with_inner(|inner| inner.format)
    }

    /// Get the sample rate in Hz
    pub fn sample_rate(&self) -> WebCodecsResult<u32> {
        self.with_inner(|inner| inner.sample_rate)
    }

    /// Get the number of frames (samples per channel)
    pub fn number_of_frames(&self) -> WebCodecsResult<u32> {
        self.with_inner(|inner| inner.number_of_frames)
    }

    /// Get the number of channels
    pub fn number_of_channels(&self) -> WebCodecsResult<u32> {
        self.with_inner(|inner| inner.number_of_channels)
    }

    /// Get the presentation timestamp in microseconds
    pub fn timestamp(&self) -> WebCodecsResult<i64> {
        self.with_inner(|inner| inner.timestamp_us)
    }

    /// Duration in microseconds, derived from frame count and sample rate
    pub fn duration(&self) -> WebCodecsResult<i64> {
        self.with_inner(|inner| {
            inner.number_of_frames as i64 * 1_000_000 / inner.sample_rate as i64
        })
    }

    /// Size of the sample buffer in bytes
    pub fn allocation_size(&self) -> WebCodecsResult<usize> {
        self.with_inner(|inner| inner.data.len())
    }

    /// Copy the sample data into `destination`.
    /// Fails with TypeError if the destination is too small.
    pub fn copy_to(&self, destination: &mut [u8]) -> WebCodecsResult<()> {
        let guard = self.read_inner();
        let Some(inner) = guard.as_ref() else {
            return Err(invalid_state_error("AudioData is closed"));
        };
        if destination.len() < inner.data.len() {
            return Err(type_error(&format!(
                "destination is too small: need {} bytes, got {}",
                inner.data.len(),
                destination.len()
            )));
        }
        destination[..inner.data.len()].copy_from_slice(&inner.data);
        Ok(())
    }

    /// Borrow the raw sample data.
    pub fn with_data<R>(&self, f: impl FnOnce(&[u8]) -> R) -> WebCodecsResult<R> {
        self.with_inner(|inner| f(&inner.data))
    }

    /// Deep-clone this buffer. Fails with InvalidStateError when closed.
    pub fn try_clone(&self) -> WebCodecsResult<AudioData> {
        self.with_inner(|inner| AudioData {
            inner: Arc::new(RwLock::new(Some(AudioDataInner {
                format: inner.format,
                sample_rate: inner.sample_rate,
                number_of_frames: inner.number_of_frames,
                number_of_channels: inner.number_of_channels,
                timestamp_us: inner.timestamp_us,
                data: inner.data.clone(),
            }))),
        })
    }

    /// Release the sample buffer. Idempotent.
    pub fn close(&self) {
        let mut guard = self
            .inner
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *guard = None;
    }

    /// Whether this buffer has been closed (detached).
    pub fn is_closed(&self) -> bool {
        self.read_inner().is_none()
    }

    fn read_inner(&self) -> std::sync::RwLockReadGuard<'_, Option<AudioDataInner>> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_inner<R>(&self, f: impl FnOnce(&AudioDataInner) -> R) -> WebCodecsResult<R> {
        let guard = self.read_inner();
        match guard.as_ref() {
            Some(inner) => Ok(f(inner)),
            None => Err(invalid_state_error("AudioData is closed")),
        }
    }
}
