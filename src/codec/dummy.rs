//! Deterministic in-process backends
//!
//! Stand-ins for a native codec engine: every input produces exactly one
//! output, synchronously, with synthesized bytes. They exist so embedders
//! can exercise the full processing model (and so the test suite can drive
//! saturation, drain and error paths) without linking a codec library.

use std::collections::VecDeque;

use std::sync::Arc;

use crate::webcodecs::{
    AudioData, AudioDataInit, AudioDecoderBackendFactory, AudioDecoderConfig,
    AudioEncoderBackendFactory, AudioEncoderConfig, AudioEncoderEncodeOptions, AudioSampleFormat,
    BoxedAudioDecoderBackend, BoxedAudioEncoderBackend, BoxedVideoDecoderBackend,
    BoxedVideoEncoderBackend, EncodedAudioChunk, EncodedVideoChunk, VideoDecoderBackendFactory,
    VideoDecoderConfig, VideoEncoderBackendFactory, VideoEncoderConfig,
    VideoEncoderEncodeOptions, VideoFrame, VideoFrameInit, VideoPixelFormat,
};

use super::backend::{
    AudioEncodedPayload, BackendError, CodecBackend, SubmitOutcome, VideoEncodedPayload,
};

/// Keyframe cadence of the dummy video encoder.
const DUMMY_GOP_SIZE: u64 = 30;

/// Video encoder backend emitting one synthesized payload per frame.
///
/// The first frame of a stream (and every `DUMMY_GOP_SIZE`th after it) is a
/// key frame; `key_frame: true` in the encode options forces one.
pub struct DummyVideoEncoder {
    config: Option<VideoEncoderConfig>,
    pending: VecDeque<VideoEncodedPayload>,
    frame_index: u64,
    temporal_layers: u32,
    /// Frame index at which `submit_input` starts reporting saturation.
    saturate_at: Option<u64>,
    /// Remaining rejections before the saturated frame is finally accepted.
    /// `u32::MAX` saturates until the instance is reset.
    saturation_rejects_left: u32,
    /// Frame index whose submission fails fatally.
    fail_at: Option<u64>,
    fail_message: Option<String>,
}

impl DummyVideoEncoder {
    pub fn new() -> Self {
        Self {
            config: None,
            pending: VecDeque::new(),
            frame_index: 0,
            temporal_layers: 1,
            saturate_at: None,
            saturation_rejects_left: 0,
            fail_at: None,
            fail_message: None,
        }
    }

    /// Reject the frame at index `frame` the given number of times before
    /// accepting it. Pass `u32::MAX` to stay saturated until reset.
    pub fn saturating_at(mut self, frame: u64, rejects: u32) -> Self {
        self.saturate_at = Some(frame);
        self.saturation_rejects_left = rejects;
        self
    }

    /// Fail fatally when the frame at index `frame` is submitted.
    pub fn failing_at(mut self, frame: u64, message: &str) -> Self {
        self.fail_at = Some(frame);
        self.fail_message = Some(message.to_string());
        self
    }

    /// Default factory for codec constructors.
    pub fn factory() -> VideoEncoderBackendFactory {
        Arc::new(|| Box::new(DummyVideoEncoder::new()) as BoxedVideoEncoderBackend)
    }
}

impl Default for DummyVideoEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl CodecBackend for DummyVideoEncoder {
    type Config = VideoEncoderConfig;
    type Input = VideoFrame;
    type Options = VideoEncoderEncodeOptions;
    type Output = VideoEncodedPayload;

    fn configure(&mut self, config: &VideoEncoderConfig) -> Result<(), BackendError> {
        if config.codec.starts_with("unsupported") {
            return Err(BackendError::Unsupported(format!(
                "no encoder for codec {}",
                config.codec
            )));
        }
        self.temporal_layers = config
            .scalability_mode
            .as_deref()
            .and_then(|mode| mode.rsplit('T').next())
            .and_then(|layers| layers.parse().ok())
            .unwrap_or(1);
        self.config = Some(config.clone());
        self.pending.clear();
        self.frame_index = 0;
        Ok(())
    }

    fn submit_input(
        &mut self,
        frame: VideoFrame,
        options: &VideoEncoderEncodeOptions,
    ) -> SubmitOutcome<VideoFrame> {
        if self.fail_at == Some(self.frame_index) {
            if let Some(message) = self.fail_message.take() {
                return SubmitOutcome::Fatal(BackendError::Fatal(message));
            }
        }
        if self.config.is_none() {
            return SubmitOutcome::Fatal(BackendError::Fatal("encoder not configured".into()));
        }
        if self.saturate_at == Some(self.frame_index) {
            if self.saturation_rejects_left == 0 {
                self.saturate_at = None;
            } else {
                if self.saturation_rejects_left != u32::MAX {
                    self.saturation_rejects_left -= 1;
                }
                return SubmitOutcome::Saturated(frame);
            }
        }

        let (Ok(timestamp), Ok(duration), Ok(format)) =
            (frame.timestamp(), frame.duration(), frame.format())
        else {
            return SubmitOutcome::Fatal(BackendError::Fatal("frame is detached".into()));
        };

        let key = options.key_frame == Some(true) || self.frame_index % DUMMY_GOP_SIZE == 0;
        let mut data = Vec::with_capacity(16);
        data.extend_from_slice(if key { b"KEY0" } else { b"DLT0" });
        data.extend_from_slice(&timestamp.to_le_bytes());
        data.extend_from_slice(&self.frame_index.to_le_bytes()[..4]);

        self.pending.push_back(VideoEncodedPayload {
            key,
            data,
            timestamp_us: timestamp,
            duration_us: duration,
            extradata: Some(vec![0x01, 0x42, 0x00, 0x1f]),
            temporal_layer_id: (self.temporal_layers > 1)
                .then(|| (self.frame_index % self.temporal_layers as u64) as u32),
            alpha_data: format.has_alpha().then(|| vec![0xAA; 4]),
        });
        self.frame_index += 1;
        SubmitOutcome::Accepted
    }

    fn poll_output(&mut self) -> Option<VideoEncodedPayload> {
        self.pending.pop_front()
    }

    fn signal_eof(&mut self) -> Result<(), BackendError> {
        Ok(())
    }

    fn reset(&mut self) {
        self.pending.clear();
        self.frame_index = 0;
    }
}

/// Video decoder backend synthesizing blank frames of the configured size.
pub struct DummyVideoDecoder {
    config: Option<VideoDecoderConfig>,
    pending: VecDeque<VideoFrame>,
    fail_message: Option<String>,
}

impl DummyVideoDecoder {
    pub fn new() -> Self {
        Self {
            config: None,
            pending: VecDeque::new(),
            fail_message: None,
        }
    }

    pub fn failing_with(mut self, message: &str) -> Self {
        self.fail_message = Some(message.to_string());
        self
    }

    pub fn factory() -> VideoDecoderBackendFactory {
        Arc::new(|| Box::new(DummyVideoDecoder::new()) as BoxedVideoDecoderBackend)
    }
}

impl Default for DummyVideoDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl CodecBackend for DummyVideoDecoder {
    type Config = VideoDecoderConfig;
    type Input = EncodedVideoChunk;
    type Options = ();
    type Output = VideoFrame;

    fn configure(&mut self, config: &VideoDecoderConfig) -> Result<(), BackendError> {
        if config.codec.starts_with("unsupported") {
            return Err(BackendError::Unsupported(format!(
                "no decoder for codec {}",
                config.codec
            )));
        }
        self.config = Some(config.clone());
        self.pending.clear();
        Ok(())
    }

    fn submit_input(&mut self, chunk: EncodedVideoChunk, _options: &()) -> SubmitOutcome<EncodedVideoChunk> {
        if let Some(message) = self.fail_message.take() {
            return SubmitOutcome::Fatal(BackendError::Fatal(message));
        }
        let Some(config) = self.config.as_ref() else {
            return SubmitOutcome::Fatal(BackendError::Fatal("decoder not configured".into()));
        };

        let width = config.coded_width.unwrap_or(320);
        let height = config.coded_height.unwrap_or(240);
        let frame = VideoFrame::new(VideoFrameInit {
            format: VideoPixelFormat::I420,
            coded_width: width,
            coded_height: height,
            timestamp: chunk.timestamp(),
            duration: chunk.duration(),
            rotation: config.rotation,
            flip: config.flip,
            display_width: None,
            display_height: None,
            data: vec![0; VideoPixelFormat::I420.byte_length(width, height)],
        });
        match frame {
            Ok(frame) => {
                self.pending.push_back(frame);
                SubmitOutcome::Accepted
            }
            Err(err) => SubmitOutcome::Fatal(BackendError::Fatal(err.to_string())),
        }
    }

    fn poll_output(&mut self) -> Option<VideoFrame> {
        self.pending.pop_front()
    }

    fn signal_eof(&mut self) -> Result<(), BackendError> {
        Ok(())
    }

    fn reset(&mut self) {
        self.pending.clear();
    }
}

/// Audio encoder backend emitting one synthesized chunk per buffer.
pub struct DummyAudioEncoder {
    config: Option<AudioEncoderConfig>,
    pending: VecDeque<AudioEncodedPayload>,
    fail_message: Option<String>,
}

impl DummyAudioEncoder {
    pub fn new() -> Self {
        Self {
            config: None,
            pending: VecDeque::new(),
            fail_message: None,
        }
    }

    pub fn failing_with(mut self, message: &str) -> Self {
        self.fail_message = Some(message.to_string());
        self
    }

    pub fn factory() -> AudioEncoderBackendFactory {
        Arc::new(|| Box::new(DummyAudioEncoder::new()) as BoxedAudioEncoderBackend)
    }
}

impl Default for DummyAudioEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl CodecBackend for DummyAudioEncoder {
    type Config = AudioEncoderConfig;
    type Input = AudioData;
    type Options = AudioEncoderEncodeOptions;
    type Output = AudioEncodedPayload;

    fn configure(&mut self, config: &AudioEncoderConfig) -> Result<(), BackendError> {
        if config.codec.starts_with("unsupported") {
            return Err(BackendError::Unsupported(format!(
                "no encoder for codec {}",
                config.codec
            )));
        }
        self.config = Some(config.clone());
        self.pending.clear();
        Ok(())
    }

    fn submit_input(
        &mut self,
        data: AudioData,
        _options: &AudioEncoderEncodeOptions,
    ) -> SubmitOutcome<AudioData> {
        if let Some(message) = self.fail_message.take() {
            return SubmitOutcome::Fatal(BackendError::Fatal(message));
        }
        if self.config.is_none() {
            return SubmitOutcome::Fatal(BackendError::Fatal("encoder not configured".into()));
        }

        let (Ok(timestamp), Ok(duration)) = (data.timestamp(), data.duration()) else {
            return SubmitOutcome::Fatal(BackendError::Fatal("AudioData is detached".into()));
        };

        let mut bytes = Vec::with_capacity(12);
        bytes.extend_from_slice(b"AUD0");
        bytes.extend_from_slice(&timestamp.to_le_bytes());

        self.pending.push_back(AudioEncodedPayload {
            key: true,
            data: bytes,
            timestamp_us: timestamp,
            duration_us: Some(duration),
            extradata: Some(vec![0x11, 0x90]),
        });
        SubmitOutcome::Accepted
    }

    fn poll_output(&mut self) -> Option<AudioEncodedPayload> {
        self.pending.pop_front()
    }

    fn signal_eof(&mut self) -> Result<(), BackendError> {
        Ok(())
    }

    fn reset(&mut self) {
        self.pending.clear();
    }
}

/// Samples per synthesized output buffer of the dummy audio decoder.
const DUMMY_FRAMES_PER_BUFFER: u32 = 1024;

/// Audio decoder backend synthesizing silent buffers at the configured rate.
pub struct DummyAudioDecoder {
    config: Option<AudioDecoderConfig>,
    pending: VecDeque<AudioData>,
    fail_message: Option<String>,
}

impl DummyAudioDecoder {
    pub fn new() -> Self {
        Self {
            config: None,
            pending: VecDeque::new(),
            fail_message: None,
        }
    }

    pub fn failing_with(mut self, message: &str) -> Self {
        self.fail_message = Some(message.to_string());
        self
    }

    pub fn factory() -> AudioDecoderBackendFactory {
        Arc::new(|| Box::new(DummyAudioDecoder::new()) as BoxedAudioDecoderBackend)
    }
}

impl Default for DummyAudioDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl CodecBackend for DummyAudioDecoder {
    type Config = AudioDecoderConfig;
    type Input = EncodedAudioChunk;
    type Options = ();
    type Output = AudioData;

    fn configure(&mut self, config: &AudioDecoderConfig) -> Result<(), BackendError> {
        if config.codec.starts_with("unsupported") {
            return Err(BackendError::Unsupported(format!(
                "no decoder for codec {}",
                config.codec
            )));
        }
        self.config = Some(config.clone());
        self.pending.clear();
        Ok(())
    }

    fn submit_input(&mut self, chunk: EncodedAudioChunk, _options: &()) -> SubmitOutcome<EncodedAudioChunk> {
        if let Some(message) = self.fail_message.take() {
            return SubmitOutcome::Fatal(BackendError::Fatal(message));
        }
        let Some(config) = self.config.as_ref() else {
            return SubmitOutcome::Fatal(BackendError::Fatal("decoder not configured".into()));
        };

        let byte_length = AudioSampleFormat::F32.bytes_per_sample()
            * DUMMY_FRAMES_PER_BUFFER as usize
            * config.number_of_channels as usize;
        let data = AudioData::new(AudioDataInit {
            format: AudioSampleFormat::F32,
            sample_rate: config.sample_rate,
            number_of_frames: DUMMY_FRAMES_PER_BUFFER,
            number_of_channels: config.number_of_channels,
            timestamp: chunk.timestamp(),
            data: vec![0; byte_length],
        });
        match data {
            Ok(data) => {
                self.pending.push_back(data);
                SubmitOutcome::Accepted
            }
            Err(err) => SubmitOutcome::Fatal(BackendError::Fatal(err.to_string())),
        }
    }

    fn poll_output(&mut self) -> Option<AudioData> {
        self.pending.pop_front()
    }

    fn signal_eof(&mut self) -> Result<(), BackendError> {
        Ok(())
    }

    fn reset(&mut self) {
        self.pending.clear();
    }
}
