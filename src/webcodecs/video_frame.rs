//! VideoFrame - raw video value object
//!
//! Represents one uncompressed frame of video.
//! See: https://developer.mozilla.org/en-US/docs/Web/API/VideoFrame
//!
//! Frames are clone-on-submit: `encode` claims a private clone, so callers
//! can close their copy immediately afterwards. A closed (detached) frame
//! keeps no pixel data and every accessor fails with InvalidStateError.

use std::sync::{Arc, PoisonError, RwLock};

use crate::webcodecs::error::{invalid_state_error, type_error, WebCodecsResult};

/// Pixel layout of a frame's data buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoPixelFormat {
    /// Planar 4:2:0 YUV
    I420,
    /// Planar 4:2:0 YUV with an alpha plane
    I420A,
    /// Biplanar 4:2:0 YUV (UV interleaved)
    Nv12,
    /// Packed 8-bit RGBA
    Rgba,
    /// Packed 8-bit BGRA
    Bgra,
}

impl VideoPixelFormat {
    /// Whether this format carries an alpha channel.
    pub fn has_alpha(&self) -> bool {
        matches!(
            self,
            VideoPixelFormat::I420A | VideoPixelFormat::Rgba | VideoPixelFormat::Bgra
        )
    }

    /// Minimum buffer size for a frame of the given coded size.
    pub fn byte_length(&self, width: u32, height: u32) -> usize {
        let luma = width as usize * height as usize;
        let chroma = ((width as usize + 1) / 2) * ((height as usize + 1) / 2);
        match self {
            VideoPixelFormat::I420 | VideoPixelFormat::Nv12 => luma + 2 * chroma,
            VideoPixelFormat::I420A => 2 * luma + 2 * chroma,
            VideoPixelFormat::Rgba | VideoPixelFormat::Bgra => 4 * luma,
        }
    }
}

/// Options for creating a VideoFrame from a pixel buffer.
#[derive(Debug, Clone)]
pub struct VideoFrameInit {
    /// Pixel format of `data`
    pub format: VideoPixelFormat,
    /// Coded width in pixels
    pub coded_width: u32,
    /// Coded height in pixels
    pub coded_height: u32,
    /// Presentation timestamp in microseconds
    pub timestamp: i64,
    /// Duration in microseconds
    pub duration: Option<i64>,
    /// Rotation to apply at presentation, clockwise degrees (0/90/180/270)
    pub rotation: u32,
    /// Horizontal flip to apply after rotation
    pub flip: bool,
    /// Display width (defaults to coded width)
    pub display_width: Option<u32>,
    /// Display height (defaults to coded height)
    pub display_height: Option<u32>,
    /// Pixel data
    pub data: Vec<u8>,
}

struct VideoFrameInner {
    format: VideoPixelFormat,
    coded_width: u32,
    coded_height: u32,
    display_width: u32,
    display_height: u32,
    timestamp_us: i64,
    duration_us: Option<i64>,
    rotation: u32,
    flip: bool,
    data: Vec<u8>,
}

/// One uncompressed video frame.
pub struct VideoFrame {
    inner: Arc<RwLock<Option<VideoFrameInner>>>,
}

impl VideoFrame {
    /// Create a new VideoFrame over an owned pixel buffer.
    pub fn new(init: VideoFrameInit) -> WebCodecsResult<Self> {
        if init.coded_width == 0 || init.coded_height == 0 {
            return Err(type_error("coded size must be positive"));
        }
        if !matches!(init.rotation, 0 | 90 | 180 | 270) {
            return Err(type_error("rotation must be one of 0, 90, 180, 270"));
        }
        let required = init.format.byte_length(init.coded_width, init.coded_height);
        if init.data.len() < required {
            return Err(type_error(&format!(
                "data is too small: need {} bytes, got {}",
                required,
                init.data.len()
            )));
        }
        if init.display_width == Some(0) || init.display_height == Some(0) {
            return Err(type_error("display size must be positive"));
        }

        let inner = VideoFrameInner {
            format: init.format,
            coded_width: init.coded_width,
            coded_height: init.coded_height,
            display_width: init.display_width.unwrap_or(init.coded_width),
            display_height: init.display_height.unwrap_or(init.coded_height),
            timestamp_us: init.timestamp,
            duration_us: init.duration,
            rotation: init.rotation,
            flip: init.flip,
            data: init.data,
        };
        Ok(Self {
            inner: Arc::new(RwLock::new(Some(inner))),
        })
    }

    /// Get the pixel format
    pub fn format(&self) -> WebCodecsResult<VideoPixelFormat> {
        self.with_inner(|inner| inner.format)
    }

    /// Get the coded width in pixels
    pub fn coded_width(&self) -> WebCodecsResult<u32> {
        self.with_inner(|inner| inner.coded_width)
    }

    /// Get the coded height in pixels
    pub fn coded_height(&self) -> WebCodecsResult<u32> {
        self.with_inner(|inner| inner.coded_height)
    }

    /// Get the display width in pixels
    pub fn display_width(&self) -> WebCodecsResult<u32> {
        self.with_inner(|inner| inner.display_width)
    }

    /// Get the display height in pixels
    pub fn display_height(&self) -> WebCodecsResult<u32> {
        self.with_inner(|inner| inner.display_height)
    }

    /// Get the presentation timestamp in microseconds
    pub fn timestamp(&self) -> WebCodecsResult<i64> {
        self.with_inner(|inner| inner.timestamp_us)
    }

    /// Get the duration in microseconds
    pub fn duration(&self) -> WebCodecsResult<Option<i64>> {
        self.with_inner(|inner| inner.duration_us)
    }

    /// Get the presentation rotation in clockwise degrees
    pub fn rotation(&self) -> WebCodecsResult<u32> {
        self.with_inner(|inner| inner.rotation)
    }

    /// Get the presentation flip
    pub fn flip(&self) -> WebCodecsResult<bool> {
        self.with_inner(|inner| inner.flip)
    }

    /// Size of the pixel buffer in bytes
    pub fn allocation_size(&self) -> WebCodecsResult<usize> {
        self.with_inner(|inner| inner.data.len())
    }

    /// Copy the pixel data into `destination`.
    /// Fails with TypeError if the destination is too small.
    pub fn copy_to(&self, destination: &mut [u8]) -> WebCodecsResult<()> {
        let guard = self.read_inner();
        let Some(inner) = guard.as_ref() else {
            return Err(invalid_state_error("VideoFrame is closed"));
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

    /// Borrow the raw pixel data.
    pub fn with_data<R>(&self, f: impl FnOnce(&[u8]) -> R) -> WebCodecsResult<R> {
        self.with_inner(|inner| f(&inner.data))
    }

    /// Deep-clone this frame. Fails with InvalidStateError when the frame
    /// has been closed.
    pub fn try_clone(&self) -> WebCodecsResult<VideoFrame> {
        self.with_inner(|inner| VideoFrame {
            inner: Arc::new(RwLock::new(Some(VideoFrameInner {
                format: inner.format,
                coded_width: inner.coded_width,
                coded_height: inner.coded_height,
                display_width: inner.display_width,
                display_height: inner.display_height,
                timestamp_us: inner.timestamp_us,
                duration_us: inner.duration_us,
                rotation: inner.rotation,
                flip: inner.flip,
                data: inner.data.clone(),
            }))),
        })
    }

    /// Release the pixel buffer. Every later accessor fails with
    /// InvalidStateError. Idempotent.
    pub fn close(&self) {
        let mut guard = self
            .inner
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *guard = None;
    }

    /// Whether this frame has been closed (detached).
    pub fn is_closed(&self) -> bool {
        self.read_inner().is_none()
    }

    fn read_inner(&self) -> std::sync::RwLockReadGuard<'_, Option<VideoFrameInner>> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_inner<R>(&self, f: impl FnOnce(&VideoFrameInner) -> R) -> WebCodecsResult<R> {
        let guard = self.read_inner();
        match guard.as_ref() {
            Some(inner) => Ok(f(inner)),
            None => Err(invalid_state_error("VideoFrame is closed")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_frame() -> VideoFrame {
        VideoFrame::new(VideoFrameInit {
            format: VideoPixelFormat::I420,
            coded_width: 4,
            coded_height: 4,
            timestamp: 1000,
            duration: Some(33_333),
            rotation: 90,
            flip: false,
            display_width: None,
            display_height: None,
            data: vec![0; 24],
        })
        .expect("valid frame")
    }

    #[test]
    fn accessors_reflect_init() {
        let frame = test_frame();
        assert_eq!(frame.coded_width().unwrap(), 4);
        assert_eq!(frame.display_width().unwrap(), 4);
        assert_eq!(frame.timestamp().unwrap(), 1000);
        assert_eq!(frame.duration().unwrap(), Some(33_333));
        assert_eq!(frame.rotation().unwrap(), 90);
        assert!(!frame.flip().unwrap());
    }

    #[test]
    fn close_detaches() {
        let frame = test_frame();
        let clone = frame.try_clone().expect("clone before close");
        frame.close();
        assert!(frame.is_closed());
        assert!(frame.timestamp().is_err());
        assert!(frame.try_clone().is_err());
        // The clone is unaffected.
        assert_eq!(clone.timestamp().unwrap(), 1000);
    }

    #[test]
    fn rejects_undersized_buffer() {
        let result = VideoFrame::new(VideoFrameInit {
            format: VideoPixelFormat::I420,
            coded_width: 64,
            coded_height: 64,
            timestamp: 0,
            duration: None,
            rotation: 0,
            flip: false,
            display_width: None,
            display_height: None,
            data: vec![0; 16],
        });
        assert_eq!(result.err().map(|e| e.name()), Some("TypeError"));
    }

    #[test]
    fn rejects_bad_rotation() {
        let result = VideoFrame::new(VideoFrameInit {
            format: VideoPixelFormat::Rgba,
            coded_width: 2,
            coded_height: 2,
            timestamp: 0,
            duration: None,
            rotation: 45,
            flip: false,
            display_width: None,
            display_height: None,
            data: vec![0; 16],
        });
        assert_eq!(result.err().map(|e| e.name()), Some("TypeError"));
    }
}
