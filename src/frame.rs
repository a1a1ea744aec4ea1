//! Frames and frame sequences, the data both pipelines share.
use std::borrow::Cow;
use std::slice;

use crate::common::Repeat;

/// Layout of the bytes in a [`Frame`] buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    /// 8 bit red, green, blue and alpha.
    Rgba8,
    /// 8 bit red, green and blue.
    Rgb8,
}

impl PixelFormat {
    /// Bytes used by a single pixel.
    #[must_use]
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgba8 => 4,
            PixelFormat::Rgb8 => 3,
        }
    }
}

/// A pixel buffer did not describe a valid image.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// Width or height is zero.
    #[error("frame has zero width or height")]
    EmptyDimensions,
    /// Buffer length does not match the dimensions.
    #[error("pixel buffer holds {actual} bytes, expected {expected}")]
    BufferSize {
        /// Length implied by width, height and format.
        expected: usize,
        /// Length of the supplied buffer.
        actual: usize,
    },
}

/// One image of an animation.
///
/// The buffer is owned and always consistent with the dimensions and format.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    width: u16,
    height: u16,
    format: PixelFormat,
    pixels: Vec<u8>,
    delay: Option<f64>,
    scale: f64,
}

impl Frame {
    /// Creates a frame from a pixel buffer.
    pub fn new(
        width: u16,
        height: u16,
        format: PixelFormat,
        pixels: Vec<u8>,
    ) -> Result<Self, FrameError> {
        if width == 0 || height == 0 {
            return Err(FrameError::EmptyDimensions);
        }
        let expected = usize::from(width) * usize::from(height) * format.bytes_per_pixel();
        if pixels.len() != expected {
            return Err(FrameError::BufferSize {
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Frame {
            width,
            height,
            format,
            pixels,
            delay: None,
            scale: 1.0,
        })
    }

    /// Creates a frame from pixels in RGBA format.
    pub fn from_rgba(width: u16, height: u16, pixels: Vec<u8>) -> Result<Self, FrameError> {
        Frame::new(width, height, PixelFormat::Rgba8, pixels)
    }

    /// Creates a frame from pixels in RGB format.
    pub fn from_rgb(width: u16, height: u16, pixels: Vec<u8>) -> Result<Self, FrameError> {
        Frame::new(width, height, PixelFormat::Rgb8, pixels)
    }

    /// Sets the display time of this frame in seconds.
    ///
    /// Negative and NaN values become zero.
    #[must_use]
    pub fn with_delay(mut self, seconds: f64) -> Self {
        self.delay = Some(non_negative(seconds));
        self
    }

    /// Annotates the frame with a display scale. Pixels are not touched.
    #[must_use]
    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    /// Width of the frame.
    #[inline]
    pub fn width(&self) -> u16 {
        self.width
    }

    /// Height of the frame.
    #[inline]
    pub fn height(&self) -> u16 {
        self.height
    }

    /// Layout of [`Self::pixels`].
    #[inline]
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// The pixel buffer, row by row without padding.
    #[inline]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Gives up the pixel buffer.
    pub fn into_pixels(self) -> Vec<u8> {
        self.pixels
    }

    /// Per-frame delay in seconds, if known.
    #[inline]
    pub fn delay(&self) -> Option<f64> {
        self.delay
    }

    /// Display scale annotation.
    #[inline]
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// The pixels as RGBA, converting if needed.
    pub fn to_rgba(&self) -> Cow<'_, [u8]> {
        match self.format {
            PixelFormat::Rgba8 => Cow::Borrowed(&self.pixels),
            PixelFormat::Rgb8 => {
                let mut rgba = Vec::with_capacity(self.pixels.len() / 3 * 4);
                for rgb in self.pixels.chunks_exact(3) {
                    rgba.extend_from_slice(&[rgb[0], rgb[1], rgb[2], 0xFF]);
                }
                Cow::Owned(rgba)
            }
        }
    }
}

/// An ordered list of frames with aggregate timing and loop metadata.
///
/// Built whole by a decode call or by the caller; the builder methods consume
/// the sequence and hand back a new one.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameSequence {
    frames: Vec<Frame>,
    duration: Option<f64>,
    repeat: Repeat,
    scale: f64,
}

impl FrameSequence {
    /// Creates a sequence playing `frames` in order.
    ///
    /// Loops forever unless changed with [`Self::with_repeat`].
    pub fn new(frames: Vec<Frame>) -> Self {
        FrameSequence {
            frames,
            duration: None,
            repeat: Repeat::Infinite,
            scale: 1.0,
        }
    }

    /// Overrides the playback time of the whole sequence, in seconds.
    ///
    /// Values `<= 0` remove the override.
    #[must_use]
    pub fn with_duration(mut self, seconds: f64) -> Self {
        self.duration = if seconds > 0.0 { Some(seconds) } else { None };
        self
    }

    /// Sets the loop metadata.
    #[must_use]
    pub fn with_repeat(mut self, repeat: Repeat) -> Self {
        self.repeat = repeat;
        self
    }

    /// Sets the loop metadata from a container loop count, `0` meaning forever.
    #[must_use]
    pub fn with_loop_count(self, loop_count: u16) -> Self {
        self.with_repeat(Repeat::from_loop_count(loop_count))
    }

    /// Annotates the sequence and every frame with a display scale.
    #[must_use]
    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self.frames = self
            .frames
            .into_iter()
            .map(|frame| frame.with_scale(scale))
            .collect();
        self
    }

    /// The frames in playback order.
    #[inline]
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Gives up the frames.
    pub fn into_frames(self) -> Vec<Frame> {
        self.frames
    }

    /// Iterates over the frames in playback order.
    pub fn iter(&self) -> slice::Iter<'_, Frame> {
        self.frames.iter()
    }

    /// Number of frames.
    #[inline]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// True if there are no frames.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Sum of the per-frame delays. Frames without a delay count as zero.
    pub fn calculated_duration(&self) -> f64 {
        self.frames.iter().filter_map(Frame::delay).sum()
    }

    /// The explicit duration override, if any.
    #[inline]
    pub fn duration_override(&self) -> Option<f64> {
        self.duration
    }

    /// Playback time of the whole sequence: the override if set, else the sum of delays.
    pub fn total_duration(&self) -> f64 {
        crate::delay::total_duration(self.calculated_duration(), self.duration.unwrap_or(0.0))
    }

    /// Loop metadata.
    #[inline]
    pub fn repeat(&self) -> Repeat {
        self.repeat
    }

    /// Loop count as stored in the container: `Some(0)` loops forever,
    /// `None` means there was no loop metadata.
    pub fn loop_count(&self) -> Option<u16> {
        self.repeat.loop_count()
    }

    /// Display scale annotation.
    #[inline]
    pub fn scale(&self) -> f64 {
        self.scale
    }
}

impl<'a> IntoIterator for &'a FrameSequence {
    type Item = &'a Frame;
    type IntoIter = slice::Iter<'a, Frame>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl IntoIterator for FrameSequence {
    type Item = Frame;
    type IntoIter = std::vec::IntoIter<Frame>;

    fn into_iter(self) -> Self::IntoIter {
        self.frames.into_iter()
    }
}

fn non_negative(seconds: f64) -> f64 {
    if seconds > 0.0 {
        seconds
    } else {
        0.0
    }
}
