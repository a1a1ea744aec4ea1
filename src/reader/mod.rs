use std::num::NonZeroU64;

use log::warn;

use crate::common::{FrameProperties, Repeat};
use crate::container::ContainerReader;
use crate::frame::Frame;

mod converter;
mod decoder;

pub use self::decoder::{DecodingError, DecodingFormatError, Version, PLTE_CHANNELS};

use self::converter::{PixelConverter, N_CHANNELS};
use self::decoder::{RawFrame, StreamIndex};

/// The maximum amount of memory the decoder is allowed to use for each frame
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MemoryLimit {
    /// Enforce no memory limit.
    ///
    /// If you intend to process images from unknown origins this is a potentially dangerous
    /// constant to use, as your program could be vulnerable to decompression bombs. That is,
    /// malicious images crafted specifically to require an enormous amount of memory to process
    /// while having a disproportionately small file size.
    Unlimited,
    /// Limit the amount of memory that can be used for a single buffer to this many bytes.
    ///
    /// This bounds the RGBA canvas, the index buffer of each frame and the compressed
    /// data kept for each frame.
    Bytes(NonZeroU64),
}

impl MemoryLimit {
    fn check_size(&self, size: usize) -> Result<(), DecodingError> {
        match self {
            Self::Unlimited => Ok(()),
            Self::Bytes(limit) => {
                if size as u64 <= limit.get() {
                    Ok(())
                } else {
                    Err(DecodingError::MemoryLimit)
                }
            }
        }
    }

    /// Bytes of an RGBA buffer of the given size, `None` if over the limit.
    fn buffer_size(&self, width: u16, height: u16) -> Option<usize> {
        // At most 16GiB, no overflow in u64
        let total_bytes = u64::from(width) * u64::from(height) * N_CHANNELS as u64;
        let usize_bytes = usize::try_from(total_bytes).ok()?;
        match self {
            Self::Unlimited => Some(usize_bytes),
            Self::Bytes(limit) if total_bytes > limit.get() => None,
            Self::Bytes(_) => Some(usize_bytes),
        }
    }

    #[inline]
    fn try_reserve(&self, vec: &mut Vec<u8>, additional: usize) -> Result<(), DecodingError> {
        let len = vec
            .len()
            .checked_add(additional)
            .ok_or(DecodingError::MemoryLimit)?;
        self.check_size(len)?;
        vec.try_reserve(additional)
            .map_err(|_| DecodingError::OutOfMemory)?;
        Ok(())
    }
}

const DEFAULT_MEMORY_LIMIT: NonZeroU64 = match NonZeroU64::new(50_000_000) {
    Some(limit) => limit,
    None => panic!("zero memory limit"),
};

/// Options for opening a GIF stream. [`DecodeOptions::read_info`] parses it.
#[derive(Clone, Debug)]
pub struct DecodeOptions {
    memory_limit: MemoryLimit,
    check_for_end_code: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl DecodeOptions {
    /// Creates a new decoder builder
    #[must_use]
    #[inline]
    pub fn new() -> Self {
        Self {
            memory_limit: MemoryLimit::Bytes(DEFAULT_MEMORY_LIMIT),
            check_for_end_code: false,
        }
    }

    /// Configure a memory limit for decoding.
    pub fn set_memory_limit(&mut self, limit: MemoryLimit) {
        self.memory_limit = limit;
    }

    /// Configure if LZW encoded blocks must end with a marker end code.
    ///
    /// The default is `false`.
    ///
    /// When turned on, image data that simply runs out without the end code is an error
    /// for that frame. When turned off, some bits of the last byte may be silently ignored.
    pub fn check_lzw_end_code(&mut self, check: bool) {
        self.check_for_end_code = check;
    }

    /// Reads the header and indexes the frames of `bytes`.
    pub fn read_info(self, bytes: &[u8]) -> Result<GifReader, DecodingError> {
        let index = decoder::parse(bytes, &self.memory_limit)?;
        GifReader::new(index, self)
    }
}

/// Random access to the frames of a GIF stream.
///
/// Create [`DecodeOptions`] to get started, and call [`DecodeOptions::read_info`].
pub struct GifReader {
    version: Version,
    width: u16,
    height: u16,
    repeat: Repeat,
    frames: Vec<RawFrame>,
    converter: PixelConverter,
    /// Index of the next frame the canvas is ready for.
    composed: usize,
}

impl GifReader {
    /// Opens `bytes` with default options.
    pub fn new_from_bytes(bytes: &[u8]) -> Result<Self, DecodingError> {
        DecodeOptions::new().read_info(bytes)
    }

    fn new(index: StreamIndex, options: DecodeOptions) -> Result<Self, DecodingError> {
        let StreamIndex {
            header,
            frames,
            repeat,
        } = index;
        let (mut width, mut height) = (header.width, header.height);
        // Some encoders leave the screen descriptor empty
        if width == 0 || height == 0 {
            width = frames
                .iter()
                .map(|f| f.left.saturating_add(f.width))
                .max()
                .unwrap_or(0);
            height = frames
                .iter()
                .map(|f| f.top.saturating_add(f.height))
                .max()
                .unwrap_or(0);
        }
        let converter = PixelConverter::new(
            width,
            height,
            header.global_palette,
            options.memory_limit,
            options.check_for_end_code,
        )?;
        Ok(GifReader {
            version: header.version,
            width,
            height,
            repeat,
            frames,
            converter,
            composed: 0,
        })
    }

    /// Width of the canvas frames are decoded to
    #[inline]
    pub fn width(&self) -> u16 {
        self.width
    }

    /// Height of the canvas frames are decoded to
    #[inline]
    pub fn height(&self) -> u16 {
        self.height
    }

    /// The version number of the GIF standard used in this image.
    pub fn version(&self) -> Version {
        self.version
    }

    /// The global color palette
    pub fn global_palette(&self) -> Option<&[u8]> {
        self.converter.global_palette()
    }

    /// Number of loop repetitions
    #[inline]
    pub fn repeat(&self) -> Repeat {
        self.repeat
    }

    /// Number of image entries in the stream.
    #[inline]
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Graphic control metadata of frame `index`.
    pub fn properties_at(&self, index: usize) -> Option<FrameProperties> {
        self.frames.get(index).and_then(|f| f.properties)
    }

    /// Decodes frame `index` as it appears on screen: an RGBA image of the
    /// whole canvas with all earlier frames painted underneath.
    ///
    /// Frames that fail to decode do not touch the canvas. Reading frames in
    /// order is cheapest; going back replays the stream from the first frame.
    pub fn read_frame(&mut self, index: usize) -> Result<Frame, DecodingError> {
        if index >= self.frames.len() {
            return Err(DecodingError::format("frame index out of range"));
        }
        if index < self.composed {
            self.converter.reset();
            self.composed = 0;
        }
        while self.composed < index {
            let skipped = self.composed;
            if let Err(err) = self.converter.compose(&self.frames[skipped]) {
                warn!("frame {} does not decode: {}", skipped, err);
            }
            self.composed += 1;
        }
        self.composed = index + 1;
        self.converter.compose(&self.frames[index])?;
        Frame::from_rgba(self.width, self.height, self.converter.canvas().to_vec())
            .map_err(|_| DecodingError::format("frame has an empty canvas"))
    }
}

impl ContainerReader for GifReader {
    type Error = DecodingError;

    fn frame_count(&self) -> usize {
        self.frame_count()
    }

    fn image_at(&mut self, index: usize) -> Result<Frame, DecodingError> {
        self.read_frame(index)
    }

    fn properties_at(&self, index: usize) -> Option<FrameProperties> {
        GifReader::properties_at(self, index)
    }

    fn repeat(&self) -> Repeat {
        self.repeat
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::encoder::GifWriter;

    fn stream(frames: &[[u8; 4]]) -> Vec<u8> {
        let mut writer = GifWriter::new(frames.len());
        writer.set_repeat(Repeat::Finite(2));
        for (i, rgba) in frames.iter().enumerate() {
            let frame = Frame::from_rgba(1, 1, rgba.to_vec()).unwrap();
            let props = FrameProperties::with_delay(10 * (i as u16 + 1));
            writer.write_frame(&frame, &props).unwrap();
        }
        writer.finish().unwrap()
    }

    #[test]
    fn random_access_replays() {
        let data = stream(&[[255, 0, 0, 255], [0, 255, 0, 255], [0, 0, 255, 255]]);
        let mut reader = GifReader::new_from_bytes(&data).unwrap();
        assert_eq!(reader.frame_count(), 3);
        assert_eq!(reader.repeat(), Repeat::Finite(2));
        assert_eq!(reader.version(), Version::V89a);
        assert_eq!(reader.read_frame(2).unwrap().pixels(), &[0, 0, 255, 255]);
        assert_eq!(reader.read_frame(0).unwrap().pixels(), &[255, 0, 0, 255]);
        assert_eq!(reader.read_frame(1).unwrap().pixels(), &[0, 255, 0, 255]);
        assert!(reader.read_frame(3).is_err());
        assert_eq!(reader.properties_at(1).unwrap().unclamped_delay, Some(20));
    }

    #[test]
    fn memory_limit_rejects_large_canvas() {
        let data = stream(&[[1, 2, 3, 255]]);
        let mut options = DecodeOptions::new();
        options.set_memory_limit(MemoryLimit::Bytes(NonZeroU64::new(3).unwrap()));
        assert!(matches!(
            options.read_info(&data),
            Err(DecodingError::MemoryLimit)
        ));
    }
}
