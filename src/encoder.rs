//! # Minimal gif encoder
use std::collections::HashMap;
use std::io;
use std::io::prelude::*;

use log::debug;
use weezl::{encode::Encoder as LzwEncoder, BitOrder};

use crate::common::{Block, DisposalMethod, Extension, FrameProperties, Repeat};
use crate::container::ContainerWriter;
use crate::delay::resolve_ticks;
use crate::frame::Frame;
use crate::traits::WriteBytesExt;

/// The image has incorrect properties, making it impossible to encode as a gif.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum EncodingFormatError {
    /// The stream was finished without a single frame.
    #[error("the image has no frames")]
    NoFrames,
}

/// Encoding error.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum EncodingError {
    /// Returned if the to image is not encodable as a gif.
    #[error(transparent)]
    Format(#[from] EncodingFormatError),
    /// Wraps `std::io::Error`.
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Options for [`GifWriter`].
#[derive(Debug, Clone)]
pub struct EncodeOptions {
    quantize_speed: i32,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl EncodeOptions {
    /// Default options.
    #[must_use]
    pub fn new() -> Self {
        EncodeOptions { quantize_speed: 10 }
    }

    /// Speed of the color reduction for frames with more than 256 colors.
    ///
    /// `speed` is clamped to the range [1, 30]. Higher values run faster at the
    /// cost of image quality. 10 is a good compromise between speed and quality.
    pub fn set_quantize_speed(&mut self, speed: i32) {
        self.quantize_speed = speed.clamp(1, 30);
    }
}

/// Disposal bits of the graphic control extension flags.
const DISPOSAL_MASK: u8 = 0b1_1100;

/// A frame reduced to at most 256 colors.
#[derive(Debug)]
struct IndexedImage {
    palette: Vec<u8>,
    indices: Vec<u8>,
    transparent: Option<u8>,
}

impl IndexedImage {
    /// Keeps the colors as they are if there are few enough of them.
    ///
    /// Fully transparent pixels share one palette entry, other alpha values are made opaque.
    fn from_rgba(rgba: &[u8], speed: i32) -> Self {
        exact_palette(rgba).unwrap_or_else(|| quantize(rgba, speed))
    }
}

fn exact_palette(rgba: &[u8]) -> Option<IndexedImage> {
    let mut lookup: HashMap<[u8; 4], u8> = HashMap::new();
    let mut palette = Vec::new();
    let mut transparent = None;
    let mut indices = Vec::with_capacity(rgba.len() / 4);
    for pix in rgba.chunks_exact(4) {
        let key = if pix[3] == 0 {
            [0, 0, 0, 0]
        } else {
            [pix[0], pix[1], pix[2], 0xFF]
        };
        let idx = match lookup.get(&key) {
            Some(&idx) => idx,
            None => {
                let idx = u8::try_from(lookup.len()).ok()?;
                lookup.insert(key, idx);
                palette.extend_from_slice(&key[..3]);
                if key[3] == 0 {
                    transparent = Some(idx);
                }
                idx
            }
        };
        indices.push(idx);
    }
    Some(IndexedImage {
        palette,
        indices,
        transparent,
    })
}

/// Reduces to 256 colors, or to 255 plus one transparent entry at the end.
fn quantize(rgba: &[u8], speed: i32) -> IndexedImage {
    let opaque: Vec<u8> = rgba
        .chunks_exact(4)
        .filter(|pix| pix[3] != 0)
        .flat_map(|pix| [pix[0], pix[1], pix[2], 0xFF])
        .collect();
    let has_transparency = opaque.len() < rgba.len();
    let colors = if has_transparency { 255 } else { 256 };
    let nq = color_quant::NeuQuant::new(speed, colors, &opaque);
    let mut palette = nq.color_map_rgb();
    let transparent = has_transparency.then(|| {
        let idx = (palette.len() / 3) as u8;
        palette.extend_from_slice(&[0, 0, 0]);
        idx
    });
    let indices = rgba
        .chunks_exact(4)
        .map(|pix| match transparent {
            Some(idx) if pix[3] == 0 => idx,
            _ => nq.index_of(&[pix[0], pix[1], pix[2], 0xFF]) as u8,
        })
        .collect();
    IndexedImage {
        palette,
        indices,
        transparent,
    }
}

/// Splits LZW output into sub-blocks of at most 255 bytes.
struct BlockWriter<'a, W: Write + 'a> {
    w: &'a mut W,
    bytes: usize,
    buf: [u8; 0xFF],
}

impl<'a, W: Write + 'a> BlockWriter<'a, W> {
    fn new(w: &'a mut W) -> Self {
        BlockWriter {
            w,
            bytes: 0,
            buf: [0; 0xFF],
        }
    }

    /// Writes the last, partial sub-block.
    fn finish(self) -> io::Result<()> {
        if self.bytes > 0 {
            self.w.write_le(self.bytes as u8)?;
            self.w.write_all(&self.buf[..self.bytes])?;
        }
        Ok(())
    }
}

impl<'a, W: Write + 'a> Write for BlockWriter<'a, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let to_copy = buf.len().min(0xFF - self.bytes);
        self.buf[self.bytes..self.bytes + to_copy].copy_from_slice(&buf[..to_copy]);
        self.bytes += to_copy;
        if self.bytes == 0xFF {
            self.bytes = 0;
            self.w.write_le(0xFFu8)?;
            self.w.write_all(&self.buf)?;
        }
        Ok(to_copy)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// GIF writer collecting frames into an in-memory stream.
///
/// The logical screen is sized to the largest frame once [`Self::finish`] is called.
#[derive(Debug)]
pub struct GifWriter {
    options: EncodeOptions,
    repeat: Repeat,
    width: u16,
    height: u16,
    frames: usize,
    body: Vec<u8>,
    /// Offset of the packed flags in the previous frame's control extension.
    last_control: Option<usize>,
}

impl GifWriter {
    /// Creates a writer expecting about `capacity_hint` frames.
    pub fn new(capacity_hint: usize) -> Self {
        Self::with_options(capacity_hint, EncodeOptions::new())
    }

    /// Creates a writer with the given options.
    pub fn with_options(capacity_hint: usize, options: EncodeOptions) -> Self {
        GifWriter {
            options,
            repeat: Repeat::default(),
            width: 0,
            height: 0,
            frames: 0,
            // a small frame takes about a kilobyte
            body: Vec::with_capacity(capacity_hint.saturating_mul(1024)),
            last_control: None,
        }
    }

    /// Sets the loop extension written by [`Self::finish`].
    pub fn set_repeat(&mut self, repeat: Repeat) {
        self.repeat = repeat;
    }

    /// Number of frames written so far.
    pub fn frame_count(&self) -> usize {
        self.frames
    }

    /// Writes a complete frame with its graphic control extension.
    ///
    /// A frame with transparent pixels must not show the frame before it, so
    /// that frame is switched to [`DisposalMethod::Background`]. On error
    /// nothing of the frame is kept.
    pub fn write_frame(
        &mut self,
        frame: &Frame,
        properties: &FrameProperties,
    ) -> Result<(), EncodingError> {
        let start = self.body.len();
        let transparent = match self.write_frame_blocks(frame, properties) {
            Ok(transparent) => transparent,
            Err(err) => {
                self.body.truncate(start);
                return Err(err);
            }
        };
        if transparent {
            if let Some(flags) = self.last_control.and_then(|at| self.body.get_mut(at)) {
                *flags = (*flags & !DISPOSAL_MASK) | ((DisposalMethod::Background as u8) << 2);
            }
        }
        // block label, extension label, block size, then the flags
        self.last_control = Some(start + 3);
        self.width = self.width.max(frame.width());
        self.height = self.height.max(frame.height());
        self.frames += 1;
        Ok(())
    }

    /// Returns whether the frame has a transparent index.
    fn write_frame_blocks(
        &mut self,
        frame: &Frame,
        properties: &FrameProperties,
    ) -> Result<bool, EncodingError> {
        let image = IndexedImage::from_rgba(&frame.to_rgba(), self.options.quantize_speed);
        self.write_control_extension(
            resolve_ticks(properties),
            properties.dispose,
            properties.needs_user_input,
            image.transparent,
        )?;

        let w = &mut self.body;
        w.write_le(Block::Image as u8)?;
        w.write_le(0u16)?;
        w.write_le(0u16)?;
        w.write_le(frame.width())?;
        w.write_le(frame.height())?;
        let size = flag_size(image.palette.len() / 3);
        w.write_le(0b1000_0000 | size)?;
        write_color_table(w, &image.palette, size)?;
        write_image_block(w, &image.indices, (size + 1).max(2))?;
        Ok(image.transparent.is_some())
    }

    fn write_control_extension(
        &mut self,
        delay: u16,
        dispose: DisposalMethod,
        needs_user_input: bool,
        transparent: Option<u8>,
    ) -> io::Result<()> {
        let mut flags = 0;
        if transparent.is_some() {
            flags |= 1;
        }
        flags |= u8::from(needs_user_input) << 1;
        flags |= (dispose as u8) << 2;

        let w = &mut self.body;
        w.write_le(Block::Extension as u8)?;
        w.write_le(Extension::Control as u8)?;
        w.write_le(4u8)?;
        w.write_le(flags)?;
        w.write_le(delay)?;
        w.write_le(transparent.unwrap_or(0))?;
        w.write_le(0u8)
    }

    /// Assembles the stream: header, loop extension, frames and trailer.
    pub fn finish(self) -> Result<Vec<u8>, EncodingError> {
        if self.frames == 0 {
            return Err(EncodingFormatError::NoFrames.into());
        }
        let mut out = Vec::with_capacity(self.body.len() + 64);
        out.write_all(b"GIF89a")?;
        out.write_le(self.width)?;
        out.write_le(self.height)?;
        // no global color table, background index, aspect ratio
        out.write_all(&[0, 0, 0])?;
        if let Some(loop_count) = self.repeat.loop_count() {
            out.write_le(Block::Extension as u8)?;
            out.write_le(Extension::Application as u8)?;
            out.write_le(11u8)?;
            out.write_all(b"NETSCAPE2.0")?;
            out.write_all(&[3, 1])?;
            out.write_le(loop_count)?;
            out.write_le(0u8)?;
        }
        out.write_all(&self.body)?;
        out.write_le(Block::Trailer as u8)?;
        debug!(
            "encoded {} frames, {}x{} screen, {} bytes",
            self.frames,
            self.width,
            self.height,
            out.len()
        );
        Ok(out)
    }
}

impl ContainerWriter for GifWriter {
    type Error = EncodingError;

    fn set_repeat(&mut self, repeat: Repeat) -> Result<(), EncodingError> {
        GifWriter::set_repeat(self, repeat);
        Ok(())
    }

    fn add_frame(&mut self, frame: &Frame, properties: &FrameProperties) -> Result<(), EncodingError> {
        self.write_frame(frame, properties)
    }

    fn finalize(self) -> Result<Vec<u8>, EncodingError> {
        self.finish()
    }
}

fn write_color_table(w: &mut Vec<u8>, table: &[u8], size: u8) -> io::Result<()> {
    let num_colors = table.len() / 3;
    w.write_all(&table[..num_colors * 3])?;
    // Waste some space as of gif spec
    for _ in num_colors..(2 << size) {
        w.write_all(&[0, 0, 0])?;
    }
    Ok(())
}

fn write_image_block(w: &mut Vec<u8>, data: &[u8], min_code_size: u8) -> Result<(), EncodingError> {
    w.write_le(min_code_size)?;
    let mut bw = BlockWriter::new(w);
    let mut enc = LzwEncoder::new(BitOrder::Lsb, min_code_size);
    enc.into_stream(&mut bw).encode_all(data).status?;
    bw.finish()?;
    w.write_le(0u8)?;
    Ok(())
}

// Color table size converted to flag bits
fn flag_size(size: usize) -> u8 {
    match size {
        0..=2 => 0,
        3..=4 => 1,
        5..=8 => 2,
        9..=16 => 3,
        17..=32 => 4,
        33..=64 => 5,
        65..=128 => 6,
        _ => 7,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn flag_sizes_cover_palette() {
        for colors in 1..=256usize {
            let size = flag_size(colors);
            assert!(2usize << size >= colors, "{} colors in {}", colors, size);
            assert!(size == 0 || 1usize << size < colors);
        }
    }

    #[test]
    fn block_writer_splits_sub_blocks() {
        let mut out = Vec::new();
        let mut bw = BlockWriter::new(&mut out);
        bw.write_all(&[7; 300]).unwrap();
        bw.finish().unwrap();
        assert_eq!(out.len(), 302);
        assert_eq!(out[0], 0xFF);
        assert_eq!(out[256], 45);
    }

    #[test]
    fn few_colors_keep_exact_palette() {
        let rgba = [1, 2, 3, 255, 9, 9, 9, 0, 1, 2, 3, 128, 4, 5, 6, 255];
        let image = IndexedImage::from_rgba(&rgba, 10);
        assert_eq!(image.palette, [1, 2, 3, 0, 0, 0, 4, 5, 6]);
        assert_eq!(image.indices, [0, 1, 0, 2]);
        assert_eq!(image.transparent, Some(1));
    }

    #[test]
    fn many_colors_are_quantized() {
        let rgba: Vec<u8> = (0..1024u32)
            .flat_map(|i| [(i % 256) as u8, (i / 4) as u8, (i * 7 % 256) as u8, 255])
            .collect();
        let image = IndexedImage::from_rgba(&rgba, 30);
        assert_eq!(image.indices.len(), 1024);
        assert!(image.palette.len() <= 256 * 3);
        assert_eq!(image.transparent, None);
    }

    #[test]
    fn finish_without_frames_fails() {
        let writer = GifWriter::new(0);
        assert!(matches!(
            writer.finish(),
            Err(EncodingError::Format(EncodingFormatError::NoFrames))
        ));
    }

    #[test]
    fn writes_loop_extension() {
        let mut writer = GifWriter::new(1);
        writer.set_repeat(Repeat::Finite(4));
        let frame = Frame::from_rgb(2, 2, vec![0; 12]).unwrap();
        writer.write_frame(&frame, &FrameProperties::with_delay(50)).unwrap();
        let data = writer.finish().unwrap();
        assert_eq!(&data[..6], b"GIF89a");
        assert_eq!(&data[6..10], &[2, 0, 2, 0]);
        assert_eq!(&data[13..16], &[0x21, 0xFF, 11]);
        assert_eq!(&data[16..27], b"NETSCAPE2.0");
        assert_eq!(&data[27..31], &[3, 1, 4, 0]);
        // graphic control extension follows the loop extension
        assert_eq!(&data[32..40], &[0x21, 0xF9, 4, 1 << 2, 50, 0, 0, 0]);
        assert_eq!(data.last(), Some(&0x3B));
    }

    #[test]
    fn transparent_pixels_of_many_colors_share_one_index() {
        let rgba: Vec<u8> = (0..1200u32)
            .flat_map(|i| {
                if i % 4 == 0 {
                    [(i % 256) as u8, (i / 5) as u8, 9, 0]
                } else {
                    [(i % 256) as u8, (i / 4) as u8, (i * 7 % 256) as u8, 255]
                }
            })
            .collect();
        let image = IndexedImage::from_rgba(&rgba, 30);
        assert_eq!(image.transparent, Some(255));
        assert_eq!(image.palette.len(), 256 * 3);
        for (pix, &idx) in rgba.chunks_exact(4).zip(&image.indices) {
            assert_eq!(pix[3] == 0, idx == 255, "alpha {} got index {}", pix[3], idx);
        }
    }

    #[test]
    fn transparent_frame_disposes_the_previous_one() {
        let mut writer = GifWriter::new(3);
        let opaque = Frame::from_rgba(1, 1, vec![1, 2, 3, 255]).unwrap();
        let clear = Frame::from_rgba(1, 1, vec![0; 4]).unwrap();
        let props = FrameProperties::with_delay(5);
        writer.write_frame(&opaque, &props).unwrap();
        let second = writer.body.len();
        writer.write_frame(&opaque, &props).unwrap();
        let third = writer.body.len();
        writer.write_frame(&clear, &props).unwrap();

        let disposal = |at: usize| (writer.body[at + 3] & DISPOSAL_MASK) >> 2;
        assert_eq!(writer.body[second..second + 2], [0x21, 0xF9]);
        assert_eq!(disposal(0), DisposalMethod::Keep as u8);
        assert_eq!(disposal(second), DisposalMethod::Background as u8);
        assert_eq!(disposal(third), DisposalMethod::Keep as u8);
    }
}
