#![forbid(unsafe_code)]
//! # Animated GIF en- and decoding
//!
//! Converts GIF byte streams to sequences of full-canvas RGBA frames and back,
//! keeping the timing and loop metadata of the animation.
//!
//! ## High level interface
//!
//! [`decode`] and [`encode`] cover whole streams. Frame delays are converted
//! between the hundredths of a second stored in the file and seconds as `f64`.
//!
//! ### Decoding
//!
//! ```rust
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! # let bytes = gif_anim::encode(&gif_anim::FrameSequence::new(vec![
//! #     gif_anim::Frame::from_rgb(2, 2, vec![0; 12])?,
//! # ]).with_duration(0.5), 0.0, 0)?;
//! // No scale annotation, no duration override.
//! let sequence = gif_anim::decode(&bytes, 1.0, 0.0)?;
//! for frame in &sequence {
//!     // Every frame covers the whole canvas.
//!     assert_eq!(frame.pixels().len(), 2 * 2 * 4);
//! }
//! println!("plays for {:.2}s", sequence.total_duration());
//! # Ok(())
//! # }
//! ```
//!
//! ### Encoding
//!
//! ```rust
//! use gif_anim::{Frame, FrameSequence};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let (width, height) = (6, 6);
//! let red = [0xFF, 0, 0, 0xFF].repeat(width * height);
//! let clear = vec![0; width * height * 4];
//! let frames = vec![
//!     Frame::from_rgba(width as u16, height as u16, red)?,
//!     Frame::from_rgba(width as u16, height as u16, clear)?,
//! ];
//! // One second in total, each frame shown for 50 hundredths, looping forever.
//! let bytes = gif_anim::encode(&FrameSequence::new(frames), 1.0, 0)?;
//! assert_eq!(&bytes[..6], b"GIF89a");
//! # Ok(())
//! # }
//! ```
//!
//! ## Lower level interface
//!
//! [`SequenceDecoder`] and [`SequenceEncoder`] expose the remaining options and
//! work through any [`Container`]. [`GifReader`] and [`GifWriter`] give access to
//! the frames of a single stream.
#![deny(missing_docs)]
#![allow(unknown_lints)] // Certain lints only apply to later versions of Rust
#![allow(clippy::manual_range_contains)]

mod animation;
mod common;
mod container;
pub mod delay;
mod encoder;
mod frame;
mod gif;
mod reader;
mod traits;

pub use crate::common::{DisposalMethod, FrameProperties, Repeat};
pub use crate::frame::{Frame, FrameError, FrameSequence, PixelFormat};

pub use crate::container::{Container, ContainerReader, ContainerWriter};
pub use crate::gif::Gif;

pub use crate::reader::{DecodeOptions, GifReader, MemoryLimit, Version};
pub use crate::reader::{DecodingError, DecodingFormatError};

pub use crate::encoder::{EncodeOptions, EncodingError, EncodingFormatError, GifWriter};

pub use crate::animation::{decode, encode, DecodeError, EncodeError};
pub use crate::animation::{SequenceDecoder, SequenceEncoder};

/// Block and extension labels of the GIF format.
pub mod format {
    pub use crate::common::{Block, Extension};
    pub use crate::reader::PLTE_CHANNELS;
}
