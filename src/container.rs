//! The byte-level container seam.
//!
//! [`SequenceDecoder`](crate::SequenceDecoder) and
//! [`SequenceEncoder`](crate::SequenceEncoder) only talk to a container
//! through these traits. [`Gif`](crate::Gif) is the implementation backed by
//! this crate's reader and writer; tests substitute their own.
use std::error;

use crate::common::{FrameProperties, Repeat};
use crate::frame::Frame;

/// Random access to the frames of an opened stream.
pub trait ContainerReader {
    /// Error returned when a single frame cannot be extracted.
    type Error: error::Error + Send + Sync + 'static;

    /// Number of frame entries in the stream.
    fn frame_count(&self) -> usize;

    /// Decodes the image of frame `index`.
    fn image_at(&mut self, index: usize) -> Result<Frame, Self::Error>;

    /// Metadata of frame `index`, `None` if the entry carries none.
    fn properties_at(&self, index: usize) -> Option<FrameProperties>;

    /// Loop metadata of the stream.
    fn repeat(&self) -> Repeat;

    /// The whole stream as one image, for containers that hold a still image
    /// without enumerable frame entries.
    fn still_image(&mut self) -> Option<Frame> {
        None
    }
}

/// Sink for frames, producing the encoded stream on [`Self::finalize`].
pub trait ContainerWriter {
    /// Error type of all writer operations.
    type Error: error::Error + Send + Sync + 'static;

    /// Sets the loop metadata of the stream.
    fn set_repeat(&mut self, repeat: Repeat) -> Result<(), Self::Error>;

    /// Appends one frame.
    fn add_frame(&mut self, frame: &Frame, properties: &FrameProperties) -> Result<(), Self::Error>;

    /// Completes the stream.
    fn finalize(self) -> Result<Vec<u8>, Self::Error>;
}

/// Opens readers and writers for one container format.
pub trait Container {
    /// Reader type.
    type Reader: ContainerReader;
    /// Writer type.
    type Writer: ContainerWriter;

    /// Parses `bytes` far enough to know the frame entries.
    fn open_for_read(
        &self,
        bytes: &[u8],
    ) -> Result<Self::Reader, <Self::Reader as ContainerReader>::Error>;

    /// Creates a writer expecting about `capacity_hint` frames.
    fn open_for_write(
        &self,
        capacity_hint: usize,
    ) -> Result<Self::Writer, <Self::Writer as ContainerWriter>::Error>;
}
