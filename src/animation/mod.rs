//! Whole-stream conversion between bytes and [`FrameSequence`]s.
//!
//! [`decode`] and [`encode`] cover the common case. [`SequenceDecoder`] and
//! [`SequenceEncoder`] take any [`Container`](crate::Container) and expose the
//! remaining options.
use std::error;

use crate::frame::FrameSequence;

mod decode;
mod encode;

pub use self::decode::SequenceDecoder;
pub use self::encode::SequenceEncoder;

type BoxError = Box<dyn error::Error + Send + Sync + 'static>;

/// A byte stream could not be turned into a [`FrameSequence`].
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum DecodeError {
    /// The container refused the bytes.
    ///
    /// Besides malformed data this covers streams the container will not
    /// open, e.g. a GIF canvas over the memory limit. The source tells them
    /// apart.
    #[error("not a recognized animated image")]
    MalformedInput(#[source] BoxError),
    /// The container was read but none of its frames decoded.
    #[error("no frame of the stream could be decoded")]
    NoDecodableFrames,
}

/// A [`FrameSequence`] could not be turned into a byte stream.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum EncodeError {
    /// The sequence has no frames.
    #[error("cannot encode a sequence without frames")]
    EmptyInput,
    /// The container writer could not be created or set up.
    #[error("container writer could not be initialized")]
    ContainerInitFailed(#[source] BoxError),
    /// The container writer could not complete the stream.
    #[error("container writer could not be finalized")]
    FinalizeFailed(#[source] BoxError),
}

/// Decodes a GIF stream.
///
/// `scale` is recorded on the frames for the renderer. A positive `duration`
/// replaces the summed frame delays as the playback time of the sequence.
///
/// The default [`MemoryLimit`](crate::MemoryLimit) applies. A canvas over it is
/// a [`DecodeError::MalformedInput`] whose source is
/// [`DecodingError::MemoryLimit`](crate::DecodingError::MemoryLimit).
pub fn decode(bytes: &[u8], scale: f64, duration: f64) -> Result<FrameSequence, DecodeError> {
    let mut decoder = SequenceDecoder::new();
    decoder.set_scale(scale);
    decoder.set_duration(duration);
    decoder.decode(bytes)
}

/// Encodes `sequence` as a GIF stream.
///
/// Every frame gets the same delay: `duration` split evenly, or the sequence's
/// own [`total_duration`](FrameSequence::total_duration) when `duration <= 0`.
/// A `loop_count` of `0` loops forever.
pub fn encode(
    sequence: &FrameSequence,
    duration: f64,
    loop_count: u16,
) -> Result<Vec<u8>, EncodeError> {
    let mut encoder = SequenceEncoder::new();
    encoder.set_duration(duration);
    encoder.set_loop_count(loop_count);
    encoder.encode(sequence)
}
