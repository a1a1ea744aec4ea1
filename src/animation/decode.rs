use log::{debug, warn};

use crate::container::{Container, ContainerReader};
use crate::delay::ResolvedDelays;
use crate::frame::{Frame, FrameSequence};
use crate::gif::Gif;

use super::DecodeError;

/// What a container held.
enum Outcome {
    /// A still image without frame entries.
    SingleStill(Frame),
    /// Frames that decoded, with the sum of their delays.
    Animated {
        frames: Vec<Frame>,
        delays: ResolvedDelays,
    },
}

/// Turns container bytes into a [`FrameSequence`].
#[derive(Debug, Clone)]
pub struct SequenceDecoder<C = Gif> {
    container: C,
    scale: f64,
    duration: f64,
}

impl SequenceDecoder<Gif> {
    /// A GIF decoder with scale 1 and no duration override.
    #[must_use]
    pub fn new() -> Self {
        Self::with_container(Gif::new())
    }
}

impl Default for SequenceDecoder<Gif> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Container> SequenceDecoder<C> {
    /// A decoder reading through `container`.
    pub fn with_container(container: C) -> Self {
        SequenceDecoder {
            container,
            scale: 1.0,
            duration: 0.0,
        }
    }

    /// Scale recorded on the decoded frames. Pixels are not resampled.
    pub fn set_scale(&mut self, scale: f64) {
        self.scale = scale;
    }

    /// Playback time of the decoded sequence in seconds, if positive.
    ///
    /// Per-frame delays are still read and kept on the frames.
    pub fn set_duration(&mut self, seconds: f64) {
        self.duration = seconds;
    }

    /// Decodes every frame of `bytes` that can be decoded.
    ///
    /// Frames that fail are left out. The call fails only if the bytes are not
    /// a container at all or if no frame is left.
    ///
    /// A stream the container refuses to open for resource reasons, such as a
    /// canvas over the [`MemoryLimit`](crate::MemoryLimit) of [`Gif`], is also
    /// reported as [`DecodeError::MalformedInput`]. The container's own error is
    /// its [`source`](std::error::Error::source).
    pub fn decode(&self, bytes: &[u8]) -> Result<FrameSequence, DecodeError> {
        let mut reader = self
            .container
            .open_for_read(bytes)
            .map_err(|err| DecodeError::MalformedInput(Box::new(err)))?;
        let repeat = reader.repeat();
        let frames = match read_outcome(&mut reader)? {
            Outcome::SingleStill(frame) => {
                debug!("decoded a still image");
                vec![frame]
            }
            Outcome::Animated { frames, delays } => {
                debug!(
                    "decoded {} frames, {:.2}s of delays",
                    frames.len(),
                    delays.calculated_duration()
                );
                frames
            }
        };
        Ok(FrameSequence::new(frames)
            .with_repeat(repeat)
            .with_duration(self.duration)
            .with_scale(self.scale))
    }
}

fn read_outcome<R: ContainerReader>(reader: &mut R) -> Result<Outcome, DecodeError> {
    let count = reader.frame_count();
    if count == 0 {
        return reader
            .still_image()
            .map(Outcome::SingleStill)
            .ok_or(DecodeError::NoDecodableFrames);
    }

    let mut frames = Vec::with_capacity(count);
    let mut delays = ResolvedDelays::default();
    for index in 0..count {
        let image = match reader.image_at(index) {
            Ok(image) => image,
            Err(err) => {
                warn!("skipping frame {} of {}: {}", index, count, err);
                continue;
            }
        };
        let properties = reader.properties_at(index).unwrap_or_default();
        let seconds = delays.push(&properties);
        frames.push(image.with_delay(seconds));
    }
    if frames.is_empty() {
        return Err(DecodeError::NoDecodableFrames);
    }
    Ok(Outcome::Animated { frames, delays })
}
