use std::num::NonZeroUsize;

use log::{debug, warn};

use crate::common::{FrameProperties, Repeat};
use crate::container::{Container, ContainerWriter};
use crate::delay::{self, DelayMode};
use crate::frame::FrameSequence;
use crate::gif::Gif;

use super::EncodeError;

/// Turns a [`FrameSequence`] into container bytes.
#[derive(Debug, Clone)]
pub struct SequenceEncoder<C = Gif> {
    container: C,
    duration: f64,
    repeat: Repeat,
    delay_mode: DelayMode,
}

impl SequenceEncoder<Gif> {
    /// A GIF encoder looping forever, with uniform delays taken from the sequence.
    #[must_use]
    pub fn new() -> Self {
        Self::with_container(Gif::new())
    }
}

impl Default for SequenceEncoder<Gif> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Container> SequenceEncoder<C> {
    /// An encoder writing through `container`.
    pub fn with_container(container: C) -> Self {
        SequenceEncoder {
            container,
            duration: 0.0,
            repeat: Repeat::Infinite,
            delay_mode: DelayMode::Uniform,
        }
    }

    /// Playback time of the whole stream in seconds.
    ///
    /// Values `<= 0` use the sequence's own total duration.
    pub fn set_duration(&mut self, seconds: f64) {
        self.duration = seconds;
    }

    /// Loop count as stored in the stream, `0` looping forever.
    pub fn set_loop_count(&mut self, loop_count: u16) {
        self.repeat = Repeat::from_loop_count(loop_count);
    }

    /// Loop metadata. `Repeat::Finite(0)` writes none.
    pub fn set_repeat(&mut self, repeat: Repeat) {
        self.repeat = repeat;
    }

    /// How delays are assigned to frames, uniform by default.
    pub fn set_delay_mode(&mut self, mode: DelayMode) {
        self.delay_mode = mode;
    }

    /// Encodes every frame of `sequence` the container accepts.
    ///
    /// Frames the container rejects are left out. Nothing is returned unless
    /// the container completes the stream.
    pub fn encode(&self, sequence: &FrameSequence) -> Result<Vec<u8>, EncodeError> {
        let frame_count = NonZeroUsize::new(sequence.len()).ok_or(EncodeError::EmptyInput)?;
        let mut writer = self
            .container
            .open_for_write(frame_count.get())
            .map_err(|err| EncodeError::ContainerInitFailed(Box::new(err)))?;
        writer
            .set_repeat(self.repeat)
            .map_err(|err| EncodeError::ContainerInitFailed(Box::new(err)))?;

        let total = delay::total_duration(sequence.total_duration(), self.duration);
        let uniform = FrameProperties::with_delay(delay::uniform_ticks(total, frame_count));
        let mut written = 0;
        for (index, frame) in sequence.iter().enumerate() {
            let properties = match (self.delay_mode, frame.delay()) {
                (DelayMode::PerFrame, Some(seconds)) => {
                    FrameProperties::with_delay(delay::seconds_to_ticks(seconds))
                }
                _ => uniform,
            };
            match writer.add_frame(frame, &properties) {
                Ok(()) => written += 1,
                Err(err) => warn!("skipping frame {} of {}: {}", index, frame_count, err),
            }
        }
        debug!(
            "wrote {} of {} frames over {:.2}s, {:?}",
            written, frame_count, total, self.repeat
        );

        writer
            .finalize()
            .map_err(|err| EncodeError::FinalizeFailed(Box::new(err)))
    }
}
