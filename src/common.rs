//! Block labels and frame metadata shared by the reader and the writer

/// Disposal method
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum DisposalMethod {
    /// Decoder is not required to take any action.
    Any = 0,
    /// Do not dispose.
    #[default]
    Keep = 1,
    /// Restore to background color.
    Background = 2,
    /// Restore to previous.
    Previous = 3,
}

impl DisposalMethod {
    /// Converts `u8` to `Option<Self>`
    #[must_use]
    pub fn from_u8(n: u8) -> Option<DisposalMethod> {
        match n {
            0 => Some(DisposalMethod::Any),
            1 => Some(DisposalMethod::Keep),
            2 => Some(DisposalMethod::Background),
            3 => Some(DisposalMethod::Previous),
            _ => None,
        }
    }
}

/// Known GIF block labels
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum Block {
    /// Image block.
    Image = 0x2C,
    /// Extension block.
    Extension = 0x21,
    /// Image trailer.
    Trailer = 0x3B,
}

impl Block {
    /// Converts `u8` to `Option<Self>`
    #[must_use]
    pub fn from_u8(n: u8) -> Option<Block> {
        match n {
            0x2C => Some(Block::Image),
            0x21 => Some(Block::Extension),
            0x3B => Some(Block::Trailer),
            _ => None,
        }
    }
}

/// Known GIF extension labels
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum Extension {
    /// Plain text extension.
    Text = 0x01,
    /// Graphic control extension.
    Control = 0xF9,
    /// Comment extension.
    Comment = 0xFE,
    /// Application extension.
    Application = 0xFF,
}

impl Extension {
    /// Converts `u8` to `Option<Self>`
    #[must_use]
    pub fn from_u8(n: u8) -> Option<Extension> {
        match n {
            0x01 => Some(Extension::Text),
            0xF9 => Some(Extension::Control),
            0xFE => Some(Extension::Comment),
            0xFF => Some(Extension::Application),
            _ => None,
        }
    }
}

/// Number of repetitions of an animation.
///
/// This is the value carried by the `NETSCAPE2.0` application extension. A
/// loop count of `0` in that extension means "forever".
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Repeat {
    /// Finite number of repetitions.
    ///
    /// `Finite(0)` means the stream has no loop extension at all and plays once.
    Finite(u16),
    /// Looping without end.
    Infinite,
}

impl Default for Repeat {
    fn default() -> Self {
        Repeat::Finite(0)
    }
}

impl Repeat {
    /// Interprets a loop count the way the container stores it: `0` loops forever.
    #[must_use]
    pub fn from_loop_count(loop_count: u16) -> Self {
        match loop_count {
            0 => Repeat::Infinite,
            n => Repeat::Finite(n),
        }
    }

    /// The value written to the loop extension, or `None` if no extension is written.
    #[must_use]
    pub fn loop_count(self) -> Option<u16> {
        match self {
            Repeat::Infinite => Some(0),
            Repeat::Finite(0) => None,
            Repeat::Finite(n) => Some(n),
        }
    }
}

/// Per-frame metadata read from or written to a graphic control extension.
///
/// Delays are in ticks, hundredths of a second.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct FrameProperties {
    /// Delay as a player would apply it, see [`crate::delay::clamp_ticks`].
    pub delay: Option<u16>,
    /// Delay exactly as stored in the stream.
    pub unclamped_delay: Option<u16>,
    /// Disposal method.
    pub dispose: DisposalMethod,
    /// True if the frame needs user input to be displayed.
    pub needs_user_input: bool,
}

impl FrameProperties {
    /// Properties carrying only a delay.
    #[must_use]
    pub fn with_delay(ticks: u16) -> Self {
        FrameProperties {
            delay: Some(ticks),
            ..FrameProperties::default()
        }
    }
}

#[cfg(test)]
mod test {
    use super::{DisposalMethod, Repeat};

    #[test]
    fn loop_count_zero_is_infinite() {
        assert_eq!(Repeat::from_loop_count(0), Repeat::Infinite);
        assert_eq!(Repeat::from_loop_count(3), Repeat::Finite(3));
        assert_eq!(Repeat::Infinite.loop_count(), Some(0));
        assert_eq!(Repeat::Finite(7).loop_count(), Some(7));
        assert_eq!(Repeat::Finite(0).loop_count(), None);
    }

    #[test]
    fn disposal_from_flags() {
        assert_eq!(DisposalMethod::from_u8(2), Some(DisposalMethod::Background));
        assert_eq!(DisposalMethod::from_u8(5), None);
    }
}
