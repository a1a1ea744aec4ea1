use crate::container::Container;
use crate::encoder::{EncodeOptions, EncodingError, GifWriter};
use crate::reader::{DecodeOptions, DecodingError, GifReader};

/// The GIF container, as read by [`GifReader`] and written by [`GifWriter`].
#[derive(Debug, Clone, Default)]
pub struct Gif {
    decode: DecodeOptions,
    encode: EncodeOptions,
}

impl Gif {
    /// GIF with default reader and writer options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses `options` when opening streams.
    #[must_use]
    pub fn with_decode_options(mut self, options: DecodeOptions) -> Self {
        self.decode = options;
        self
    }

    /// Uses `options` when writing streams.
    #[must_use]
    pub fn with_encode_options(mut self, options: EncodeOptions) -> Self {
        self.encode = options;
        self
    }
}

impl Container for Gif {
    type Reader = GifReader;
    type Writer = GifWriter;

    fn open_for_read(&self, bytes: &[u8]) -> Result<GifReader, DecodingError> {
        self.decode.clone().read_info(bytes)
    }

    fn open_for_write(&self, capacity_hint: usize) -> Result<GifWriter, EncodingError> {
        Ok(GifWriter::with_options(capacity_hint, self.encode.clone()))
    }
}
