use std::error;
use std::io;

use log::{debug, warn};
use weezl::{decode::Decoder as LzwDecoder, BitOrder, LzwStatus};

use crate::common::{Block, DisposalMethod, Extension, FrameProperties, Repeat};
use crate::delay::clamp_ticks;
use crate::reader::MemoryLimit;

/// GIF palettes are RGB
pub const PLTE_CHANNELS: usize = 3;

/// Application identifiers carrying a loop count.
const EXT_NAME_NETSCAPE: &[u8] = b"NETSCAPE2.0";
const EXT_NAME_ANIMEXTS: &[u8] = b"ANIMEXTS1.0";

/// An error returned in the case of the image not being formatted properly.
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct DecodingFormatError {
    underlying: Box<dyn error::Error + Send + Sync + 'static>,
}

/// Decoding error.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum DecodingError {
    /// Returned if the image is found to be malformed.
    #[error(transparent)]
    Format(#[from] DecodingFormatError),
    /// Wraps `std::io::Error`.
    #[error(transparent)]
    Io(#[from] io::Error),
    /// A frame would need more memory than [`MemoryLimit`] allows.
    #[error("memory limit reached")]
    MemoryLimit,
    /// Allocation failed.
    #[error("not enough memory")]
    OutOfMemory,
}

impl DecodingError {
    #[cold]
    pub(crate) fn format(err: &'static str) -> Self {
        DecodingError::Format(DecodingFormatError {
            underlying: err.into(),
        })
    }
}

impl From<io::ErrorKind> for DecodingError {
    #[cold]
    fn from(err: io::ErrorKind) -> Self {
        DecodingError::Io(io::Error::from(err))
    }
}

/// One version number of the GIF standard.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Version {
    /// Version 87a, from May 1987.
    V87a,
    /// Version 89a, from July 1989.
    V89a,
}

/// Logical screen descriptor and global color table.
#[derive(Debug, Clone)]
pub(crate) struct Header {
    pub version: Version,
    pub width: u16,
    pub height: u16,
    pub global_palette: Option<Vec<u8>>,
}

/// An image entry of the stream, still LZW compressed.
#[derive(Debug, Clone, Default)]
pub(crate) struct RawFrame {
    pub left: u16,
    pub top: u16,
    pub width: u16,
    pub height: u16,
    pub interlaced: bool,
    pub palette: Option<Vec<u8>>,
    pub transparent: Option<u8>,
    pub properties: Option<FrameProperties>,
    pub min_code_size: u8,
    pub lzw_data: Vec<u8>,
}

/// Everything [`parse`] found in a stream.
#[derive(Debug, Clone)]
pub(crate) struct StreamIndex {
    pub header: Header,
    pub frames: Vec<RawFrame>,
    pub repeat: Repeat,
}

/// Graphic control extension waiting for its image.
#[derive(Debug, Clone, Copy)]
struct Control {
    properties: FrameProperties,
    transparent: Option<u8>,
}

struct Cursor<'a> {
    buf: &'a [u8],
}

impl<'a> Cursor<'a> {
    fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], DecodingError> {
        if self.buf.len() < n {
            return Err(io::ErrorKind::UnexpectedEof.into());
        }
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    fn u8(&mut self) -> Result<u8, DecodingError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, DecodingError> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    /// Feeds each data sub-block to `f` up to and including the terminator.
    fn sub_blocks(
        &mut self,
        mut f: impl FnMut(&'a [u8]) -> Result<(), DecodingError>,
    ) -> Result<(), DecodingError> {
        loop {
            let len = self.u8()?;
            if len == 0 {
                return Ok(());
            }
            f(self.take(usize::from(len))?)?;
        }
    }

    fn skip_sub_blocks(&mut self) -> Result<(), DecodingError> {
        self.sub_blocks(|_| Ok(()))
    }
}

/// Reads the header and indexes every frame of `bytes`.
///
/// Only a broken header is an error. When the block structure breaks later
/// on, the frames found up to that point are kept.
pub(crate) fn parse(bytes: &[u8], memory_limit: &MemoryLimit) -> Result<StreamIndex, DecodingError> {
    let mut cursor = Cursor { buf: bytes };
    let header = read_header(&mut cursor)?;
    let mut index = StreamIndex {
        header,
        frames: Vec::new(),
        repeat: Repeat::default(),
    };
    if let Err(err) = read_blocks(&mut cursor, &mut index, memory_limit) {
        warn!(
            "stopped reading GIF blocks after {} frames: {}",
            index.frames.len(),
            err
        );
    }
    debug!(
        "indexed {} frames, {}x{} screen, repeat {:?}",
        index.frames.len(),
        index.header.width,
        index.header.height,
        index.repeat
    );
    Ok(index)
}

fn read_header(cursor: &mut Cursor<'_>) -> Result<Header, DecodingError> {
    let magic = cursor
        .take(6)
        .map_err(|_| DecodingError::format("malformed GIF header"))?;
    if &magic[..3] != b"GIF" {
        return Err(DecodingError::format("malformed GIF header"));
    }
    let version = match &magic[3..] {
        b"87a" => Version::V87a,
        b"89a" => Version::V89a,
        _ => return Err(DecodingError::format("malformed GIF header")),
    };
    let width = cursor.u16()?;
    let height = cursor.u16()?;
    let global_flags = cursor.u8()?;
    let _background = cursor.u8()?;
    let _aspect_ratio = cursor.u8()?;
    let global_palette = if global_flags & 0x80 != 0 {
        let table_size = PLTE_CHANNELS * (1 << ((global_flags & 0b111) + 1));
        Some(cursor.take(table_size)?.to_vec())
    } else {
        None
    };
    Ok(Header {
        version,
        width,
        height,
        global_palette,
    })
}

fn read_blocks(
    cursor: &mut Cursor<'_>,
    index: &mut StreamIndex,
    memory_limit: &MemoryLimit,
) -> Result<(), DecodingError> {
    let mut control = None;
    loop {
        if cursor.is_empty() {
            debug!("GIF stream ends without trailer");
            return Ok(());
        }
        let label = cursor.u8()?;
        match Block::from_u8(label) {
            Some(Block::Trailer) => return Ok(()),
            Some(Block::Image) => {
                let frame = read_image(cursor, control.take(), memory_limit)?;
                index.frames.push(frame);
            }
            Some(Block::Extension) => {
                let ext = cursor.u8()?;
                match Extension::from_u8(ext) {
                    Some(Extension::Control) => control = Some(read_control_extension(cursor)?),
                    Some(Extension::Application) => {
                        if let Some(repeat) = read_application_extension(cursor)? {
                            index.repeat = repeat;
                        }
                    }
                    Some(Extension::Text | Extension::Comment) => cursor.skip_sub_blocks()?,
                    None => {
                        debug!("skipping unknown extension {:#04x}", ext);
                        cursor.skip_sub_blocks()?;
                    }
                }
            }
            None => return Err(DecodingError::format("unknown block type encountered")),
        }
    }
}

fn read_control_extension(cursor: &mut Cursor<'_>) -> Result<Control, DecodingError> {
    if cursor.u8()? != 4 {
        return Err(DecodingError::format("control extension has wrong length"));
    }
    let flags = cursor.u8()?;
    let delay = cursor.u16()?;
    let transparent_idx = cursor.u8()?;
    cursor.skip_sub_blocks()?;
    let properties = FrameProperties {
        delay: Some(clamp_ticks(delay)),
        unclamped_delay: Some(delay),
        dispose: DisposalMethod::from_u8((flags & 0b11100) >> 2).unwrap_or(DisposalMethod::Any),
        needs_user_input: flags & 0b10 != 0,
    };
    Ok(Control {
        properties,
        transparent: (flags & 1 != 0).then_some(transparent_idx),
    })
}

fn read_application_extension(cursor: &mut Cursor<'_>) -> Result<Option<Repeat>, DecodingError> {
    let mut app_name = None;
    let mut repeat = None;
    cursor.sub_blocks(|data| {
        match app_name {
            None => app_name = Some(data),
            Some(name) if name == EXT_NAME_NETSCAPE || name == EXT_NAME_ANIMEXTS => {
                if let [1, lo, hi] = *data {
                    repeat = Some(match u16::from_le_bytes([lo, hi]) {
                        0 => Repeat::Infinite,
                        n => Repeat::Finite(n),
                    });
                }
            }
            Some(_) => {}
        }
        Ok(())
    })?;
    Ok(repeat)
}

fn read_image(
    cursor: &mut Cursor<'_>,
    control: Option<Control>,
    memory_limit: &MemoryLimit,
) -> Result<RawFrame, DecodingError> {
    let left = cursor.u16()?;
    let top = cursor.u16()?;
    let width = cursor.u16()?;
    let height = cursor.u16()?;
    let flags = cursor.u8()?;
    let palette = if flags & 0b1000_0000 != 0 {
        let entries = PLTE_CHANNELS * (1 << ((flags & 0b111) + 1));
        Some(cursor.take(entries)?.to_vec())
    } else {
        None
    };
    let min_code_size = cursor.u8()?;
    let mut lzw_data = Vec::new();
    cursor.sub_blocks(|data| {
        memory_limit.try_reserve(&mut lzw_data, data.len())?;
        lzw_data.extend_from_slice(data);
        Ok(())
    })?;
    Ok(RawFrame {
        left,
        top,
        width,
        height,
        interlaced: flags & 0b0100_0000 != 0,
        palette,
        transparent: control.and_then(|c| c.transparent),
        properties: control.map(|c| c.properties),
        min_code_size,
        lzw_data,
    })
}

/// Decompresses the color indices of `frame` into `out`, in stream row order.
pub(crate) fn decode_indices(
    frame: &RawFrame,
    check_for_end_code: bool,
    out: &mut [u8],
) -> Result<(), DecodingError> {
    // LZW spec: max 12 bits per code. This also catches a stray pixel byte
    // where the code size should be.
    if frame.min_code_size > 11 || frame.min_code_size < 1 {
        return Err(DecodingError::format("invalid minimal code size"));
    }
    let mut lzw = LzwDecoder::new(BitOrder::Lsb, frame.min_code_size);
    let mut data = &frame.lzw_data[..];
    let mut filled = 0;
    // The decoder may stop early, e.g. at a clear code, so feed it until the
    // frame is complete or nothing moves anymore.
    while filled < out.len() {
        let result = lzw.decode_bytes(data, &mut out[filled..]);
        data = data.get(result.consumed_in..).unwrap_or_default();
        filled += result.consumed_out;
        match result.status {
            Ok(LzwStatus::Done | LzwStatus::NoProgress) => break,
            Ok(LzwStatus::Ok) => {
                if result.consumed_in == 0 && result.consumed_out == 0 {
                    break;
                }
            }
            Err(_) => return Err(DecodingError::format("invalid code in lzw stream")),
        }
    }
    if filled < out.len() {
        return Err(DecodingError::format("image truncated"));
    }
    if check_for_end_code && !lzw.has_ended() {
        // the end code may still be waiting behind the last pixel
        let mut excess = [0; 16];
        let tail = lzw.decode_bytes(data, &mut excess);
        if tail.status.is_err() || !lzw.has_ended() {
            return Err(DecodingError::format("no end code in lzw stream"));
        }
    }
    Ok(())
}
