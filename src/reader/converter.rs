use std::iter;
use std::mem;

use crate::common::DisposalMethod;
use crate::reader::MemoryLimit;

use super::decoder::{decode_indices, DecodingError, RawFrame, PLTE_CHANNELS};

pub(crate) const N_CHANNELS: usize = 4;

/// Area of the canvas to clear before the next frame is painted.
#[derive(Debug, Clone, Copy)]
struct Rect {
    left: usize,
    top: usize,
    width: usize,
    height: usize,
}

/// Expands indexed frames to RGBA and paints them onto the canvas.
pub(crate) struct PixelConverter {
    memory_limit: MemoryLimit,
    check_for_end_code: bool,
    width: usize,
    height: usize,
    canvas: Vec<u8>,
    /// Stream-order color indices of the current frame.
    indices: Vec<u8>,
    /// Row-order color indices, used only for interlaced frames.
    deinterlaced: Vec<u8>,
    global_palette: Option<Vec<u8>>,
    dispose: Option<Rect>,
}

impl PixelConverter {
    pub(crate) fn new(
        width: u16,
        height: u16,
        global_palette: Option<Vec<u8>>,
        memory_limit: MemoryLimit,
        check_for_end_code: bool,
    ) -> Result<Self, DecodingError> {
        let canvas_bytes = memory_limit
            .buffer_size(width, height)
            .ok_or(DecodingError::MemoryLimit)?;
        let mut canvas = Vec::new();
        canvas
            .try_reserve_exact(canvas_bytes)
            .map_err(|_| DecodingError::OutOfMemory)?;
        canvas.resize(canvas_bytes, 0);
        Ok(Self {
            memory_limit,
            check_for_end_code,
            width: usize::from(width),
            height: usize::from(height),
            canvas,
            indices: Vec::new(),
            deinterlaced: Vec::new(),
            global_palette: global_palette.filter(|p| !p.is_empty()),
            dispose: None,
        })
    }

    pub(crate) fn global_palette(&self) -> Option<&[u8]> {
        self.global_palette.as_deref()
    }

    /// Clears the canvas to transparent black.
    pub(crate) fn reset(&mut self) {
        self.canvas.fill(0);
        self.dispose = None;
    }

    pub(crate) fn canvas(&self) -> &[u8] {
        &self.canvas
    }

    /// Decodes `frame` and paints it over the canvas.
    ///
    /// On error the canvas is left as the previous frame left it.
    pub(crate) fn compose(&mut self, frame: &RawFrame) -> Result<(), DecodingError> {
        if let Some(rect) = self.dispose.take() {
            self.clear(rect);
        }

        let palette = match frame.palette.as_deref().or(self.global_palette.as_deref()) {
            Some(palette) => palette,
            None => {
                return Err(DecodingError::format(
                    "no color table available for current frame",
                ))
            }
        };

        let pixels = usize::from(frame.width) * usize::from(frame.height);
        self.memory_limit.check_size(pixels)?;
        let mut indices = mem::take(&mut self.indices);
        indices.clear();
        indices
            .try_reserve(pixels)
            .map_err(|_| DecodingError::OutOfMemory)?;
        indices.resize(pixels, 0);
        let decoded = decode_indices(frame, self.check_for_end_code, &mut indices);
        if let Err(err) = decoded {
            self.indices = indices;
            return Err(err);
        }

        let rows = if frame.interlaced {
            deinterlace(&mut self.deinterlaced, frame, &indices);
            &self.deinterlaced
        } else {
            &indices
        };
        paint(
            &mut self.canvas,
            self.width,
            self.height,
            frame,
            rows,
            palette,
        );
        self.indices = indices;

        if frame.properties.map(|p| p.dispose) == Some(DisposalMethod::Background) {
            self.dispose = Some(Rect {
                left: usize::from(frame.left),
                top: usize::from(frame.top),
                width: usize::from(frame.width),
                height: usize::from(frame.height),
            });
        }
        Ok(())
    }

    fn clear(&mut self, rect: Rect) {
        let right = (rect.left + rect.width).min(self.width);
        let bottom = (rect.top + rect.height).min(self.height);
        if rect.left >= right {
            return;
        }
        for y in rect.top..bottom {
            let start = (y * self.width + rect.left) * N_CHANNELS;
            let end = (y * self.width + right) * N_CHANNELS;
            self.canvas[start..end].fill(0);
        }
    }
}

/// Reorders the rows of an interlaced frame into `out`.
fn deinterlace(out: &mut Vec<u8>, frame: &RawFrame, indices: &[u8]) {
    let width = usize::from(frame.width);
    out.clear();
    out.resize(indices.len(), 0);
    if width == 0 {
        return;
    }
    let rows = InterlaceIterator {
        len: frame.height,
        next: 0,
        pass: 0,
    };
    for (row, line) in rows.zip(indices.chunks_exact(width)) {
        let start = row * width;
        out[start..start + width].copy_from_slice(line);
    }
}

/// Writes the opaque pixels of `frame` into `canvas`, clipping at its border.
fn paint(
    canvas: &mut [u8],
    canvas_width: usize,
    canvas_height: usize,
    frame: &RawFrame,
    rows: &[u8],
    palette: &[u8],
) {
    let (left, top) = (usize::from(frame.left), usize::from(frame.top));
    let width = usize::from(frame.width);
    if width == 0 || left >= canvas_width {
        return;
    }
    let visible = width.min(canvas_width - left);
    for (y, line) in rows.chunks_exact(width).enumerate() {
        let y = top + y;
        if y >= canvas_height {
            break;
        }
        let start = (y * canvas_width + left) * N_CHANNELS;
        let target = &mut canvas[start..start + visible * N_CHANNELS];
        for (rgba, &idx) in target.chunks_exact_mut(N_CHANNELS).zip(&line[..visible]) {
            if frame.transparent == Some(idx) {
                continue;
            }
            let plte_offset = PLTE_CHANNELS * usize::from(idx);
            if let Some(colors) = palette.get(plte_offset..plte_offset + PLTE_CHANNELS) {
                rgba[..PLTE_CHANNELS].copy_from_slice(colors);
                rgba[3] = 0xFF;
            }
        }
    }
}

/// Yields the row each successive stream row of an interlaced image belongs to.
struct InterlaceIterator {
    len: u16,
    next: usize,
    pass: usize,
}

impl iter::Iterator for InterlaceIterator {
    type Item = usize;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        if self.len == 0 {
            return None;
        }
        // get()? ends the iteration once all four passes are done
        let mut next = self.next + *[8, 8, 4, 2].get(self.pass)?;
        while next >= usize::from(self.len) {
            next = *[4, 2, 1, 0].get(self.pass)?;
            self.pass += 1;
        }
        mem::swap(&mut next, &mut self.next);
        Some(next)
    }
}
