//! Single-pass GIF89a container writer.
//!
//! Layout: signature, logical screen descriptor, global color table, NETSCAPE2.0 looping
//! extension, then per frame a graphic control extension, an image descriptor and LZW data in
//! length-prefixed sub-blocks, and finally the trailer byte. Everything is appended in order; the
//! writer never seeks.

use crate::encode::lzw::{LzwEncoder, MIN_CODE_SIZE_FLOOR};
use crate::foundation::error::{FramegifError, FramegifResult};
use crate::quantize::median_cut::Palette;
use std::io::Write;

/// Format signature and version.
pub const SIGNATURE: &[u8; 6] = b"GIF89a";

const EXTENSION_INTRODUCER: u8 = 0x21;
const GRAPHIC_CONTROL_LABEL: u8 = 0xF9;
const APPLICATION_LABEL: u8 = 0xFF;
const IMAGE_SEPARATOR: u8 = 0x2C;
const TRAILER: u8 = 0x3B;
const MAX_SUB_BLOCK: usize = 255;

// Global color table present, 8-bit color resolution.
const GCT_FLAG: u8 = 0x80;
const COLOR_RESOLUTION: u8 = 0x70;

// Disposal method 1: leave the frame in place. Every frame covers the full canvas.
const DISPOSAL_KEEP: u8 = 1 << 2;

/// Log2 of the global color table size for a palette of `palette_len` colors.
///
/// The table is the next power of two at or above the palette size, with at least four entries
/// (the flags byte encodes `bits - 1`, kept within `1..=7`).
pub fn color_table_bits(palette_len: usize) -> u8 {
    let mut bits = 0u8;
    while (1usize << bits) < palette_len && bits < 8 {
        bits += 1;
    }
    bits.clamp(MIN_CODE_SIZE_FLOOR, 8)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum WriterState {
    Fresh,
    Open {
        width: u16,
        height: u16,
        table_len: usize,
    },
    Finished,
}

/// Incremental GIF writer over any sequential [`Write`] sink.
pub struct GifWriter<W: Write> {
    sink: W,
    state: WriterState,
    loop_count: u16,
    lzw: Option<LzwEncoder>,
    lzw_buf: Vec<u8>,
    block_buf: Vec<u8>,
    frames: u32,
}

impl<W: Write> GifWriter<W> {
    /// Wrap `sink`. Nothing is written until [`GifWriter::initialize`].
    pub fn new(sink: W) -> Self {
        Self {
            sink,
            state: WriterState::Fresh,
            loop_count: 0,
            lzw: None,
            lzw_buf: Vec::new(),
            block_buf: Vec::new(),
            frames: 0,
        }
    }

    /// Loop count for the looping extension (`0` = loop forever, the default).
    pub fn with_loop_count(mut self, loop_count: u16) -> Self {
        self.loop_count = loop_count;
        self
    }

    /// Write the header, the global color table and the looping extension.
    pub fn initialize(&mut self, width: u32, height: u32, palette: &Palette) -> FramegifResult<()> {
        if self.state != WriterState::Fresh {
            return Err(FramegifError::precondition(
                "gif writer is already initialized",
            ));
        }
        let (w, h) = match (u16::try_from(width), u16::try_from(height)) {
            (Ok(w), Ok(h)) if w > 0 && h > 0 => (w, h),
            _ => {
                return Err(FramegifError::validation(format!(
                    "gif canvas must be within 1..=65535 in both dimensions, got {width}x{height}"
                )));
            }
        };

        let bits = color_table_bits(palette.len());
        let table_len = 1usize << bits;

        let mut head = Vec::with_capacity(13 + table_len * 3 + 19);
        head.extend_from_slice(SIGNATURE);
        head.extend_from_slice(&w.to_le_bytes());
        head.extend_from_slice(&h.to_le_bytes());
        head.push(GCT_FLAG | COLOR_RESOLUTION | (bits - 1));
        // Background color index, pixel aspect ratio.
        head.extend_from_slice(&[0, 0]);

        for c in palette.colors() {
            head.extend_from_slice(&[c.r, c.g, c.b]);
        }
        head.resize(head.len() + (table_len - palette.len()) * 3, 0);

        head.extend_from_slice(&[EXTENSION_INTRODUCER, APPLICATION_LABEL, 0x0B]);
        head.extend_from_slice(b"NETSCAPE2.0");
        head.extend_from_slice(&[0x03, 0x01]);
        head.extend_from_slice(&self.loop_count.to_le_bytes());
        head.push(0x00);

        self.sink
            .write_all(&head)
            .map_err(|e| FramegifError::sink_io("gif header", e))?;

        self.lzw = Some(LzwEncoder::new(bits)?);
        self.state = WriterState::Open {
            width: w,
            height: h,
            table_len,
        };
        tracing::debug!(width, height, palette = palette.len(), table_len, "gif header written");
        Ok(())
    }

    /// Append one full-canvas frame of palette indices shown for `delay_cs` hundredths of a second.
    ///
    /// Delays below one hundredth are written as one.
    pub fn write_frame(&mut self, indices: &[u8], delay_cs: u16) -> FramegifResult<()> {
        let WriterState::Open {
            width,
            height,
            table_len,
        } = self.state
        else {
            return Err(FramegifError::precondition(match self.state {
                WriterState::Fresh => "write_frame called before initialize",
                _ => "write_frame called after finish",
            }));
        };
        let expected = usize::from(width) * usize::from(height);
        if indices.len() != expected {
            return Err(FramegifError::validation(format!(
                "frame has {} indices, expected {expected} for {width}x{height}",
                indices.len()
            )));
        }
        if let Some(&bad) = indices.iter().find(|&&i| usize::from(i) >= table_len) {
            return Err(FramegifError::validation(format!(
                "palette index {bad} exceeds color table of {table_len}"
            )));
        }

        let lzw = self
            .lzw
            .as_mut()
            .ok_or_else(|| FramegifError::precondition("gif writer has no lzw state"))?;
        self.lzw_buf.clear();
        lzw.encode_into(indices, &mut self.lzw_buf)?;

        let delay = delay_cs.max(1).to_le_bytes();
        let buf = &mut self.block_buf;
        buf.clear();
        buf.extend_from_slice(&[
            EXTENSION_INTRODUCER,
            GRAPHIC_CONTROL_LABEL,
            0x04,
            DISPOSAL_KEEP,
            delay[0],
            delay[1],
            0x00,
            0x00,
        ]);

        buf.push(IMAGE_SEPARATOR);
        buf.extend_from_slice(&[0, 0, 0, 0]);
        buf.extend_from_slice(&width.to_le_bytes());
        buf.extend_from_slice(&height.to_le_bytes());
        // No local color table, not interlaced.
        buf.push(0x00);

        buf.push(lzw.min_code_size());
        for chunk in self.lzw_buf.chunks(MAX_SUB_BLOCK) {
            buf.push(chunk.len() as u8);
            buf.extend_from_slice(chunk);
        }
        buf.push(0x00);

        self.sink
            .write_all(buf)
            .map_err(|e| FramegifError::sink_io("gif frame", e))?;
        self.frames += 1;
        tracing::trace!(
            frame = self.frames,
            delay_cs,
            lzw_bytes = self.lzw_buf.len(),
            "gif frame written"
        );
        Ok(())
    }

    /// Write the trailer and flush the sink.
    pub fn finish(&mut self) -> FramegifResult<()> {
        if !matches!(self.state, WriterState::Open { .. }) {
            return Err(FramegifError::precondition(
                "finish requires an initialized, unfinished gif writer",
            ));
        }
        self.sink
            .write_all(&[TRAILER])
            .map_err(|e| FramegifError::sink_io("gif trailer", e))?;
        self.sink
            .flush()
            .map_err(|e| FramegifError::sink_io("buffered gif data", e))?;
        self.state = WriterState::Finished;
        self.lzw = None;
        self.lzw_buf = Vec::new();
        self.block_buf = Vec::new();
        Ok(())
    }

    /// Whether the header has been written.
    pub fn is_initialized(&self) -> bool {
        self.state != WriterState::Fresh
    }

    /// Whether the trailer has been written.
    pub fn is_finished(&self) -> bool {
        self.state == WriterState::Finished
    }

    /// Frames appended so far.
    pub fn frames_written(&self) -> u32 {
        self.frames
    }

    /// Borrow the underlying sink.
    pub fn get_ref(&self) -> &W {
        &self.sink
    }

    /// Mutably borrow the underlying sink.
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.sink
    }

    /// Unwrap the underlying sink.
    pub fn into_inner(self) -> W {
        self.sink
    }
}

#[cfg(test)]
#[path = "../../tests/unit/encode/gif.rs"]
mod tests;
