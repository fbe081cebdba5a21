//! Dense 15-bit RGB → palette index table.
//!
//! Built once per palette by exhaustive nearest-color search over every 5-bit-per-channel bucket.
//! Per-pixel quantization is then a single indexed load.

use crate::foundation::core::{FrameRGBA, Rgb8};
use crate::quantize::median_cut::Palette;

/// Bits kept per channel when addressing the table.
pub const LOOKUP_CHANNEL_BITS: u32 = 5;

/// Number of table entries (`32 * 32 * 32`).
pub const LOOKUP_SIZE: usize = 1 << (3 * LOOKUP_CHANNEL_BITS);

/// Nearest-palette-index cache for every coarse RGB bucket.
#[derive(Clone)]
pub struct LookupTable {
    entries: Box<[u8]>,
    palette_len: usize,
}

impl std::fmt::Debug for LookupTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LookupTable")
            .field("entries", &self.entries.len())
            .field("palette_len", &self.palette_len)
            .finish()
    }
}

impl LookupTable {
    /// Precompute the nearest palette index for all [`LOOKUP_SIZE`] buckets.
    #[tracing::instrument(skip(palette), fields(palette_len = palette.len()))]
    pub fn build(palette: &Palette) -> Self {
        let entries: Box<[u8]> = (0..LOOKUP_SIZE)
            .map(|key| palette.nearest_index(bucket_color(key)))
            .collect();
        Self {
            entries,
            palette_len: palette.len(),
        }
    }

    /// Palette index for `color`, addressed by its top five bits per channel.
    #[inline]
    pub fn quantize(&self, color: Rgb8) -> u8 {
        self.entries[bucket_key(color)]
    }

    /// Quantize every pixel of `frame` into `out`, reusing its allocation.
    pub fn quantize_frame(&self, frame: &FrameRGBA, out: &mut Vec<u8>) {
        out.clear();
        out.reserve(frame.pixel_count());
        out.extend(frame.rgb_pixels().map(|c| self.entries[bucket_key(c)]));
    }

    /// Size of the palette this table was built from.
    pub fn palette_len(&self) -> usize {
        self.palette_len
    }

    /// Raw table entries, indexed by bucket key.
    pub fn entries(&self) -> &[u8] {
        &self.entries
    }
}

/// Bucket key for `color`: `rrrrrgggggbbbbb`.
#[inline]
pub fn bucket_key(color: Rgb8) -> usize {
    (usize::from(color.r >> 3) << 10) | (usize::from(color.g >> 3) << 5) | usize::from(color.b >> 3)
}

/// Representative 8-bit color of a bucket (top five bits replicated into the low three).
pub fn bucket_color(key: usize) -> Rgb8 {
    let expand = |v: usize| {
        let v = (v & 0x1f) as u8;
        (v << 3) | (v >> 2)
    };
    Rgb8::new(expand(key >> 10), expand(key >> 5), expand(key))
}

#[cfg(test)]
#[path = "../../tests/unit/quantize/lookup.rs"]
mod tests;
