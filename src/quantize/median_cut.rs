//! Median-cut palette construction.
//!
//! Sampled colors start in one box. The box with the widest single-channel range is sorted along
//! that channel and cut at its midpoint index, until the requested number of boxes exists or no box
//! spans more than one color. Each final box contributes the rounded mean of its members.

use crate::foundation::core::{FrameRGBA, Rgb8};
use crate::foundation::error::{FramegifError, FramegifResult};

/// Upper bound on colors sampled from a reference frame, independent of its resolution.
pub const MAX_SAMPLES: usize = 20_000;

/// Largest palette the container format can index.
pub const MAX_PALETTE_COLORS: usize = 256;

/// An ordered color palette of `1..=256` entries, fixed for a recording session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Palette {
    colors: Vec<Rgb8>,
}

impl Palette {
    /// Creates a palette directly from a list of colors.
    pub fn from_colors(colors: Vec<Rgb8>) -> FramegifResult<Self> {
        if colors.is_empty() || colors.len() > MAX_PALETTE_COLORS {
            return Err(FramegifError::validation(format!(
                "palette must have 1..={MAX_PALETTE_COLORS} colors, got {}",
                colors.len()
            )));
        }
        Ok(Self { colors })
    }

    /// Build a palette of at most `max_colors` entries from sampled colors (median cut).
    ///
    /// The result is shorter than `max_colors` when the samples hold fewer distinct colors.
    #[tracing::instrument(skip(samples), fields(samples = samples.len()))]
    pub fn build(samples: &[Rgb8], max_colors: usize) -> FramegifResult<Self> {
        if samples.is_empty() {
            return Err(FramegifError::validation(
                "cannot build a palette from an empty sample set",
            ));
        }
        if !(2..=MAX_PALETTE_COLORS).contains(&max_colors) {
            return Err(FramegifError::validation(format!(
                "max_colors must be within 2..={MAX_PALETTE_COLORS}, got {max_colors}"
            )));
        }

        let colors = median_cut(samples.to_vec(), max_colors);
        tracing::debug!(colors = colors.len(), "built median-cut palette");
        Ok(Self { colors })
    }

    /// Sample `frame` (see [`sample_frame`]) and build a palette from it.
    pub fn from_frame(frame: &FrameRGBA, max_colors: usize) -> FramegifResult<Self> {
        Self::build(&sample_frame(frame, MAX_SAMPLES), max_colors)
    }

    /// Number of colors in the palette.
    #[inline]
    pub fn len(&self) -> usize {
        self.colors.len()
    }

    /// Always `false`; palettes hold at least one color.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// Borrow the palette colors in index order.
    pub fn colors(&self) -> &[Rgb8] {
        &self.colors
    }

    /// Color at `index`, if present.
    pub fn get(&self, index: u8) -> Option<Rgb8> {
        self.colors.get(usize::from(index)).copied()
    }

    /// Exhaustive nearest-color search (squared Euclidean, first minimum wins).
    ///
    /// This is the build-time path; per-pixel quantization goes through
    /// [`crate::LookupTable`].
    pub fn nearest_index(&self, color: Rgb8) -> u8 {
        let mut best = 0usize;
        let mut best_d = u32::MAX;
        for (i, &c) in self.colors.iter().enumerate() {
            let d = c.distance_sq(color);
            if d < best_d {
                best_d = d;
                best = i;
                if d == 0 {
                    break;
                }
            }
        }
        best as u8
    }
}

/// Subsample a frame's pixels with a fixed stride so at most `max_samples` colors are taken.
pub fn sample_frame(frame: &FrameRGBA, max_samples: usize) -> Vec<Rgb8> {
    let px = frame.pixel_count();
    let stride = px.div_ceil(max_samples.max(1)).max(1);
    frame.rgb_pixels().step_by(stride).collect()
}

struct ColorBox {
    colors: Vec<Rgb8>,
    lo: [u8; 3],
    hi: [u8; 3],
}

impl ColorBox {
    fn new(colors: Vec<Rgb8>) -> Self {
        let mut lo = [u8::MAX; 3];
        let mut hi = [u8::MIN; 3];
        for c in &colors {
            for ch in 0..3 {
                let v = c.channel(ch);
                lo[ch] = lo[ch].min(v);
                hi[ch] = hi[ch].max(v);
            }
        }
        Self { colors, lo, hi }
    }

    /// Widest channel and its range; ties resolve to R, then G, then B.
    fn widest_channel(&self) -> (usize, u8) {
        let mut best = (0, 0);
        for ch in 0..3 {
            let range = self.hi[ch].saturating_sub(self.lo[ch]);
            if range > best.1 {
                best = (ch, range);
            }
        }
        best
    }

    fn split(mut self) -> (ColorBox, ColorBox) {
        let (ch, _) = self.widest_channel();
        self.colors.sort_by_key(|c| c.channel(ch));
        let upper = self.colors.split_off(self.colors.len() / 2);
        (ColorBox::new(self.colors), ColorBox::new(upper))
    }

    fn mean(&self) -> Rgb8 {
        let n = self.colors.len() as u64;
        let mut sum = [0u64; 3];
        for c in &self.colors {
            sum[0] += u64::from(c.r);
            sum[1] += u64::from(c.g);
            sum[2] += u64::from(c.b);
        }
        let avg = |s: u64| ((s + n / 2) / n) as u8;
        Rgb8::new(avg(sum[0]), avg(sum[1]), avg(sum[2]))
    }
}

fn median_cut(samples: Vec<Rgb8>, max_colors: usize) -> Vec<Rgb8> {
    let mut boxes = vec![ColorBox::new(samples)];

    while boxes.len() < max_colors {
        let mut pick: Option<(usize, u8)> = None;
        for (i, b) in boxes.iter().enumerate() {
            if b.colors.len() <= 1 {
                continue;
            }
            let (_, range) = b.widest_channel();
            if range > 0 && pick.is_none_or(|(_, r)| range > r) {
                pick = Some((i, range));
            }
        }

        let Some((i, _)) = pick else {
            break;
        };
        // Halves replace the parent in place so box order (and the first-wins tie-break) is stable.
        let (lower, upper) = boxes.remove(i).split();
        boxes.insert(i, upper);
        boxes.insert(i, lower);
    }

    boxes.iter().map(ColorBox::mean).collect()
}

#[cfg(test)]
#[path = "../../tests/unit/quantize/median_cut.rs"]
mod tests;
