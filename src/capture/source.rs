use crate::foundation::core::FrameRGBA;
use crate::foundation::error::{FramegifError, FramegifResult};
use image::RgbaImage;
use image::imageops::{self, FilterType};
use std::path::{Path, PathBuf};

/// Producer of RGBA frames for a recording session.
///
/// The recorder asks for one frame per tick at the configured resolution scale. Sources may keep
/// working buffers between calls; the recorder calls [`FrameSource::release_cached_resources`]
/// once the session ends, whatever the outcome.
pub trait FrameSource: Send {
    /// Whether the source can currently supply frames.
    fn is_available(&self) -> bool;

    /// Produce the next frame, scaled by `scale` (`0.25..=1.0`).
    fn capture_frame(&mut self, scale: f32) -> FramegifResult<FrameRGBA>;

    /// Drop buffers kept between captures.
    fn release_cached_resources(&mut self) {}
}

/// Output size for a `width`x`height` source captured at `scale`.
///
/// Scales above 1 (or non-finite ones) are treated as 1; a side never shrinks below one pixel.
pub fn scaled_dimensions(width: u32, height: u32, scale: f32) -> (u32, u32) {
    let s = if scale.is_finite() && scale > 0.0 {
        scale.min(1.0)
    } else {
        1.0
    };
    let side = |v: u32| ((v as f32 * s).round() as u32).max(1);
    (side(width), side(height))
}

struct CachedFrame {
    index: usize,
    scale: f32,
    frame: FrameRGBA,
}

/// Plays a sequence of still images as frames.
///
/// Images are decoded with the `image` crate and downscaled with a triangle filter. A looping
/// single-image sequence keeps its decoded frame and decodes once.
pub struct ImageSequenceSource {
    paths: Vec<PathBuf>,
    cursor: usize,
    looping: bool,
    cached: Option<CachedFrame>,
}

impl ImageSequenceSource {
    /// Play `paths` in the given order.
    pub fn from_paths(paths: Vec<PathBuf>) -> FramegifResult<Self> {
        if paths.is_empty() {
            return Err(FramegifError::source("image sequence is empty"));
        }
        Ok(Self {
            paths,
            cursor: 0,
            looping: false,
            cached: None,
        })
    }

    /// Play every image file in `dir`, sorted by file name.
    pub fn from_dir(dir: &Path) -> FramegifResult<Self> {
        use anyhow::Context as _;
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir)
            .with_context(|| format!("failed to read frames directory '{}'", dir.display()))?
        {
            let path = entry
                .with_context(|| format!("failed to list '{}'", dir.display()))?
                .path();
            if path.is_file() && image::ImageFormat::from_path(&path).is_ok() {
                paths.push(path);
            }
        }
        paths.sort();
        if paths.is_empty() {
            return Err(FramegifError::source(format!(
                "no images found in '{}'",
                dir.display()
            )));
        }
        tracing::debug!(dir = %dir.display(), images = paths.len(), "image sequence loaded");
        Self::from_paths(paths)
    }

    /// Restart from the first image instead of running dry at the end.
    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    /// Number of images in the sequence.
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Always `false`; construction rejects empty sequences.
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    fn decode(&self, index: usize, scale: f32) -> FramegifResult<FrameRGBA> {
        let path = &self.paths[index];
        let img: RgbaImage = image::open(path)
            .map_err(|e| {
                FramegifError::source(format!("failed to decode '{}': {e}", path.display()))
            })?
            .to_rgba8();
        let (w, h) = scaled_dimensions(img.width(), img.height(), scale);
        let img = if (w, h) == img.dimensions() {
            img
        } else {
            imageops::resize(&img, w, h, FilterType::Triangle)
        };
        FrameRGBA::new(w, h, img.into_raw())
    }
}

impl FrameSource for ImageSequenceSource {
    fn is_available(&self) -> bool {
        self.looping || self.cursor < self.paths.len()
    }

    fn capture_frame(&mut self, scale: f32) -> FramegifResult<FrameRGBA> {
        if !self.is_available() {
            return Err(FramegifError::source("image sequence is exhausted"));
        }
        let index = self.cursor % self.paths.len();
        self.cursor += 1;

        if let Some(c) = &self.cached
            && c.index == index
            && c.scale == scale
        {
            return Ok(c.frame.clone());
        }
        let frame = self.decode(index, scale)?;
        // Only a looping single image ever hits the cache again.
        if self.looping && self.paths.len() == 1 {
            self.cached = Some(CachedFrame {
                index,
                scale,
                frame: frame.clone(),
            });
        }
        Ok(frame)
    }

    fn release_cached_resources(&mut self) {
        self.cached = None;
    }
}

/// Deterministic animated gradient, used by the demo command and tests.
#[derive(Clone, Debug)]
pub struct PatternSource {
    width: u32,
    height: u32,
    frame: u32,
    limit: Option<u32>,
}

impl PatternSource {
    /// A `width`x`height` pattern at scale 1.
    pub fn new(width: u32, height: u32) -> FramegifResult<Self> {
        if width == 0 || height == 0 {
            return Err(FramegifError::validation(
                "pattern width/height must be non-zero",
            ));
        }
        Ok(Self {
            width,
            height,
            frame: 0,
            limit: None,
        })
    }

    /// Become unavailable after `frames` captures.
    pub fn with_frame_limit(mut self, frames: u32) -> Self {
        self.limit = Some(frames);
        self
    }

    /// Frames produced so far.
    pub fn frames_produced(&self) -> u32 {
        self.frame
    }
}

impl FrameSource for PatternSource {
    fn is_available(&self) -> bool {
        self.limit.is_none_or(|n| self.frame < n)
    }

    fn capture_frame(&mut self, scale: f32) -> FramegifResult<FrameRGBA> {
        if !self.is_available() {
            return Err(FramegifError::source("pattern source frame limit reached"));
        }
        let (w, h) = scaled_dimensions(self.width, self.height, scale);
        let phase = self.frame.wrapping_mul(9);
        self.frame += 1;

        let mut data = Vec::with_capacity(w as usize * h as usize * 4);
        for y in 0..h {
            let g = (y * 255 / (h - 1).max(1)) as u8;
            for x in 0..w {
                let r = ((x * 256 / w + phase) % 256) as u8;
                let b = ((x + y + phase) % 64 * 4) as u8;
                data.extend_from_slice(&[r, g, b, 255]);
            }
        }
        FrameRGBA::new(w, h, data)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/capture/source.rs"]
mod tests;
