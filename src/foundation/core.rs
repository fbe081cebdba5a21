use crate::foundation::error::{FramegifError, FramegifResult};
use std::time::Duration;

/// Frames-per-second represented as a rational `num/den`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Fps {
    /// Numerator (frames).
    pub num: u32,
    /// Denominator (seconds), must be non-zero.
    pub den: u32,
}

impl Fps {
    /// Create a validated FPS value.
    pub fn new(num: u32, den: u32) -> FramegifResult<Self> {
        if den == 0 {
            return Err(FramegifError::validation("Fps den must be > 0"));
        }
        if num == 0 {
            return Err(FramegifError::validation("Fps num must be > 0"));
        }
        Ok(Self { num, den })
    }

    /// Whole frames per second.
    pub fn whole(fps: u32) -> FramegifResult<Self> {
        Self::new(fps, 1)
    }

    /// Convert to floating-point FPS.
    pub fn as_f64(self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }

    /// Duration of one frame in seconds.
    pub fn frame_duration_secs(self) -> f64 {
        f64::from(self.den) / f64::from(self.num)
    }

    /// Target capture interval (`1 / fps`).
    pub fn frame_interval(self) -> Duration {
        Duration::from_secs(u64::from(self.den)) / self.num
    }
}

/// Convert a wall-clock interval into a GIF frame delay in hundredths of a second.
///
/// Rounds to the nearest hundredth and clamps into `1..=u16::MAX`; a zero delay is never produced.
pub fn delay_hundredths(elapsed: Duration) -> u16 {
    let cs = (elapsed.as_secs_f64() * 100.0).round();
    cs.clamp(1.0, f64::from(u16::MAX)) as u16
}

/// An opaque 8-bit RGB color.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Rgb8 {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
}

impl Rgb8 {
    /// Build a color from its channels.
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Black, used to pad color tables.
    pub const fn black() -> Self {
        Self::new(0, 0, 0)
    }

    /// Channel by index (`0 = r`, `1 = g`, `2 = b`).
    pub(crate) fn channel(self, c: usize) -> u8 {
        match c {
            0 => self.r,
            1 => self.g,
            _ => self.b,
        }
    }

    /// Squared Euclidean distance in RGB space.
    pub fn distance_sq(self, other: Rgb8) -> u32 {
        let dr = i32::from(self.r) - i32::from(other.r);
        let dg = i32::from(self.g) - i32::from(other.g);
        let db = i32::from(self.b) - i32::from(other.b);
        (dr * dr + dg * dg + db * db) as u32
    }
}

/// A captured frame as straight-alpha RGBA8 pixels.
///
/// Alpha is ignored by the encoder; GIF output is fully opaque.
#[derive(Clone, Debug)]
pub struct FrameRGBA {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// RGBA8 bytes, tightly packed, row-major.
    pub data: Vec<u8>,
}

impl FrameRGBA {
    /// Wrap an RGBA8 buffer, checking that its length matches `width * height * 4`.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> FramegifResult<Self> {
        if width == 0 || height == 0 {
            return Err(FramegifError::validation(
                "frame width/height must be non-zero",
            ));
        }
        let expected = (width as usize)
            .saturating_mul(height as usize)
            .saturating_mul(4);
        if data.len() != expected {
            return Err(FramegifError::validation(format!(
                "frame data is {} bytes, expected {expected} for {width}x{height} rgba8",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// A frame filled with a single opaque color.
    pub fn solid(width: u32, height: u32, color: Rgb8) -> Self {
        let px = (width as usize) * (height as usize);
        let mut data = Vec::with_capacity(px * 4);
        for _ in 0..px {
            data.extend_from_slice(&[color.r, color.g, color.b, 255]);
        }
        Self {
            width,
            height,
            data,
        }
    }

    /// `(width, height)`.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Number of pixels.
    pub fn pixel_count(&self) -> usize {
        self.data.len() / 4
    }

    /// Iterate pixels as opaque RGB, dropping alpha.
    pub fn rgb_pixels(&self) -> impl Iterator<Item = Rgb8> + '_ {
        self.data
            .chunks_exact(4)
            .map(|px| Rgb8::new(px[0], px[1], px[2]))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
