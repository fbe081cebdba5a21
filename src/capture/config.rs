use crate::foundation::core::Fps;
use crate::foundation::error::{FramegifError, FramegifResult};
use std::ops::RangeInclusive;
use std::path::Path;

/// Allowed number of frames per recording.
pub const FRAME_COUNT_RANGE: RangeInclusive<u32> = 1..=200;
/// Allowed capture rates (whole frames per second).
pub const FPS_RANGE: RangeInclusive<u32> = 10..=30;
/// Allowed capture resolution scales.
pub const SCALE_RANGE: RangeInclusive<f32> = 0.25..=1.0;
/// Allowed palette sizes.
pub const COLORS_RANGE: RangeInclusive<u16> = 2..=256;

/// Recording session settings.
///
/// Missing JSON fields fall back to [`RecordingConfig::default`].
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RecordingConfig {
    /// Frames to capture before the session completes.
    pub frame_count: u32,
    /// Target capture rate.
    pub fps: u32,
    /// Resolution scale requested from the frame source.
    pub scale: f32,
    /// Maximum palette size.
    pub colors: u16,
    /// Playback loop count written to the file (`0` = loop forever).
    pub loop_count: u16,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            frame_count: 60,
            fps: 15,
            scale: 1.0,
            colors: 256,
            loop_count: 0,
        }
    }
}

impl RecordingConfig {
    /// Load a JSON config file; absent fields keep their defaults.
    pub fn from_json_path(path: &Path) -> FramegifResult<Self> {
        use anyhow::Context as _;
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config '{}'", path.display()))?;
        let cfg: Self = serde_json::from_str(&text).map_err(|e| {
            FramegifError::validation(format!("invalid config '{}': {e}", path.display()))
        })?;
        Ok(cfg)
    }

    /// Check every field against its allowed range.
    pub fn validate(&self) -> FramegifResult<()> {
        if !FRAME_COUNT_RANGE.contains(&self.frame_count) {
            return Err(FramegifError::validation(format!(
                "frame_count must be within {FRAME_COUNT_RANGE:?}, got {}",
                self.frame_count
            )));
        }
        if !FPS_RANGE.contains(&self.fps) {
            return Err(FramegifError::validation(format!(
                "fps must be within {FPS_RANGE:?}, got {}",
                self.fps
            )));
        }
        if !SCALE_RANGE.contains(&self.scale) {
            return Err(FramegifError::validation(format!(
                "scale must be within {SCALE_RANGE:?}, got {}",
                self.scale
            )));
        }
        if !COLORS_RANGE.contains(&self.colors) {
            return Err(FramegifError::validation(format!(
                "colors must be within {COLORS_RANGE:?}, got {}",
                self.colors
            )));
        }
        Ok(())
    }

    /// Capture rate as [`Fps`].
    pub fn rate(&self) -> FramegifResult<Fps> {
        Fps::whole(self.fps)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/capture/config.rs"]
mod tests;
