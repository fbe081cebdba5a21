//! framegif records animated GIFs one frame at a time.
//!
//! Frames are pulled from a [`FrameSource`] on each tick of a [`Recorder`], quantized against a
//! palette fixed by the first frame, LZW-compressed and appended to a [`ByteSink`]. At most one
//! raw frame is held at a time; the output is written in a single sequential pass.
//!
//! - Median-cut palette: [`Palette::build`]
//! - Constant-time quantization: [`LookupTable`]
//! - Container output: [`GifWriter`]
//! - Session driver: [`Recorder`]
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod foundation;
mod quantize;

/// Recording sessions.
pub mod capture;
/// LZW, container writer, byte sinks.
pub mod encode;

pub use crate::foundation::core::{FrameRGBA, Fps, Rgb8, delay_hundredths};
pub use crate::foundation::error::{FramegifError, FramegifResult};

pub use crate::quantize::lookup::{LOOKUP_SIZE, LookupTable, bucket_color, bucket_key};
pub use crate::quantize::median_cut::{MAX_SAMPLES, Palette, sample_frame};

pub use crate::encode::gif::{GifWriter, color_table_bits};
pub use crate::encode::lzw::LzwEncoder;
pub use crate::encode::sink::{ByteSink, FileSink, FileSinkOpts, InMemorySink};

pub use crate::capture::config::RecordingConfig;
pub use crate::capture::recorder::{
    Completion, Recorder, RecorderState, RecordingOutcome, RecordingProgress, RecordingSummary,
    StopHandle, TickOutcome,
};
pub use crate::capture::source::{FrameSource, ImageSequenceSource, PatternSource};
