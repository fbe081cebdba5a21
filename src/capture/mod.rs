//! Recording sessions: configuration, frame sources, and the tick-driven recorder.

/// Session settings and their bounds.
pub mod config;
/// Recorder state machine.
pub mod recorder;
/// Frame source trait and built-in sources.
pub mod source;
