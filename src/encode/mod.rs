//! Encoding: LZW image data, the GIF container, and byte sinks.

/// GIF89a container writer.
pub mod gif;
/// GIF-flavoured LZW compression.
pub mod lzw;
/// Byte sink trait and built-in sinks.
pub mod sink;
