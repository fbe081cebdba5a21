/// Convenience result type used across framegif.
pub type FramegifResult<T> = Result<T, FramegifError>;

/// Top-level error taxonomy used by recorder and encoder APIs.
#[derive(thiserror::Error, Debug)]
pub enum FramegifError {
    /// Invalid user-provided configuration or input data.
    #[error("validation error: {0}")]
    Validation(String),

    /// An operation was invoked in a state that does not allow it.
    #[error("precondition error: {0}")]
    Precondition(String),

    /// The frame source is unavailable or failed to produce a frame.
    #[error("frame source error: {0}")]
    Source(String),

    /// Writing to or flushing the byte sink failed.
    #[error("sink error: {0}")]
    Sink(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl FramegifError {
    /// Build a [`FramegifError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`FramegifError::Precondition`] value.
    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::Precondition(msg.into())
    }

    /// Build a [`FramegifError::Source`] value.
    pub fn source(msg: impl Into<String>) -> Self {
        Self::Source(msg.into())
    }

    /// Build a [`FramegifError::Sink`] value.
    pub fn sink(msg: impl Into<String>) -> Self {
        Self::Sink(msg.into())
    }

    /// Wrap an IO failure on the byte sink with a short description of what was being written.
    pub(crate) fn sink_io(what: &str, err: std::io::Error) -> Self {
        Self::Sink(format!("failed to write {what}: {err}"))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
