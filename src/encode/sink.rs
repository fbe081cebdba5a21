use crate::foundation::error::{FramegifError, FramegifResult};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

/// Sequential, append-only destination for encoded bytes.
///
/// The container writer only ever appends; sinks never need to support seeking.
pub trait ByteSink: Write + Send {
    /// Human-readable identity of the output (a path, or a label for in-memory sinks).
    fn describe(&self) -> String;

    /// Total bytes accepted so far.
    fn bytes_written(&self) -> u64;

    /// Drop partially written output after an aborted recording.
    fn discard(&mut self) -> FramegifResult<()>;
}

/// Options for [`FileSink`].
#[derive(Clone, Debug)]
pub struct FileSinkOpts {
    /// Output file path.
    pub out_path: PathBuf,
    /// Overwrite output file if it already exists.
    pub overwrite: bool,
}

impl FileSinkOpts {
    /// Create options for writing to `out_path`, overwriting existing files.
    pub fn new(out_path: impl Into<PathBuf>) -> Self {
        Self {
            out_path: out_path.into(),
            overwrite: true,
        }
    }
}

/// Buffered file output; `discard` closes and deletes the file.
pub struct FileSink {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    written: u64,
}

impl FileSink {
    /// Create (or truncate) the output file, creating its parent directory first.
    pub fn create(opts: FileSinkOpts) -> FramegifResult<Self> {
        ensure_parent_dir(&opts.out_path)?;
        if !opts.overwrite && opts.out_path.exists() {
            return Err(FramegifError::validation(format!(
                "output file '{}' already exists",
                opts.out_path.display()
            )));
        }

        use anyhow::Context as _;
        let file = File::create(&opts.out_path)
            .with_context(|| format!("failed to create '{}'", opts.out_path.display()))?;
        Ok(Self {
            path: opts.out_path,
            writer: Some(BufWriter::new(file)),
            written: 0,
        })
    }

    /// Output file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Write for FileSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let Some(w) = self.writer.as_mut() else {
            return Err(io::Error::other("file sink was discarded"));
        };
        let n = w.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.writer.as_mut() {
            Some(w) => w.flush(),
            None => Ok(()),
        }
    }
}

impl ByteSink for FileSink {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn bytes_written(&self) -> u64 {
        self.written
    }

    fn discard(&mut self) -> FramegifResult<()> {
        // Buffered bytes are dropped unflushed; the file is removed right after.
        if let Some(w) = self.writer.take() {
            let (_file, _unflushed) = w.into_parts();
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(FramegifError::sink(format!(
                "failed to delete partial output '{}': {e}",
                self.path.display()
            ))),
        }
    }
}

/// In-memory sink for tests and embedding. Clones share one buffer.
#[derive(Clone, Debug, Default)]
pub struct InMemorySink {
    buf: Arc<Mutex<Vec<u8>>>,
    label: Option<String>,
}

impl InMemorySink {
    /// Create a new in-memory sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a sink reported under `label` in recording summaries.
    pub fn labeled(label: impl Into<String>) -> Self {
        Self {
            buf: Arc::default(),
            label: Some(label.into()),
        }
    }

    /// Copy out the bytes written so far.
    pub fn bytes(&self) -> Vec<u8> {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<u8>> {
        // A poisoned buffer still holds valid bytes.
        self.buf.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Write for InMemorySink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl ByteSink for InMemorySink {
    fn describe(&self) -> String {
        self.label.clone().unwrap_or_else(|| "<memory>".to_string())
    }

    fn bytes_written(&self) -> u64 {
        self.lock().len() as u64
    }

    fn discard(&mut self) -> FramegifResult<()> {
        self.lock().clear();
        Ok(())
    }
}

/// Ensure the parent directory of `path` exists.
pub fn ensure_parent_dir(path: &Path) -> FramegifResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        use anyhow::Context as _;
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/encode/sink.rs"]
mod tests;
