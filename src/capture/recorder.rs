//! Tick-driven recording sessions.
//!
//! A [`Recorder`] runs at most one session. Each call to [`Recorder::tick`] either does nothing
//! (the capture interval has not elapsed) or captures, quantizes and appends exactly one frame.
//! The palette and lookup table are built from the first frame and stay fixed for the session.
//! The outcome is delivered once through the [`Completion`] returned by [`Recorder::start`].

use crate::capture::config::RecordingConfig;
use crate::capture::source::FrameSource;
use crate::encode::gif::GifWriter;
use crate::encode::sink::ByteSink;
use crate::foundation::core::{FrameRGBA, delay_hundredths};
use crate::foundation::error::{FramegifError, FramegifResult};
use crate::quantize::lookup::LookupTable;
use crate::quantize::median_cut::Palette;
use std::cell::Cell;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::time::{Duration, Instant};

/// Session lifecycle state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecorderState {
    /// No session.
    Idle,
    /// Started; the first frame (which fixes size and palette) is pending.
    ArmedWaitingFirstFrame,
    /// At least one frame has been written.
    Recording,
    /// Writing the trailer after completion or a stop request.
    Finalizing,
    /// Discarding output after a source or sink failure.
    Aborting,
}

/// What a single tick did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// No session is active.
    Inactive,
    /// The capture interval has not elapsed yet.
    TooEarly,
    /// A frame was captured and appended.
    FrameWritten,
    /// A frame was captured but its size differed from the session size.
    FrameSkipped,
    /// The session reached a terminal state during this tick.
    Finished,
}

/// Snapshot of session progress.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecordingProgress {
    /// Frames obtained from the source, including skipped ones.
    pub captured: u32,
    /// Frames appended to the output.
    pub written: u32,
    /// Frames dropped for not matching the session size.
    pub skipped: u32,
    /// Target frame count.
    pub target: u32,
}

/// Result of a successfully finalized session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordingSummary {
    /// Frames in the output file.
    pub frames_written: u32,
    /// Frames dropped for size drift.
    pub frames_skipped: u32,
    /// Output identity as reported by the sink.
    pub output: String,
    /// Wall-clock time from start to finalization.
    pub duration: Duration,
    /// Size of the finished output.
    pub byte_size: u64,
    /// Whether a stop request ended the session before the target count.
    pub stopped_early: bool,
}

/// Terminal outcome of a session.
pub type RecordingOutcome = FramegifResult<RecordingSummary>;

/// One-shot completion event for a session.
#[derive(Debug)]
pub struct Completion {
    rx: mpsc::Receiver<RecordingOutcome>,
    taken: Cell<bool>,
}

impl Completion {
    fn new(rx: mpsc::Receiver<RecordingOutcome>) -> Self {
        Self {
            rx,
            taken: Cell::new(false),
        }
    }

    /// The outcome, if the session has ended and it was not taken yet.
    pub fn try_recv(&self) -> Option<RecordingOutcome> {
        if self.taken.get() {
            return None;
        }
        let outcome = match self.rx.try_recv() {
            Ok(outcome) => outcome,
            Err(mpsc::TryRecvError::Empty) => return None,
            Err(mpsc::TryRecvError::Disconnected) => Err(dropped_without_outcome()),
        };
        self.taken.set(true);
        Some(outcome)
    }

    /// Block until the session ends.
    ///
    /// Ticks must come from elsewhere; on a single thread, drive the recorder first
    /// (see [`Recorder::run_to_completion`]).
    ///
    /// Fails if the outcome was already taken with [`Completion::try_recv`].
    pub fn wait(self) -> RecordingOutcome {
        if self.taken.get() {
            return Err(FramegifError::precondition(
                "recording outcome was already taken",
            ));
        }
        self.rx.recv().unwrap_or_else(|_| Err(dropped_without_outcome()))
    }
}

fn dropped_without_outcome() -> FramegifError {
    FramegifError::precondition("recording session ended without reporting an outcome")
}

/// Cloneable handle for requesting a cooperative stop from another thread or a signal handler.
#[derive(Clone, Debug, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    /// Ask the session to finalize at its next tick.
    pub fn request_stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether a stop was requested.
    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

enum Step {
    Continue(TickOutcome),
    Complete { stopped_early: bool },
    Abort(FramegifError),
}

struct Session {
    config: RecordingConfig,
    interval: Duration,
    state: RecorderState,
    source: Box<dyn FrameSource>,
    writer: GifWriter<Box<dyn ByteSink>>,
    lookup: Option<LookupTable>,
    indices: Vec<u8>,
    size: Option<(u32, u32)>,
    started_at: Instant,
    last_attempt: Option<Instant>,
    last_written: Instant,
    captured: u32,
    skipped: u32,
    stop: StopHandle,
    done: mpsc::Sender<RecordingOutcome>,
}

impl Session {
    fn step(&mut self, now: Instant) -> Step {
        if self.stop.is_requested() {
            return Step::Complete {
                stopped_early: true,
            };
        }
        if !self.source.is_available() {
            return Step::Abort(FramegifError::source(
                "frame source became unavailable mid-session",
            ));
        }
        if let Some(last) = self.last_attempt
            && now.saturating_duration_since(last) < self.interval
        {
            return Step::Continue(TickOutcome::TooEarly);
        }
        self.last_attempt = Some(now);

        let frame = match self.source.capture_frame(self.config.scale) {
            Ok(frame) => frame,
            Err(e) => return Step::Abort(e),
        };
        self.captured += 1;

        let outcome = match self.size {
            None => match self.begin(&frame) {
                Ok(()) => self.append(&frame, now),
                Err(e) => return Step::Abort(e),
            },
            Some(size) if size != frame.dimensions() => {
                self.skipped += 1;
                tracing::warn!(
                    expected = ?size,
                    got = ?frame.dimensions(),
                    "frame size changed mid-session; frame skipped"
                );
                Ok(TickOutcome::FrameSkipped)
            }
            Some(_) => self.append(&frame, now),
        };

        match outcome {
            Err(e) => Step::Abort(e),
            Ok(_) if self.captured >= self.config.frame_count => Step::Complete {
                stopped_early: false,
            },
            Ok(o) => Step::Continue(o),
        }
    }

    fn begin(&mut self, frame: &FrameRGBA) -> FramegifResult<()> {
        let palette = Palette::from_frame(frame, usize::from(self.config.colors))?;
        let lookup = LookupTable::build(&palette);
        self.writer.initialize(frame.width, frame.height, &palette)?;
        self.lookup = Some(lookup);
        self.size = Some(frame.dimensions());
        self.state = RecorderState::Recording;
        tracing::debug!(
            width = frame.width,
            height = frame.height,
            palette = palette.len(),
            "session size and palette locked"
        );
        Ok(())
    }

    fn append(&mut self, frame: &FrameRGBA, now: Instant) -> FramegifResult<TickOutcome> {
        let lookup = self
            .lookup
            .as_ref()
            .ok_or_else(|| FramegifError::precondition("frame appended before palette was built"))?;
        lookup.quantize_frame(frame, &mut self.indices);
        let delay = delay_hundredths(now.saturating_duration_since(self.last_written));
        self.writer.write_frame(&self.indices, delay)?;
        self.last_written = now;
        tracing::debug!(
            frame = self.writer.frames_written(),
            delay_cs = delay,
            "frame appended"
        );
        Ok(TickOutcome::FrameWritten)
    }

    fn progress(&self) -> RecordingProgress {
        RecordingProgress {
            captured: self.captured,
            written: self.writer.frames_written(),
            skipped: self.skipped,
            target: self.config.frame_count,
        }
    }

    /// Write the trailer, or discard the output when nothing was written.
    fn finalize(mut self, stopped_early: bool, now: Instant) {
        self.state = RecorderState::Finalizing;
        if self.writer.frames_written() == 0 {
            self.abort(FramegifError::precondition(
                "recording stopped before any frame was captured",
            ));
            return;
        }
        if let Err(e) = self.writer.finish() {
            self.abort(e);
            return;
        }

        let summary = RecordingSummary {
            frames_written: self.writer.frames_written(),
            frames_skipped: self.skipped,
            output: self.writer.get_ref().describe(),
            duration: now.saturating_duration_since(self.started_at),
            byte_size: self.writer.get_ref().bytes_written(),
            stopped_early,
        };
        tracing::info!(
            output = %summary.output,
            frames = summary.frames_written,
            skipped = summary.frames_skipped,
            bytes = summary.byte_size,
            stopped_early,
            "recording finished"
        );
        self.release();
        self.complete(Ok(summary));
    }

    /// Discard partial output and report `err`.
    fn abort(mut self, err: FramegifError) {
        self.state = RecorderState::Aborting;
        tracing::warn!(error = %err, output = %self.writer.get_ref().describe(), "recording aborted");
        if let Err(discard_err) = self.writer.get_mut().discard() {
            tracing::warn!(error = %discard_err, "failed to discard partial output");
        }
        self.release();
        self.complete(Err(err));
    }

    fn release(&mut self) {
        self.source.release_cached_resources();
        self.lookup = None;
        self.indices = Vec::new();
    }

    fn complete(self, outcome: RecordingOutcome) {
        let Session { done, writer, .. } = self;
        // Close the sink before reporting.
        drop(writer);
        if done.send(outcome).is_err() {
            tracing::debug!("completion receiver dropped; outcome not delivered");
        }
    }
}

/// Drives one recording session at a time.
///
/// ```no_run
/// use framegif::{InMemorySink, PatternSource, Recorder, RecordingConfig};
///
/// let mut recorder = Recorder::new();
/// let done = recorder.start(
///     RecordingConfig { frame_count: 10, ..RecordingConfig::default() },
///     Box::new(PatternSource::new(64, 48)?),
///     Box::new(InMemorySink::new()),
/// )?;
/// recorder.run_to_completion();
/// let summary = done.wait()?;
/// assert_eq!(summary.frames_written, 10);
/// # Ok::<(), framegif::FramegifError>(())
/// ```
#[derive(Default)]
pub struct Recorder {
    session: Option<Session>,
}

impl Recorder {
    /// An idle recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a session now. See [`Recorder::start_at`].
    pub fn start(
        &mut self,
        config: RecordingConfig,
        source: Box<dyn FrameSource>,
        sink: Box<dyn ByteSink>,
    ) -> FramegifResult<Completion> {
        self.start_at(config, source, sink, Instant::now())
    }

    /// Start a session whose clock begins at `now`.
    ///
    /// Rejected without touching `sink` when a session is already active, the config is out of
    /// range, or the source cannot supply frames. The first frame is captured on the next tick.
    pub fn start_at(
        &mut self,
        config: RecordingConfig,
        source: Box<dyn FrameSource>,
        sink: Box<dyn ByteSink>,
        now: Instant,
    ) -> FramegifResult<Completion> {
        if self.session.is_some() {
            return Err(FramegifError::precondition(
                "a recording session is already active",
            ));
        }
        config.validate()?;
        if !source.is_available() {
            return Err(FramegifError::source("frame source is not ready"));
        }
        let interval = config.rate()?.frame_interval();

        tracing::info!(
            output = %sink.describe(),
            frames = config.frame_count,
            fps = config.fps,
            scale = config.scale,
            colors = config.colors,
            "recording started"
        );
        let (done, rx) = mpsc::channel();
        self.session = Some(Session {
            writer: GifWriter::new(sink).with_loop_count(config.loop_count),
            config,
            interval,
            state: RecorderState::ArmedWaitingFirstFrame,
            source,
            lookup: None,
            indices: Vec::new(),
            size: None,
            started_at: now,
            last_attempt: None,
            last_written: now,
            captured: 0,
            skipped: 0,
            stop: StopHandle::default(),
            done,
        });
        Ok(Completion::new(rx))
    }

    /// Advance the session using the current time.
    pub fn tick(&mut self) -> TickOutcome {
        self.tick_at(Instant::now())
    }

    /// Advance the session as if the current time were `now`.
    pub fn tick_at(&mut self, now: Instant) -> TickOutcome {
        let Some(mut session) = self.session.take() else {
            return TickOutcome::Inactive;
        };
        match session.step(now) {
            Step::Continue(outcome) => {
                self.session = Some(session);
                outcome
            }
            Step::Complete { stopped_early } => {
                session.finalize(stopped_early, now);
                TickOutcome::Finished
            }
            Step::Abort(err) => {
                session.abort(err);
                TickOutcome::Finished
            }
        }
    }

    /// Request a stop; honoured at the next tick.
    pub fn request_stop(&self) {
        if let Some(s) = &self.session {
            s.stop.request_stop();
        }
    }

    /// Stop handle for the active session.
    pub fn stop_handle(&self) -> Option<StopHandle> {
        self.session.as_ref().map(|s| s.stop.clone())
    }

    /// Progress of the active session.
    pub fn progress(&self) -> Option<RecordingProgress> {
        self.session.as_ref().map(Session::progress)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> RecorderState {
        self.session
            .as_ref()
            .map_or(RecorderState::Idle, |s| s.state)
    }

    /// Whether a session is active.
    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    /// Tick until the active session ends, sleeping between early ticks.
    pub fn run_to_completion(&mut self) {
        let Some(interval) = self.session.as_ref().map(|s| s.interval) else {
            return;
        };
        let nap = (interval / 8).max(Duration::from_millis(1));
        while self.is_active() {
            if self.tick() == TickOutcome::TooEarly {
                std::thread::sleep(nap);
            }
        }
    }

    /// Record a whole session on the calling thread.
    pub fn run_blocking(
        config: RecordingConfig,
        source: Box<dyn FrameSource>,
        sink: Box<dyn ByteSink>,
    ) -> RecordingOutcome {
        let mut recorder = Self::new();
        let done = recorder.start(config, source, sink)?;
        recorder.run_to_completion();
        done.wait()
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        // An active session still gets a terminated file.
        if let Some(session) = self.session.take() {
            session.finalize(true, Instant::now());
        }
    }
}

impl std::fmt::Debug for Recorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recorder")
            .field("state", &self.state())
            .field("progress", &self.progress())
            .finish()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/capture/recorder.rs"]
mod tests;
