use super::*;
use crate::encode::sink::InMemorySink;
use image::AnimationDecoder as _;
use image::codecs::gif::GifDecoder;
use std::io::{self, Write};

fn frame(w: u32, h: u32) -> FrameRGBA {
    let mut data = Vec::with_capacity((w * h * 4) as usize);
    for i in 0..w * h {
        data.extend_from_slice(&[(i * 37 % 256) as u8, (i * 11 % 256) as u8, 90, 255]);
    }
    FrameRGBA::new(w, h, data).unwrap()
}

/// Frame source replaying a list of sizes; the last size repeats.
struct ScriptedSource {
    sizes: Vec<(u32, u32)>,
    next: usize,
    fail_at: Option<usize>,
    available: Arc<AtomicBool>,
    released: Arc<AtomicBool>,
}

impl ScriptedSource {
    fn fixed(w: u32, h: u32) -> Self {
        Self::sizes(vec![(w, h)])
    }

    fn sizes(sizes: Vec<(u32, u32)>) -> Self {
        Self {
            sizes,
            next: 0,
            fail_at: None,
            available: Arc::new(AtomicBool::new(true)),
            released: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl FrameSource for ScriptedSource {
    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    fn capture_frame(&mut self, _scale: f32) -> FramegifResult<FrameRGBA> {
        let i = self.next;
        self.next += 1;
        if self.fail_at == Some(i) {
            return Err(FramegifError::source("capture failed"));
        }
        let (w, h) = self.sizes[i.min(self.sizes.len() - 1)];
        Ok(frame(w, h))
    }

    fn release_cached_resources(&mut self) {
        self.released.store(true, Ordering::SeqCst);
    }
}

/// Sink that fails once `budget` bytes have been accepted.
struct FailingSink {
    budget: usize,
    discarded: Arc<AtomicBool>,
}

impl Write for FailingSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.budget == 0 {
            return Err(io::Error::other("disk full"));
        }
        let n = buf.len().min(self.budget);
        self.budget -= n;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl ByteSink for FailingSink {
    fn describe(&self) -> String {
        "failing".to_string()
    }

    fn bytes_written(&self) -> u64 {
        0
    }

    fn discard(&mut self) -> FramegifResult<()> {
        self.discarded.store(true, Ordering::SeqCst);
        Ok(())
    }
}

fn config(frames: u32) -> RecordingConfig {
    RecordingConfig {
        frame_count: frames,
        fps: 10,
        colors: 16,
        ..RecordingConfig::default()
    }
}

fn at(t0: Instant, ms: u64) -> Instant {
    t0 + Duration::from_millis(ms)
}

fn decoded_delays_ms(bytes: &[u8]) -> Vec<u32> {
    let decoder = GifDecoder::new(io::Cursor::new(bytes)).unwrap();
    decoder
        .into_frames()
        .collect_frames()
        .unwrap()
        .iter()
        .map(|f| {
            let (n, d) = f.delay().numer_denom_ms();
            n / d
        })
        .collect()
}

#[test]
fn start_rejects_bad_config_busy_recorder_and_unready_source() {
    let mut rec = Recorder::new();
    assert_eq!(rec.state(), RecorderState::Idle);

    let err = rec
        .start(
            RecordingConfig {
                fps: 60,
                ..config(5)
            },
            Box::new(ScriptedSource::fixed(4, 4)),
            Box::new(InMemorySink::new()),
        )
        .unwrap_err();
    assert!(matches!(err, FramegifError::Validation(_)));

    let unready = ScriptedSource::fixed(4, 4);
    unready.available.store(false, Ordering::SeqCst);
    let err = rec
        .start(config(5), Box::new(unready), Box::new(InMemorySink::new()))
        .unwrap_err();
    assert!(matches!(err, FramegifError::Source(_)));
    assert!(!rec.is_active());

    let _done = rec
        .start(
            config(5),
            Box::new(ScriptedSource::fixed(4, 4)),
            Box::new(InMemorySink::new()),
        )
        .unwrap();
    assert_eq!(rec.state(), RecorderState::ArmedWaitingFirstFrame);
    let err = rec
        .start(
            config(5),
            Box::new(ScriptedSource::fixed(4, 4)),
            Box::new(InMemorySink::new()),
        )
        .unwrap_err();
    assert!(matches!(err, FramegifError::Precondition(_)));
}

#[test]
fn ticks_respect_the_capture_interval() {
    let t0 = Instant::now();
    let mut rec = Recorder::new();
    let _done = rec
        .start_at(
            config(10),
            Box::new(ScriptedSource::fixed(4, 4)),
            Box::new(InMemorySink::new()),
            t0,
        )
        .unwrap();

    assert_eq!(rec.tick_at(t0), TickOutcome::FrameWritten);
    assert_eq!(rec.state(), RecorderState::Recording);
    assert_eq!(rec.tick_at(at(t0, 50)), TickOutcome::TooEarly);
    assert_eq!(rec.tick_at(at(t0, 99)), TickOutcome::TooEarly);
    assert_eq!(rec.tick_at(at(t0, 100)), TickOutcome::FrameWritten);

    let p = rec.progress().unwrap();
    assert_eq!(
        p,
        RecordingProgress {
            captured: 2,
            written: 2,
            skipped: 0,
            target: 10
        }
    );
}

#[test]
fn session_completes_at_target_with_measured_delays() {
    let t0 = Instant::now();
    let sink = InMemorySink::labeled("clip");
    let mut rec = Recorder::new();
    let done = rec
        .start_at(
            config(3),
            Box::new(ScriptedSource::fixed(6, 5)),
            Box::new(sink.clone()),
            t0,
        )
        .unwrap();

    assert_eq!(rec.tick_at(t0), TickOutcome::FrameWritten);
    assert!(done.try_recv().is_none());
    assert_eq!(rec.tick_at(at(t0, 100)), TickOutcome::FrameWritten);
    assert_eq!(rec.tick_at(at(t0, 250)), TickOutcome::Finished);
    assert_eq!(rec.state(), RecorderState::Idle);
    assert_eq!(rec.tick_at(at(t0, 400)), TickOutcome::Inactive);

    let summary = done.try_recv().unwrap().unwrap();
    // The outcome is delivered once; later polls see nothing.
    assert!(done.try_recv().is_none());
    assert!(done.try_recv().is_none());
    assert_eq!(summary.frames_written, 3);
    assert_eq!(summary.frames_skipped, 0);
    assert_eq!(summary.output, "clip");
    assert_eq!(summary.duration, Duration::from_millis(250));
    assert!(!summary.stopped_early);

    let bytes = sink.bytes();
    assert_eq!(summary.byte_size, bytes.len() as u64);
    assert_eq!(bytes.last(), Some(&0x3B));
    // First delay is measured from start (0 -> minimum of one hundredth).
    assert_eq!(decoded_delays_ms(&bytes), vec![10, 100, 150]);
}

#[test]
fn size_drift_skips_one_frame_without_aborting() {
    let t0 = Instant::now();
    let mut sizes = vec![(8, 6); 10];
    sizes[4] = (8, 7);
    let sink = InMemorySink::new();
    let mut rec = Recorder::new();
    let done = rec
        .start_at(
            config(10),
            Box::new(ScriptedSource::sizes(sizes)),
            Box::new(sink.clone()),
            t0,
        )
        .unwrap();

    let mut outcomes = Vec::new();
    for i in 0..10 {
        outcomes.push(rec.tick_at(at(t0, i * 100)));
    }
    assert_eq!(outcomes[4], TickOutcome::FrameSkipped);
    assert_eq!(outcomes[9], TickOutcome::Finished);

    let summary = done.wait().unwrap();
    assert_eq!(summary.frames_written, 9);
    assert_eq!(summary.frames_skipped, 1);
    assert_eq!(decoded_delays_ms(&sink.bytes()).len(), 9);
}

#[test]
fn stop_request_finalizes_a_valid_partial_file() {
    let t0 = Instant::now();
    let sink = InMemorySink::new();
    let source = ScriptedSource::fixed(4, 4);
    let released = Arc::clone(&source.released);
    let mut rec = Recorder::new();
    let done = rec
        .start_at(config(50), Box::new(source), Box::new(sink.clone()), t0)
        .unwrap();

    rec.tick_at(t0);
    rec.tick_at(at(t0, 100));
    let handle = rec.stop_handle().unwrap();
    handle.request_stop();
    assert!(rec.is_active());
    assert_eq!(rec.tick_at(at(t0, 150)), TickOutcome::Finished);

    let summary = done.wait().unwrap();
    assert!(summary.stopped_early);
    assert_eq!(summary.frames_written, 2);
    assert!(released.load(Ordering::SeqCst));
    assert_eq!(decoded_delays_ms(&sink.bytes()).len(), 2);
}

#[test]
fn stop_before_first_frame_reports_an_error_and_discards_output() {
    let sink = InMemorySink::new();
    let mut rec = Recorder::new();
    let done = rec
        .start(
            config(5),
            Box::new(ScriptedSource::fixed(4, 4)),
            Box::new(sink.clone()),
        )
        .unwrap();
    rec.request_stop();
    assert_eq!(rec.tick(), TickOutcome::Finished);
    assert!(matches!(done.wait(), Err(FramegifError::Precondition(_))));
    assert!(sink.bytes().is_empty());
}

#[test]
fn source_loss_aborts_and_discards() {
    let t0 = Instant::now();
    let sink = InMemorySink::new();
    let source = ScriptedSource::fixed(4, 4);
    let available = Arc::clone(&source.available);
    let released = Arc::clone(&source.released);
    let mut rec = Recorder::new();
    let done = rec
        .start_at(config(5), Box::new(source), Box::new(sink.clone()), t0)
        .unwrap();

    assert_eq!(rec.tick_at(t0), TickOutcome::FrameWritten);
    assert!(!sink.bytes().is_empty());
    available.store(false, Ordering::SeqCst);
    assert_eq!(rec.tick_at(at(t0, 100)), TickOutcome::Finished);

    assert!(matches!(done.wait(), Err(FramegifError::Source(_))));
    assert!(sink.bytes().is_empty());
    assert!(released.load(Ordering::SeqCst));
}

#[test]
fn capture_failure_aborts() {
    let t0 = Instant::now();
    let mut source = ScriptedSource::fixed(4, 4);
    source.fail_at = Some(1);
    let mut rec = Recorder::new();
    let done = rec
        .start_at(config(5), Box::new(source), Box::new(InMemorySink::new()), t0)
        .unwrap();
    rec.tick_at(t0);
    assert_eq!(rec.tick_at(at(t0, 100)), TickOutcome::Finished);
    assert!(matches!(done.wait(), Err(FramegifError::Source(_))));
}

#[test]
fn sink_failure_aborts_and_discards() {
    let t0 = Instant::now();
    let discarded = Arc::new(AtomicBool::new(false));
    let sink = FailingSink {
        budget: 200,
        discarded: Arc::clone(&discarded),
    };
    let mut rec = Recorder::new();
    let done = rec
        .start_at(
            config(20),
            Box::new(ScriptedSource::fixed(32, 32)),
            Box::new(sink),
            t0,
        )
        .unwrap();

    let mut ticks = 0;
    while rec.is_active() && ticks < 20 {
        rec.tick_at(at(t0, ticks * 100));
        ticks += 1;
    }
    assert!(!rec.is_active());
    assert!(matches!(done.wait(), Err(FramegifError::Sink(_))));
    assert!(discarded.load(Ordering::SeqCst));
}

#[test]
fn recorder_can_run_sessions_back_to_back() {
    let mut rec = Recorder::new();
    let mut outputs = Vec::new();
    for (w, frames) in [(4, 2), (9, 3)] {
        let t0 = Instant::now();
        let sink = InMemorySink::new();
        let done = rec
            .start_at(
                config(frames),
                Box::new(ScriptedSource::fixed(w, 3)),
                Box::new(sink.clone()),
                t0,
            )
            .unwrap();
        for i in 0..u64::from(frames) {
            rec.tick_at(at(t0, i * 100));
        }
        assert_eq!(done.wait().unwrap().frames_written, frames);
        outputs.push(sink.bytes());
    }
    assert_eq!(decoded_delays_ms(&outputs[0]).len(), 2);
    assert_eq!(decoded_delays_ms(&outputs[1]).len(), 3);
    // Logical screen width comes from each session's own first frame.
    assert_eq!(outputs[0][6], 4);
    assert_eq!(outputs[1][6], 9);
}

#[test]
fn dropping_an_active_recorder_terminates_the_file() {
    let t0 = Instant::now();
    let sink = InMemorySink::new();
    let mut rec = Recorder::new();
    let done = rec
        .start_at(
            config(10),
            Box::new(ScriptedSource::fixed(4, 4)),
            Box::new(sink.clone()),
            t0,
        )
        .unwrap();
    rec.tick_at(t0);
    drop(rec);

    let summary = done.wait().unwrap();
    assert!(summary.stopped_early);
    assert_eq!(sink.bytes().last(), Some(&0x3B));
}

#[test]
fn loop_count_reaches_the_container() {
    let sink = InMemorySink::new();
    let summary = Recorder::run_blocking(
        RecordingConfig {
            loop_count: 7,
            ..config(1)
        },
        Box::new(ScriptedSource::fixed(2, 2)),
        Box::new(sink.clone()),
    )
    .unwrap();
    assert_eq!(summary.frames_written, 1);

    let bytes = sink.bytes();
    let pos = bytes
        .windows(11)
        .position(|w| w == b"NETSCAPE2.0")
        .unwrap();
    assert_eq!(&bytes[pos + 11..pos + 15], &[0x03, 0x01, 7, 0]);
}

#[test]
fn wait_after_try_recv_reports_the_outcome_as_taken() {
    let t0 = Instant::now();
    let mut rec = Recorder::new();
    let done = rec
        .start_at(
            config(1),
            Box::new(ScriptedSource::fixed(2, 2)),
            Box::new(InMemorySink::new()),
            t0,
        )
        .unwrap();
    assert_eq!(rec.tick_at(t0), TickOutcome::Finished);
    assert!(done.try_recv().unwrap().is_ok());
    assert!(matches!(done.wait(), Err(FramegifError::Precondition(_))));
}
