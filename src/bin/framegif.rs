use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "framegif", version)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Record a directory of still images as an animated GIF.
    Record(RecordArgs),
    /// Record the built-in animated test pattern.
    Demo(DemoArgs),
}

#[derive(Args, Debug)]
struct SessionArgs {
    /// Output GIF path.
    #[arg(long)]
    out: PathBuf,

    /// Overwrite output if it already exists.
    #[arg(long, default_value_t = false)]
    overwrite: bool,

    /// Session config JSON; flags below override its fields.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Frames to record (1-200).
    #[arg(long)]
    frames: Option<u32>,

    /// Capture rate (10-30).
    #[arg(long)]
    fps: Option<u32>,

    /// Resolution scale (0.25-1.0).
    #[arg(long)]
    scale: Option<f32>,

    /// Palette size (2-256).
    #[arg(long)]
    colors: Option<u16>,

    /// Playback loop count (0 loops forever).
    #[arg(long)]
    loop_count: Option<u16>,
}

#[derive(Args, Debug)]
struct RecordArgs {
    /// Directory of frames, played in file-name order.
    #[arg(long)]
    frames_dir: PathBuf,

    /// Restart the image sequence when it runs out.
    #[arg(long, default_value_t = false)]
    repeat: bool,

    #[command(flatten)]
    session: SessionArgs,
}

#[derive(Args, Debug)]
struct DemoArgs {
    /// Pattern width before scaling.
    #[arg(long, default_value_t = 160)]
    width: u32,

    /// Pattern height before scaling.
    #[arg(long, default_value_t = 120)]
    height: u32,

    #[command(flatten)]
    session: SessionArgs,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.cmd {
        Command::Record(args) => cmd_record(args),
        Command::Demo(args) => cmd_demo(args),
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Merged session settings, and whether the frame count was set by the user (flag or JSON).
fn session_config(args: &SessionArgs) -> anyhow::Result<(framegif::RecordingConfig, bool)> {
    let (mut cfg, mut frames_given) = match &args.config {
        Some(path) => (
            framegif::RecordingConfig::from_json_path(path)?,
            config_sets_frame_count(path)?,
        ),
        None => (framegif::RecordingConfig::default(), false),
    };
    frames_given |= args.frames.is_some();
    if let Some(v) = args.frames {
        cfg.frame_count = v;
    }
    if let Some(v) = args.fps {
        cfg.fps = v;
    }
    if let Some(v) = args.scale {
        cfg.scale = v;
    }
    if let Some(v) = args.colors {
        cfg.colors = v;
    }
    if let Some(v) = args.loop_count {
        cfg.loop_count = v;
    }
    cfg.validate()?;
    Ok((cfg, frames_given))
}

fn config_sets_frame_count(path: &Path) -> anyhow::Result<bool> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read config '{}'", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&text)
        .with_context(|| format!("parse config '{}'", path.display()))?;
    Ok(value.get("frame_count").is_some())
}

/// Without looping, a sequence can't supply more frames than it has images.
fn fit_frame_count(
    cfg: &mut framegif::RecordingConfig,
    images: usize,
    frames_given: bool,
) -> anyhow::Result<()> {
    let images = u32::try_from(images).unwrap_or(u32::MAX);
    if cfg.frame_count <= images {
        return Ok(());
    }
    if frames_given {
        return Err(framegif::FramegifError::validation(format!(
            "frame_count {} exceeds the {images} images in the sequence (use --repeat to loop it)",
            cfg.frame_count
        ))
        .into());
    }
    tracing::info!(
        images,
        default = cfg.frame_count,
        "recording every image in the sequence"
    );
    cfg.frame_count = images;
    Ok(())
}

fn cmd_record(args: RecordArgs) -> anyhow::Result<()> {
    let (mut cfg, frames_given) = session_config(&args.session)?;
    let source = framegif::ImageSequenceSource::from_dir(&args.frames_dir)
        .with_context(|| format!("open frames '{}'", args.frames_dir.display()))?
        .looping(args.repeat);
    if !args.repeat {
        fit_frame_count(&mut cfg, source.len(), frames_given)?;
    }
    record(&args.session, cfg, Box::new(source))
}

fn cmd_demo(args: DemoArgs) -> anyhow::Result<()> {
    let (cfg, _) = session_config(&args.session)?;
    let source = framegif::PatternSource::new(args.width, args.height)?;
    record(&args.session, cfg, Box::new(source))
}

fn record(
    args: &SessionArgs,
    cfg: framegif::RecordingConfig,
    source: Box<dyn framegif::FrameSource>,
) -> anyhow::Result<()> {
    anyhow::ensure!(source.is_available(), "frame source is not ready");
    let sink = framegif::FileSink::create(framegif::FileSinkOpts {
        out_path: args.out.clone(),
        overwrite: args.overwrite,
    })?;

    let mut recorder = framegif::Recorder::new();
    let done = recorder.start(cfg, source, Box::new(sink))?;
    if let Some(stop) = recorder.stop_handle() {
        ctrlc::set_handler(move || stop.request_stop()).context("install Ctrl-C handler")?;
    }
    recorder.run_to_completion();

    let summary = done
        .wait()
        .with_context(|| format!("record '{}'", args.out.display()))?;
    eprintln!(
        "wrote {} ({} frames, {} bytes{})",
        summary.output,
        summary.frames_written,
        summary.byte_size,
        if summary.stopped_early {
            ", stopped early"
        } else {
            ""
        }
    );
    Ok(())
}
