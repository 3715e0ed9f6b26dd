use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use loopcard::{
    CaptureController, CaptureState, Clock, FfmpegEncoder, FileArtifactStore, FrameLoop,
    MonotonicClock, PaletteId, ParameterSet, ShapeStyle, StepClock, Surface, Typeface,
    is_ffmpeg_on_path, render_frame,
};

#[derive(Parser, Debug)]
#[command(name = "loopcard", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a single frame of the card as a PNG.
    Frame(FrameArgs),
    /// Capture a full loop into a WebM clip (requires `ffmpeg` on PATH).
    Export(ExportArgs),
}

#[derive(Args, Debug)]
struct CardArgs {
    /// Headline text (uppercased on the card).
    #[arg(long)]
    title: Option<String>,

    /// Supporting line under the title.
    #[arg(long)]
    subtitle: Option<String>,

    /// Label on the accent button.
    #[arg(long)]
    callout: Option<String>,

    /// Clip length in seconds (3-12).
    #[arg(long)]
    seconds: Option<u32>,

    /// Frame rate (24, 30, 45 or 60).
    #[arg(long)]
    fps: Option<u32>,

    /// Accent color as #rrggbb.
    #[arg(long)]
    accent: Option<String>,

    /// Background palette.
    #[arg(long)]
    palette: Option<PaletteId>,

    /// Animated overlay shape.
    #[arg(long)]
    shape: Option<ShapeStyle>,

    /// JSON file with a full parameter set; flags override its fields.
    #[arg(long)]
    params: Option<PathBuf>,

    /// TTF/OTF font for the text layers. Defaults to a system font; with no
    /// font at all, text layers are skipped.
    #[arg(long)]
    font: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct FrameArgs {
    #[command(flatten)]
    card: CardArgs,

    /// Loop time in seconds to render at.
    #[arg(long, default_value_t = 0.0)]
    t: f64,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Args, Debug)]
struct ExportArgs {
    #[command(flatten)]
    card: CardArgs,

    /// Output WebM path.
    #[arg(long)]
    out: PathBuf,

    /// Capture in real time instead of stepping the clock frame by frame.
    #[arg(long)]
    realtime: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Frame(args) => cmd_frame(args),
        Command::Export(args) => cmd_export(args),
    }
}

fn build_params(card: &CardArgs) -> anyhow::Result<ParameterSet> {
    let mut params = match &card.params {
        Some(path) => {
            let f = File::open(path)
                .with_context(|| format!("open parameter file '{}'", path.display()))?;
            serde_json::from_reader(BufReader::new(f)).with_context(|| "parse parameter JSON")?
        }
        None => ParameterSet::default(),
    };

    if let Some(t) = &card.title {
        params.set_title(t);
    }
    if let Some(s) = &card.subtitle {
        params.set_subtitle(s);
    }
    if let Some(c) = &card.callout {
        params.set_callout(c);
    }
    if let Some(seconds) = card.seconds {
        params.set_duration_seconds(seconds);
    }
    if let Some(fps) = card.fps {
        params.set_fps(fps);
    }
    if let Some(accent) = &card.accent {
        params.set_accent_hex(accent);
    }
    if let Some(palette) = card.palette {
        params.palette = palette;
    }
    if let Some(shape) = card.shape {
        params.shape = shape;
    }

    params.validate()?;
    Ok(params)
}

fn load_face(card: &CardArgs) -> anyhow::Result<Option<Typeface>> {
    match &card.font {
        Some(path) => {
            let face = Typeface::from_file(path)
                .with_context(|| format!("load font '{}'", path.display()))?;
            Ok(Some(face))
        }
        None => match Typeface::load_system_default() {
            Ok(face) => Ok(Some(face)),
            Err(e) => {
                tracing::warn!("no system font found, rendering without text layers: {e}");
                Ok(None)
            }
        },
    }
}

fn ensure_parent_dir(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create output dir '{}'", parent.display()))?;
        }
    }
    Ok(())
}

fn cmd_frame(args: FrameArgs) -> anyhow::Result<()> {
    let params = build_params(&args.card)?;
    let face = load_face(&args.card)?;

    let mut surface = Surface::card();
    render_frame(&mut surface, &params, face.as_ref(), args.t)?;

    ensure_parent_dir(&args.out)?;
    image::save_buffer_with_format(
        &args.out,
        surface.data(),
        surface.width(),
        surface.height(),
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", args.out.display()))?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_export(args: ExportArgs) -> anyhow::Result<()> {
    if !is_ffmpeg_on_path() {
        anyhow::bail!("ffmpeg not found on PATH");
    }

    let params = build_params(&args.card)?;
    let face = load_face(&args.card)?;

    let encoder = FfmpegEncoder::detect()?;
    let scratch = std::env::temp_dir().join(format!("loopcard-{}", std::process::id()));
    let store = FileArtifactStore::new(&scratch)?;

    let mut frame_loop = FrameLoop::new(params.clone(), face);
    let mut capture = CaptureController::new(Box::new(encoder), Box::new(store));
    let frame_interval = Duration::from_secs(1) / params.fps;

    let pb = ProgressBar::new(100);
    pb.set_style(ProgressStyle::with_template(
        "{bar:40.cyan/blue} {pos:>3}% {msg}",
    )?);

    let result = if args.realtime {
        let clock = MonotonicClock::new();
        drive(&clock, &mut frame_loop, &mut capture, &pb, || {
            std::thread::sleep(frame_interval)
        })
    } else {
        let clock = StepClock::new();
        drive(&clock, &mut frame_loop, &mut capture, &pb, || {
            clock.advance(frame_interval)
        })
    };
    pb.finish_and_clear();
    result?;

    let handle = capture
        .artifact()
        .context("capture finished without an artifact")?;
    ensure_parent_dir(&args.out)?;
    std::fs::copy(handle.location(), &args.out)
        .with_context(|| format!("write clip '{}'", args.out.display()))?;

    capture.teardown();
    let _ = std::fs::remove_dir_all(&scratch);

    eprintln!("wrote {}", args.out.display());
    Ok(())
}

/// Run the preview loop and capture pump together until the clip is ready,
/// advancing time via `step` between iterations.
fn drive(
    clock: &dyn Clock,
    frame_loop: &mut FrameLoop,
    capture: &mut CaptureController,
    pb: &ProgressBar,
    mut step: impl FnMut(),
) -> anyhow::Result<()> {
    let start = clock.now();
    frame_loop.tick(start)?;
    capture.start(start, Some(frame_loop.surface()), frame_loop.params())?;

    loop {
        let now = clock.now();
        frame_loop.tick(now)?;
        capture.pump(now, frame_loop.surface())?;
        pb.set_position(capture.progress_percent() as u64);

        match capture.state() {
            CaptureState::Ready => return Ok(()),
            CaptureState::Failed => {
                anyhow::bail!(
                    "capture failed: {}",
                    capture.error().unwrap_or("unknown encoder fault")
                )
            }
            _ => step(),
        }
    }
}
