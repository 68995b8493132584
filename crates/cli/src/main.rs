mod settings;

use std::error::Error;
use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;

use facewatch_core::capture::domain::capture_source::{CaptureSource, DeviceSelector};
use facewatch_core::capture::infrastructure::image_sequence_source::ImageSequenceSource;
use facewatch_core::detection::domain::detection_mode::DetectionMode;
use facewatch_core::detection::domain::detection_params::DetectionParams;
use facewatch_core::detection::domain::object_detector::ObjectDetector;
use facewatch_core::detection::infrastructure::detector_factory::create_detector;
use facewatch_core::pipeline::detection_strategy::DetectionStrategy;
use facewatch_core::pipeline::infrastructure::threaded_pipeline_executor::ThreadedPipelineExecutor;
use facewatch_core::pipeline::pipeline_logger::StdoutPipelineLogger;
use facewatch_core::pipeline::pipeline_state::PipelineState;
use facewatch_core::pipeline::watch_faces_use_case::WatchFacesUseCase;
use facewatch_core::presentation::infrastructure::composite_sink::CompositeSink;
use facewatch_core::presentation::infrastructure::snapshot_sink::SnapshotSink;
use facewatch_core::presentation::infrastructure::status_line_sink::StatusLineSink;
use facewatch_core::presentation::presenter::{Presenter, RunEnd};
use facewatch_core::shared::model_resolver::{self, ModelLocation, EYE_CASCADE};

use settings::{Mode, Settings};

/// Watch a camera and report how many faces are in view.
#[derive(Parser)]
#[command(name = "facewatch")]
struct Cli {
    /// Camera index, "any", a device path, or a directory of images to replay.
    #[arg(long)]
    device: Option<String>,

    /// Detection mode: single (faces) or nested (faces, then eyes inside each face).
    #[arg(long, value_enum)]
    mode: Option<Mode>,

    /// Face model (.bin SeetaFace or .xml cascade). Downloaded if omitted.
    #[arg(long)]
    face_model: Option<PathBuf>,

    /// Eye cascade for nested mode. Downloaded if omitted.
    #[arg(long)]
    eye_model: Option<PathBuf>,

    /// Directory searched for bundled models before downloading.
    #[arg(long)]
    models_dir: Option<PathBuf>,

    /// Image pyramid scale step (> 1.0).
    #[arg(long)]
    scale_factor: Option<f64>,

    /// Neighbouring hits required to keep a detection.
    #[arg(long)]
    min_neighbors: Option<u32>,

    /// Smallest face side in pixels.
    #[arg(long)]
    min_size: Option<u32>,

    /// Largest face side in pixels.
    #[arg(long)]
    max_size: Option<u32>,

    /// Smallest eye side in pixels, searched inside each face (nested mode).
    #[arg(long)]
    eye_min_size: Option<u32>,

    /// Pause between capture cycles in milliseconds.
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Consecutive transient capture failures tolerated before giving up.
    #[arg(long)]
    max_failures: Option<u32>,

    /// Keep the latest annotated frame in this image file.
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Write the snapshot only every Nth frame.
    #[arg(long, default_value = "1")]
    snapshot_every: usize,

    /// Stop after this many frames.
    #[arg(long)]
    max_frames: Option<usize>,

    /// Replay an image directory forever instead of stopping at the end.
    #[arg(long = "loop")]
    looping: bool,

    /// Settings file (defaults to the user config directory).
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let settings = resolve_settings(&cli)?;
    validate(&settings)?;

    let selector: DeviceSelector = settings.device.parse()?;
    let source = build_source(&selector, settings.looping)?;
    let strategy = build_strategy(&settings, cli.models_dir.as_deref())?;

    let mut use_case = WatchFacesUseCase::new(
        source,
        strategy,
        Box::new(ThreadedPipelineExecutor::new()),
        selector,
        settings.pipeline_config(cli.max_frames),
        Some(Box::new(StdoutPipelineLogger::default())),
    );
    let handle = use_case.start()?;

    let token = handle.cancel_token();
    ctrlc::set_handler(move || token.cancel())?;

    let mut sink = CompositeSink::new().with(Box::new(StatusLineSink::stderr()));
    if let Some(path) = &settings.snapshot {
        sink = sink.with(Box::new(SnapshotSink::new(path).every(cli.snapshot_every)));
    }
    let mut presenter = Presenter::new(Box::new(sink));
    let presented = presenter.run(handle.messages());
    let report = handle.wait();

    log::info!(
        "Run ended {}: {} cycles, {} frames presented, {} transient failures, {} sink errors",
        report.final_state,
        report.cycles,
        presented.frames_presented,
        report.transient_failures,
        presented.sink_errors
    );

    match (report.final_state, presented.end) {
        (PipelineState::Faulted, _) => {
            let reason = report.fault.unwrap_or_else(|| "unknown error".into());
            Err(format!("Capture failed: {reason}").into())
        }
        (_, RunEnd::Faulted(reason)) => Err(format!("Capture failed: {reason}").into()),
        _ => Ok(()),
    }
}

/// Saved settings with every flag given on the command line laid on top.
fn resolve_settings(cli: &Cli) -> Result<Settings, Box<dyn Error>> {
    let mut settings = match &cli.config {
        Some(path) => Settings::load_from(path)?,
        None => Settings::load(),
    };

    if let Some(device) = &cli.device {
        settings.device = device.clone();
    }
    if let Some(mode) = cli.mode {
        settings.mode = mode;
    }
    if let Some(path) = &cli.face_model {
        settings.face_model = Some(path.clone());
    }
    if let Some(path) = &cli.eye_model {
        settings.eye_model = Some(path.clone());
    }
    if let Some(v) = cli.scale_factor {
        settings.scale_factor = v;
    }
    if let Some(v) = cli.min_neighbors {
        settings.min_neighbors = v;
    }
    if let Some(v) = cli.min_size {
        settings.min_size = v;
    }
    if let Some(v) = cli.max_size {
        settings.max_size = Some(v);
    }
    if let Some(v) = cli.eye_min_size {
        settings.eye_min_size = v;
    }
    if let Some(v) = cli.interval_ms {
        settings.interval_ms = v;
    }
    if let Some(v) = cli.max_failures {
        settings.max_consecutive_failures = v;
    }
    if let Some(path) = &cli.snapshot {
        settings.snapshot = Some(path.clone());
    }
    if cli.looping {
        settings.looping = true;
    }
    Ok(settings)
}

fn validate(settings: &Settings) -> Result<(), Box<dyn Error>> {
    settings.detection_params().validate()?;
    if settings.mode == Mode::Nested {
        settings
            .eye_detection_params()
            .validate()
            .map_err(|e| format!("Eye detector: {e}"))?;
    }
    if settings.max_consecutive_failures == 0 {
        return Err("Max failures must be at least 1".into());
    }
    for (flag, path) in [
        ("--face-model", &settings.face_model),
        ("--eye-model", &settings.eye_model),
    ] {
        if let Some(path) = path {
            if !path.exists() {
                return Err(format!("{flag} not found: {}", path.display()).into());
            }
        }
    }
    if settings.mode == Mode::Nested && !cfg!(feature = "opencv") {
        return Err("Nested mode detects eyes with an XML cascade; rebuild with the `opencv` feature".into());
    }
    Ok(())
}

fn build_source(
    selector: &DeviceSelector,
    looping: bool,
) -> Result<Box<dyn CaptureSource>, Box<dyn Error>> {
    if let DeviceSelector::Path(path) = selector {
        if path.is_dir() {
            return Ok(Box::new(ImageSequenceSource::new().looping(looping)));
        }
    }
    camera_source()
}

#[cfg(feature = "ffmpeg")]
fn camera_source() -> Result<Box<dyn CaptureSource>, Box<dyn Error>> {
    use facewatch_core::capture::infrastructure::ffmpeg_camera::FfmpegCamera;
    Ok(Box::new(FfmpegCamera::new()))
}

#[cfg(all(feature = "opencv", not(feature = "ffmpeg")))]
fn camera_source() -> Result<Box<dyn CaptureSource>, Box<dyn Error>> {
    use facewatch_core::capture::infrastructure::opencv_camera::OpenCvCamera;
    Ok(Box::new(OpenCvCamera::new()))
}

#[cfg(not(any(feature = "ffmpeg", feature = "opencv")))]
fn camera_source() -> Result<Box<dyn CaptureSource>, Box<dyn Error>> {
    Err("Live cameras need the `ffmpeg` or `opencv` feature; pass a directory of images with --device instead".into())
}

fn build_strategy(
    settings: &Settings,
    models_dir: Option<&Path>,
) -> Result<DetectionStrategy, Box<dyn Error>> {
    let face_path = model_path(settings.face_model.as_deref(), default_face_model(), models_dir)?;
    let faces = load_detector(&face_path, &settings.detection_params())?;

    match DetectionMode::from(settings.mode) {
        DetectionMode::Single => Ok(DetectionStrategy::single(faces)),
        DetectionMode::Nested => {
            let eye_path = model_path(settings.eye_model.as_deref(), EYE_CASCADE, models_dir)?;
            let eyes = load_detector(&eye_path, &settings.eye_detection_params())?;
            Ok(DetectionStrategy::nested(faces, eyes))
        }
    }
}

fn load_detector(
    path: &Path,
    params: &DetectionParams,
) -> Result<Box<dyn ObjectDetector>, Box<dyn Error>> {
    let detector = create_detector(path, params.clone())?;
    log::info!("Loaded {} from {}", detector.model_name(), path.display());
    Ok(detector)
}

fn model_path(
    explicit: Option<&Path>,
    fallback: ModelLocation,
    models_dir: Option<&Path>,
) -> Result<PathBuf, Box<dyn Error>> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    log::info!("Resolving model: {}", fallback.name);
    let path = model_resolver::resolve(fallback, models_dir, Some(Box::new(download_progress)))?;
    eprintln!();
    Ok(path)
}

#[cfg(feature = "opencv")]
fn default_face_model() -> ModelLocation {
    model_resolver::FRONTAL_FACE_CASCADE
}

#[cfg(not(feature = "opencv"))]
fn default_face_model() -> ModelLocation {
    model_resolver::SEETA_FRONTAL_FACE
}

fn download_progress(downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading detection model... {pct}%");
    } else {
        eprint!("\rDownloading detection model... {downloaded} bytes");
    }
}
