mod mjpeg;

use std::fs;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use clap::Parser;

use moodlens_core::capture::infrastructure::ffmpeg_camera::FfmpegCameraSource;
use moodlens_core::detection::domain::face_detector::DetectorKind;
use moodlens_core::detection::infrastructure::detector_factory::{model_for, OnnxDetectorProvider};
use moodlens_core::emotion::infrastructure::onnx_emotion_model::OnnxEmotionModelProvider;
use moodlens_core::shared::config::StreamConfig;
use moodlens_core::shared::model_resolver;
use moodlens_core::stream::domain::persistence::EmotionRecordGateway;
use moodlens_core::stream::infrastructure::jsonl_record_store::JsonlRecordStore;
use moodlens_core::stream::stream_handle::{Stream, StreamDeps};
use moodlens_core::stream::stream_key::StreamKey;
use moodlens_core::stream::stream_registry::StreamRegistry;

use mjpeg::{MjpegWriter, FRAME_PERIOD};

const METRICS_PERIOD: Duration = Duration::from_secs(1);

/// Live facial emotion recognition from a webcam.
#[derive(Parser)]
#[command(name = "moodlens")]
struct Cli {
    /// JSON config file (defaults to the platform config directory).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Camera device, e.g. /dev/video0 on Linux or 0 on macOS.
    #[arg(long)]
    device: Option<String>,

    /// Face detector: accurate (YOLO, downloaded on first use) or fast
    /// (BlazeFace; place blazeface_short_range.onnx in the model cache or a
    /// `model_dirs` entry, as for emotion_model_final.onnx).
    #[arg(long)]
    detector: Option<DetectorKind>,

    /// Store results under this user id (requires --store).
    #[arg(long)]
    user: Option<String>,

    /// Stop after this many seconds (runs until the camera fails otherwise).
    #[arg(long)]
    duration: Option<f64>,

    /// Write processed frames as a multipart MJPEG stream to this file.
    #[arg(long)]
    mjpeg_out: Option<PathBuf>,

    /// Save the last processed frame as a JPEG on exit.
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Append emotion records to this JSON-lines file.
    #[arg(long)]
    store: Option<PathBuf>,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;

    let mut config = StreamConfig::load(cli.config.as_deref())?;
    if let Some(device) = &cli.device {
        config.camera_device = device.clone();
    }
    if let Some(kind) = cli.detector {
        config.detector = kind;
    }
    prefetch_detector_model(&config)?;

    let gateway = match &cli.store {
        Some(path) => {
            let store: Arc<dyn EmotionRecordGateway> = Arc::new(JsonlRecordStore::open(path)?);
            Some(store)
        }
        None => None,
    };
    let deps = StreamDeps {
        camera: Arc::new(FfmpegCameraSource::new(
            config.camera_device.clone(),
            config.frame_width,
            config.frame_height,
        )),
        detectors: Arc::new(OnnxDetectorProvider::new(config.model_dirs.clone())),
        models: Arc::new(OnnxEmotionModelProvider::new(config.model_dirs.clone())),
        gateway,
    };

    let key = match &cli.user {
        Some(id) => StreamKey::User(id.clone()),
        None => StreamKey::Session(format!("cli-{}", process::id())),
    };
    let registry = StreamRegistry::new(config, deps)?;
    let stream = registry.acquire(key.clone())?;

    let outcome = watch(&stream, &cli);

    if let Some(path) = &cli.snapshot {
        fs::write(path, stream.get_jpeg(true))?;
        log::info!("Snapshot written to {}", path.display());
    }
    registry.release(&key)?;
    outcome
}

/// Polls the stream like a web client would until the duration elapses or
/// the stream fails.
fn watch(stream: &Stream, cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let deadline = cli
        .duration
        .map(|secs| Instant::now() + Duration::from_secs_f64(secs));
    let mut mjpeg = match &cli.mjpeg_out {
        Some(path) => Some(MjpegWriter::new(fs::File::create(path)?)),
        None => None,
    };
    let mut last_report = Instant::now();

    while deadline.map_or(true, |d| Instant::now() < d) {
        stream.check()?;
        if let Some(writer) = mjpeg.as_mut() {
            writer.write_frame(&stream.get_jpeg(true))?;
        }
        if last_report.elapsed() >= METRICS_PERIOD {
            last_report = Instant::now();
            report(stream)?;
        }
        thread::sleep(FRAME_PERIOD);
    }

    if let (Some(writer), Some(path)) = (mjpeg, &cli.mjpeg_out) {
        let parts = writer.parts();
        writer.finish()?;
        log::info!("Wrote {parts} MJPEG frames to {}", path.display());
    }
    Ok(())
}

fn report(stream: &Stream) -> Result<(), Box<dyn std::error::Error>> {
    let (emotions, dominant) = stream.current_emotions();
    let line = serde_json::json!({
        "status": stream.status(),
        "metrics": stream.get_metrics(),
        "faces": stream.observations().len(),
        "dominant": dominant.label(),
        "emotions": emotions,
    });
    log::info!("{}", serde_json::to_string(&line)?);
    Ok(())
}

fn prefetch_detector_model(config: &StreamConfig) -> Result<(), Box<dyn std::error::Error>> {
    let (name, url) = model_for(config.detector);
    log::info!("Resolving model: {name}");
    model_resolver::resolve(name, url, &config.model_dirs, Some(Box::new(download_progress)))?;
    if url.is_some() {
        eprintln!();
    }
    Ok(())
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(secs) = cli.duration {
        if !(secs > 0.0 && secs.is_finite()) {
            return Err(format!("Duration must be a positive number of seconds, got {secs}").into());
        }
    }
    if cli.user.is_some() && cli.store.is_none() {
        log::warn!("--user given without --store; results will not be persisted");
    }
    Ok(())
}

fn download_progress(downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading face detection model... {pct}%");
    } else {
        eprint!("\rDownloading face detection model... {downloaded} bytes");
    }
}
