mod web;

use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use maskwatch_core::alerting::alert_state_machine::AlertStateMachine;
use maskwatch_core::alerting::summary::{SummaryAccumulator, SummaryTask};
use maskwatch_core::annotation::infrastructure::frame_annotator::FrameAnnotator;
use maskwatch_core::annotation::infrastructure::label_font::LabelFont;
use maskwatch_core::broadcast::broadcast_hub::BroadcastHub;
use maskwatch_core::capture::domain::capture_demand::CaptureDemand;
use maskwatch_core::capture::domain::capture_source::CaptureSource;
use maskwatch_core::capture::domain::capture_target::CaptureTarget;
use maskwatch_core::capture::infrastructure::ffmpeg_capture::{CaptureOptions, FfmpegCapture};
use maskwatch_core::config::MaskwatchConfig;
use maskwatch_core::detection::domain::detector::Detector;
use maskwatch_core::detection::infrastructure::model_resolver::{self, ModelLocation};
use maskwatch_core::detection::infrastructure::onnx_yolo_detector::OnnxYoloDetector;
use maskwatch_core::encoding::infrastructure::jpeg_frame_encoder::JpegFrameEncoder;
use maskwatch_core::pipeline::annotate_video_use_case::{
    AnnotateVideoUseCase, DEFAULT_ANNOTATE_SIZE,
};
use maskwatch_core::pipeline::pipeline_logger::LogPipelineLogger;
use maskwatch_core::pipeline::streaming_loop::StreamingLoop;
use maskwatch_core::shared::constants::{BUNDLED_MODEL_DIR, MODEL_NAME, VIDEO_EXTENSIONS};
use maskwatch_core::video::infrastructure::ffmpeg_writer::FfmpegWriter;

use web::AppState;

/// Live face-mask detection with a browser viewer.
#[derive(Parser)]
#[command(name = "maskwatch", version)]
struct Cli {
    /// JSON config file (defaults to the platform config directory).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// ONNX model file; overrides model resolution.
    #[arg(long, global = true)]
    model: Option<PathBuf>,

    /// Detection confidence threshold (0.0-1.0).
    #[arg(long, global = true)]
    confidence: Option<f64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Stream annotated frames and alerts to browsers.
    Serve {
        /// Listen address, e.g. 0.0.0.0:8000.
        #[arg(long)]
        bind: Option<String>,

        /// `camera`, `camera:1`, `camera:0,2`, or a video file path.
        #[arg(long)]
        source: Option<String>,

        /// Unmasked faces needed to enter high-risk mode.
        #[arg(long)]
        threshold: Option<u32>,

        /// Process every Nth captured frame.
        #[arg(long)]
        decimation: Option<usize>,

        /// Open the capture at start-up instead of on the first page visit.
        #[arg(long)]
        eager: bool,
    },
    /// Annotate a video file offline.
    Annotate {
        input: PathBuf,
        output: PathBuf,

        /// Output frames are resized to size x size.
        #[arg(long, default_value_t = DEFAULT_ANNOTATE_SIZE)]
        size: u32,
    },
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
    let mut config = MaskwatchConfig::load(cli.config.as_deref())?;
    if let Some(model) = cli.model {
        config.detector.model_path = Some(model);
    }
    if let Some(confidence) = cli.confidence {
        config.detector.confidence = confidence;
    }

    match cli.command {
        Command::Serve {
            bind,
            source,
            threshold,
            decimation,
            eager,
        } => {
            if let Some(bind) = bind {
                config.server.bind_addr = bind;
            }
            if let Some(source) = source {
                config.capture.source = CaptureTarget::parse(&source);
            }
            if let Some(threshold) = threshold {
                config.alert.threshold = threshold;
            }
            if let Some(decimation) = decimation {
                config.stream.decimation = decimation;
            }
            if eager {
                config.capture.open_on_demand = false;
            }
            config.validate()?;
            run_serve(&config)
        }
        Command::Annotate {
            input,
            output,
            size,
        } => {
            config.validate()?;
            run_annotate(&config, &input, &output, size)
        }
    }
}

fn run_serve(config: &MaskwatchConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = config.bind_addr()?;
    let detector = build_detector(config)?;
    let annotator = build_annotator(config)?;

    let hub = Arc::new(BroadcastHub::new());
    let demand = if config.capture.open_on_demand {
        CaptureDemand::on_demand()
    } else {
        CaptureDemand::immediate()
    };
    let accumulator = SummaryAccumulator::new();

    log::info!("Capture source: {}", config.capture.source);
    let capture = FfmpegCapture::new(config.capture.source.clone(), config.capture_options());
    let streaming = StreamingLoop::new(
        Box::new(capture),
        demand.clone(),
        detector,
        annotator,
        AlertStateMachine::new(config.alert.threshold),
        accumulator.clone(),
        Box::new(JpegFrameEncoder::new(
            config.stream.transmit_width,
            config.stream.transmit_height,
            config.stream.jpeg_quality,
        )),
        Arc::clone(&hub),
        Box::new(LogPipelineLogger::default()),
        config.streaming_options(),
    )?
    .spawn()?;

    let summary_hub = Arc::clone(&hub);
    let summary = SummaryTask::spawn(accumulator, config.summary_interval(), move |text| {
        summary_hub.broadcast_text(&text);
    })?;

    let state = AppState {
        hub,
        demand,
        client_queue: config.server.client_queue,
    };
    let runtime = tokio::runtime::Runtime::new()?;
    let served = runtime.block_on(web::serve(addr, state));

    streaming.stop();
    summary.stop();
    served?;
    Ok(())
}

fn run_annotate(
    config: &MaskwatchConfig,
    input: &Path,
    output: &Path,
    size: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    if !input.exists() {
        return Err(format!("Input file not found: {}", input.display()).into());
    }
    if !is_video(input) {
        log::warn!("{} does not look like a video file", input.display());
    }
    if size == 0 {
        return Err("--size must be > 0".into());
    }

    let detector = build_detector(config)?;
    let annotator = build_annotator(config)?;

    let mut capture = FfmpegCapture::new(
        CaptureTarget::File {
            path: input.to_path_buf(),
        },
        CaptureOptions::default(),
    );
    capture.open()?;
    let metadata = capture
        .metadata()
        .cloned()
        .ok_or("capture opened without stream metadata")?;

    let mut use_case = AnnotateVideoUseCase::new(
        Box::new(capture),
        Box::new(FfmpegWriter::new()),
        detector,
        annotator,
        Box::new(LogPipelineLogger::new(50)),
        Some(size),
    );
    let report = use_case.execute(&metadata, output)?;
    if report.detector_failures > 0 {
        log::warn!(
            "{} frames written without annotations",
            report.detector_failures
        );
    }
    log::info!("Output written to {}", output.display());
    Ok(())
}

fn build_detector(config: &MaskwatchConfig) -> Result<Box<dyn Detector>, Box<dyn std::error::Error>> {
    let location = ModelLocation {
        explicit: config.detector.model_path.as_deref(),
        name: MODEL_NAME,
        url: config.detector.model_url.as_deref(),
        bundled_dir: Some(Path::new(BUNDLED_MODEL_DIR)),
    };
    let model_path = model_resolver::resolve(&location, Some(Box::new(download_progress)))?;
    log::info!("Using model {}", model_path.display());

    Ok(Box::new(OnnxYoloDetector::new(
        &model_path,
        config.detector.input_size,
        config.detector.confidence,
    )?))
}

fn build_annotator(config: &MaskwatchConfig) -> Result<FrameAnnotator, Box<dyn std::error::Error>> {
    let size = config.annotation.font_size;
    let font = match &config.annotation.font_path {
        Some(path) => Some(LabelFont::load(path, size)?),
        None => LabelFont::discover(size),
    };
    if font.is_none() {
        log::warn!("No label font found; labels are drawn without text");
    }
    Ok(FrameAnnotator::new(
        font,
        size,
        config.annotation.line_thickness,
    ))
}

fn is_video(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| VIDEO_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn download_progress(downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading mask detection model... {pct}%");
    } else {
        eprint!("\rDownloading mask detection model... {downloaded} bytes");
    }
}
