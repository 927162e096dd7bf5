use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::alerting::alert_state_machine::{AlertEvent, AlertStateMachine};
use crate::alerting::summary::SummaryAccumulator;
use crate::annotation::domain::frame_counts::FrameCounts;
use crate::annotation::infrastructure::frame_annotator::FrameAnnotator;
use crate::broadcast::broadcast_hub::BroadcastHub;
use crate::capture::domain::capture_demand::CaptureDemand;
use crate::capture::domain::capture_source::{CaptureError, CaptureSource};
use crate::detection::domain::detector::Detector;
use crate::encoding::domain::frame_encoder::FrameEncoder;
use crate::shared::supervised_task::{ShutdownSignal, SupervisedTask};

use super::frame_decimator::FrameDecimator;
use super::pipeline_logger::PipelineLogger;

/// After this many failed reads in a row the capture is released and
/// reopened on the next iteration.
const MAX_CONSECUTIVE_READ_FAILURES: u32 = 100;

#[derive(Debug, Clone)]
pub struct StreamingOptions {
    /// Target wall-clock period of one processed iteration.
    pub frame_interval: Duration,
    /// Pause while idle or while no capture source can be opened.
    pub idle_retry: Duration,
    /// Pause after a failed or degenerate frame read.
    pub glitch_retry: Duration,
    pub decimation: usize,
}

impl Default for StreamingOptions {
    fn default() -> Self {
        Self {
            frame_interval: Duration::from_millis(30),
            idle_retry: Duration::from_secs(1),
            glitch_retry: Duration::from_millis(10),
            decimation: 3,
        }
    }
}

/// What one iteration of the loop did.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// Nobody has asked for the stream yet.
    Idle,
    CaptureUnavailable,
    /// Read failed or the frame was degenerate.
    Skipped,
    Decimated,
    DetectorFailed,
    Processed {
        counts: FrameCounts,
        events: Vec<AlertEvent>,
        /// Whether an encoded frame went out to the hub.
        frame_sent: bool,
    },
}

/// Capture → detect → annotate → alert → encode → broadcast, on a fixed cadence.
///
/// Owns the capture source exclusively; it is released when `run` returns
/// and again, if still open, when the loop is dropped.
pub struct StreamingLoop {
    capture: Box<dyn CaptureSource>,
    demand: CaptureDemand,
    detector: Box<dyn Detector>,
    annotator: FrameAnnotator,
    alerts: AlertStateMachine,
    accumulator: SummaryAccumulator,
    encoder: Box<dyn FrameEncoder>,
    hub: Arc<BroadcastHub>,
    decimator: FrameDecimator,
    logger: Box<dyn PipelineLogger>,
    options: StreamingOptions,
    processed: usize,
    read_failures: u32,
}

impl StreamingLoop {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        capture: Box<dyn CaptureSource>,
        demand: CaptureDemand,
        detector: Box<dyn Detector>,
        annotator: FrameAnnotator,
        alerts: AlertStateMachine,
        accumulator: SummaryAccumulator,
        encoder: Box<dyn FrameEncoder>,
        hub: Arc<BroadcastHub>,
        logger: Box<dyn PipelineLogger>,
        options: StreamingOptions,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let decimator = FrameDecimator::new(options.decimation)?;
        Ok(Self {
            capture,
            demand,
            detector,
            annotator,
            alerts,
            accumulator,
            encoder,
            hub,
            decimator,
            logger,
            options,
            processed: 0,
            read_failures: 0,
        })
    }

    pub fn processed(&self) -> usize {
        self.processed
    }

    /// Run one iteration without sleeping.
    pub fn step(&mut self) -> StepOutcome {
        if !self.demand.is_requested() {
            return StepOutcome::Idle;
        }

        if !self.capture.is_open() {
            if let Err(e) = self.capture.open() {
                log::debug!("Capture unavailable: {e}");
                return StepOutcome::CaptureUnavailable;
            }
            self.read_failures = 0;
        }

        let t0 = Instant::now();
        let mut frame = match self.capture.read() {
            Ok(frame) => frame,
            Err(CaptureError::EndOfStream) => {
                log::info!("Capture reached end of stream, restarting");
                self.capture.release();
                return StepOutcome::Skipped;
            }
            Err(e) => {
                self.note_read_failure(&e);
                return StepOutcome::Skipped;
            }
        };
        if frame.is_blank() {
            self.note_read_failure(&CaptureError::Read("blank frame".into()));
            return StepOutcome::Skipped;
        }
        self.read_failures = 0;

        if !self.decimator.admit() {
            return StepOutcome::Decimated;
        }
        self.logger.timing("capture", ms_since(t0));

        let t1 = Instant::now();
        let detections = match self.detector.detect(&frame) {
            Ok(detections) => detections,
            Err(e) => {
                log::warn!("Detection failed on frame {}: {e}", frame.index());
                return StepOutcome::DetectorFailed;
            }
        };
        let detect_time = t1.elapsed();
        self.logger.timing("detect", detect_time.as_secs_f64() * 1000.0);
        self.logger.metric("detections", detections.len() as f64);

        let t2 = Instant::now();
        let counts = self.annotator.annotate(&mut frame, &detections);
        self.annotator.draw_fps(&mut frame, detector_fps(detect_time));
        self.logger.timing("annotate", ms_since(t2));

        self.accumulator.record(counts);
        let events = self.alerts.evaluate(counts);
        for event in &events {
            self.hub.broadcast_text(event.as_message());
        }

        // Nobody to send to: skip the encode entirely
        let frame_sent = if self.hub.is_empty() {
            false
        } else {
            let t3 = Instant::now();
            match self.encoder.encode(&frame) {
                Ok(bytes) => {
                    self.logger.timing("encode", ms_since(t3));
                    let t4 = Instant::now();
                    let delivered = self.hub.broadcast_binary(Arc::from(bytes));
                    self.logger.timing("broadcast", ms_since(t4));
                    self.logger.metric("clients", delivered as f64);
                    true
                }
                Err(e) => {
                    log::warn!("Encoding frame {} failed: {e}", frame.index());
                    false
                }
            }
        };

        self.processed += 1;
        self.logger.progress(self.processed, 0);
        StepOutcome::Processed {
            counts,
            events,
            frame_sent,
        }
    }

    /// How long to wait after an iteration that took `elapsed`.
    pub fn pause_after(&self, outcome: &StepOutcome, elapsed: Duration) -> Duration {
        match outcome {
            StepOutcome::Idle | StepOutcome::CaptureUnavailable => self.options.idle_retry,
            StepOutcome::Skipped => self.options.glitch_retry,
            StepOutcome::Decimated => Duration::ZERO,
            StepOutcome::DetectorFailed | StepOutcome::Processed { .. } => {
                self.options.frame_interval.saturating_sub(elapsed)
            }
        }
    }

    /// Loop until shutdown is signalled, then release the capture.
    ///
    /// Returns the number of processed frames.
    pub fn run(&mut self, signal: &ShutdownSignal) -> usize {
        log::info!("Streaming loop started");
        while !signal.is_requested() {
            let started = Instant::now();
            let outcome = self.step();
            let pause = self.pause_after(&outcome, started.elapsed());
            if !pause.is_zero() && signal.wait(pause) {
                break;
            }
        }
        self.capture.release();
        self.logger.summary();
        log::info!("Streaming loop stopped after {} frames", self.processed);
        self.processed
    }

    /// Run on a dedicated thread until the returned task is stopped.
    pub fn spawn(mut self) -> std::io::Result<SupervisedTask<usize>> {
        SupervisedTask::spawn("streaming", move |signal| self.run(&signal))
    }

    fn note_read_failure(&mut self, error: &CaptureError) {
        self.read_failures += 1;
        log::debug!("Skipping frame: {error}");
        if self.read_failures >= MAX_CONSECUTIVE_READ_FAILURES {
            log::warn!(
                "{} consecutive bad reads, reopening capture",
                self.read_failures
            );
            self.capture.release();
            self.read_failures = 0;
        }
    }
}

impl Drop for StreamingLoop {
    fn drop(&mut self) {
        if self.capture.is_open() {
            self.capture.release();
        }
    }
}

/// Frames per second the detector alone could sustain.
fn detector_fps(detect_time: Duration) -> u32 {
    let secs = detect_time.as_secs_f64();
    if secs <= 0.0 {
        return 0;
    }
    (1.0 / secs).min(u32::MAX as f64) as u32
}

fn ms_since(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}
