use std::path::Path;
use std::time::Instant;

use crate::annotation::domain::frame_counts::FrameCounts;
use crate::annotation::infrastructure::frame_annotator::FrameAnnotator;
use crate::capture::domain::capture_source::{CaptureError, CaptureSource};
use crate::detection::domain::detector::Detector;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_writer::VideoWriter;

use super::pipeline_logger::PipelineLogger;

pub const DEFAULT_ANNOTATE_SIZE: u32 = 640;

/// Totals for one annotated video.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnnotateReport {
    pub frames: usize,
    pub totals: FrameCounts,
    /// Frames written without overlay because detection failed.
    pub detector_failures: usize,
}

/// Offline job: every frame of a video is squared to `size`, annotated and
/// re-encoded.
///
/// Single-use: `execute` consumes the owned components.
pub struct AnnotateVideoUseCase {
    capture: Option<Box<dyn CaptureSource>>,
    writer: Option<Box<dyn VideoWriter>>,
    detector: Box<dyn Detector>,
    annotator: FrameAnnotator,
    logger: Box<dyn PipelineLogger>,
    size: u32,
}

impl AnnotateVideoUseCase {
    pub fn new(
        capture: Box<dyn CaptureSource>,
        writer: Box<dyn VideoWriter>,
        detector: Box<dyn Detector>,
        annotator: FrameAnnotator,
        logger: Box<dyn PipelineLogger>,
        size: Option<u32>,
    ) -> Self {
        Self {
            capture: Some(capture),
            writer: Some(writer),
            detector,
            annotator,
            logger,
            size: size.unwrap_or(DEFAULT_ANNOTATE_SIZE),
        }
    }

    pub fn execute(
        &mut self,
        metadata: &VideoMetadata,
        output_path: &Path,
    ) -> Result<AnnotateReport, Box<dyn std::error::Error>> {
        if self.size == 0 {
            return Err("annotation size must be > 0".into());
        }
        let mut capture = self.capture.take().ok_or("Annotation already executed")?;
        let mut writer = self.writer.take().ok_or("Annotation already executed")?;

        if !capture.is_open() {
            capture.open()?;
        }
        writer.open(output_path, &metadata.with_size(self.size, self.size))?;

        let result = self.annotate_all(capture.as_mut(), writer.as_mut(), metadata.total_frames);
        let closed = writer.close();
        capture.release();

        let report = result?;
        closed?;

        self.logger.summary();
        self.logger.info(&format!(
            "Annotated {} frames: {} masked, {} unmasked detections",
            report.frames, report.totals.masked, report.totals.unmasked
        ));
        Ok(report)
    }

    fn annotate_all(
        &mut self,
        capture: &mut dyn CaptureSource,
        writer: &mut dyn VideoWriter,
        total_frames: usize,
    ) -> Result<AnnotateReport, Box<dyn std::error::Error>> {
        let mut report = AnnotateReport::default();

        loop {
            let frame = match capture.read() {
                Ok(frame) => frame,
                Err(CaptureError::EndOfStream) => break,
                Err(CaptureError::Read(e)) => {
                    log::warn!("Skipping unreadable frame: {e}");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let mut frame = frame
                .resized(self.size, self.size)
                .ok_or_else(|| format!("frame {} is not RGB", frame.index()))?;

            let t0 = Instant::now();
            match self.detector.detect(&frame) {
                Ok(detections) => {
                    self.logger
                        .timing("detect", t0.elapsed().as_secs_f64() * 1000.0);
                    let t1 = Instant::now();
                    report.totals += self.annotator.annotate(&mut frame, &detections);
                    self.logger
                        .timing("annotate", t1.elapsed().as_secs_f64() * 1000.0);
                }
                Err(e) => {
                    log::warn!("Detection failed on frame {}: {e}", frame.index());
                    report.detector_failures += 1;
                }
            }

            let t2 = Instant::now();
            writer.write(&frame)?;
            self.logger
                .timing("write", t2.elapsed().as_secs_f64() * 1000.0);

            report.frames += 1;
            self.logger
                .progress(report.frames, total_frames.max(report.frames));
        }

        Ok(report)
    }
}
