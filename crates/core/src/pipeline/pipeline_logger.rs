use std::collections::BTreeMap;
use std::time::Instant;

/// Observer for pipeline progress, stage timings and metrics.
///
/// Lets the streaming loop and the offline job report what they are doing
/// without knowing where the report goes.
pub trait PipelineLogger: Send {
    /// Frame-level progress. `total` is 0 for live sources.
    fn progress(&mut self, current: usize, total: usize);

    /// How long a named stage took for one frame.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// A point-in-time measurement (detections per frame, clients, ...).
    fn metric(&mut self, name: &str, value: f64);

    fn info(&mut self, message: &str);

    /// Final digest. Default: no-op.
    fn summary(&self) {}
}

/// Discards everything. Used by tests.
pub struct NullPipelineLogger;

impl PipelineLogger for NullPipelineLogger {
    fn progress(&mut self, _current: usize, _total: usize) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
    fn info(&mut self, _message: &str) {}
}

#[derive(Debug, Default, Clone, Copy)]
struct Stat {
    count: u64,
    sum: f64,
    max: f64,
}

impl Stat {
    fn record(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        self.max = self.max.max(value);
    }

    fn avg(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }
}

/// Aggregates timings and metrics and reports through the `log` facade.
///
/// Every `report_every` frames a one-line throughput digest is logged;
/// `summary` logs the full per-stage table.
pub struct LogPipelineLogger {
    report_every: usize,
    timings: BTreeMap<String, Stat>,
    metrics: BTreeMap<String, Stat>,
    start_time: Instant,
    frames: usize,
}

impl LogPipelineLogger {
    pub fn new(report_every: usize) -> Self {
        Self {
            report_every: report_every.max(1),
            timings: BTreeMap::new(),
            metrics: BTreeMap::new(),
            start_time: Instant::now(),
            frames: 0,
        }
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Average duration of a stage, if it was ever recorded.
    pub fn average_ms(&self, stage: &str) -> Option<f64> {
        self.timings.get(stage).map(Stat::avg)
    }

    pub fn metric_average(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).map(Stat::avg)
    }

    fn fps(&self) -> f64 {
        let secs = self.start_time.elapsed().as_secs_f64();
        if secs > 0.0 {
            self.frames as f64 / secs
        } else {
            0.0
        }
    }

    /// Formatted digest, or `None` when nothing was recorded.
    pub fn summary_string(&self) -> Option<String> {
        if self.timings.is_empty() && self.metrics.is_empty() {
            return None;
        }

        let elapsed_ms = self.start_time.elapsed().as_secs_f64() * 1000.0;
        let mut lines = vec![format!(
            "Pipeline summary ({} frames, {:.1}s total):",
            self.frames,
            elapsed_ms / 1000.0
        )];

        for (stage, stat) in &self.timings {
            let pct = if elapsed_ms > 0.0 {
                stat.sum / elapsed_ms * 100.0
            } else {
                0.0
            };
            lines.push(format!(
                "  {stage:10}: avg {:6.1}ms  max {:6.1}ms  total {:7.0}ms  ({pct:4.1}%)",
                stat.avg(),
                stat.max,
                stat.sum
            ));
        }
        for (name, stat) in &self.metrics {
            lines.push(format!("  {name}: avg {:.1}", stat.avg()));
        }
        if self.frames > 0 {
            lines.push(format!("  Throughput: {:.1} fps", self.fps()));
        }

        Some(lines.join("\n"))
    }
}

impl Default for LogPipelineLogger {
    fn default() -> Self {
        Self::new(100)
    }
}

impl PipelineLogger for LogPipelineLogger {
    fn progress(&mut self, current: usize, total: usize) {
        self.frames = current;
        if current % self.report_every != 0 && current != total {
            return;
        }
        if total > 0 {
            let pct = current as f64 / total as f64 * 100.0;
            log::info!("Processing: {current}/{total} frames ({pct:.1}%)");
        } else {
            let detect = self.average_ms("detect").unwrap_or(0.0);
            log::info!(
                "Streamed {current} frames ({:.1} fps, detect avg {detect:.1}ms)",
                self.fps()
            );
        }
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        self.timings
            .entry(stage.to_string())
            .or_default()
            .record(duration_ms);
    }

    fn metric(&mut self, name: &str, value: f64) {
        self.metrics.entry(name.to_string()).or_default().record(value);
    }

    fn info(&mut self, message: &str) {
        log::info!("{message}");
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n\n{text}");
        }
    }
}
