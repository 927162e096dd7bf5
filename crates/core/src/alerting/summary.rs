//! Rolling per-window totals and the task that publishes them.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crossbeam_channel::select;

use crate::annotation::domain::frame_counts::FrameCounts;
use crate::shared::supervised_task::SupervisedTask;

pub const DEFAULT_SUMMARY_INTERVAL: Duration = Duration::from_secs(5);

/// Counts summed across every processed frame since the last drain.
///
/// Cloning shares the underlying totals.
#[derive(Clone, Debug, Default)]
pub struct SummaryAccumulator {
    totals: Arc<Mutex<FrameCounts>>,
}

impl SummaryAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, counts: FrameCounts) {
        let mut totals = self.totals.lock().unwrap_or_else(|e| e.into_inner());
        *totals += counts;
    }

    /// Take the window's totals and reset to zero in one step.
    pub fn drain(&self) -> FrameCounts {
        let mut totals = self.totals.lock().unwrap_or_else(|e| e.into_inner());
        std::mem::take(&mut *totals)
    }
}

/// Viewer text for one summary window.
pub fn format_summary(totals: FrameCounts, interval: Duration) -> String {
    format!(
        "Summary (last {}):\nMasked: {}\nUnmasked: {}",
        window_label(interval),
        totals.masked,
        totals.unmasked
    )
}

/// Whole seconds read as `5 sec`; anything else falls back to milliseconds.
fn window_label(interval: Duration) -> String {
    if interval.as_secs() > 0 && interval.subsec_millis() == 0 {
        format!("{} sec", interval.as_secs())
    } else {
        format!("{} ms", interval.as_millis())
    }
}

pub struct SummaryTask;

impl SummaryTask {
    /// Publish a summary every `interval` until stopped.
    ///
    /// Empty windows still publish a zero summary. The task returns how many
    /// summaries it published.
    pub fn spawn<F>(
        accumulator: SummaryAccumulator,
        interval: Duration,
        mut publish: F,
    ) -> std::io::Result<SupervisedTask<u64>>
    where
        F: FnMut(String) + Send + 'static,
    {
        SupervisedTask::spawn("summary", move |signal| {
            let ticker = crossbeam_channel::tick(interval);
            let mut published = 0u64;
            loop {
                select! {
                    recv(ticker) -> _ => {
                        let totals = accumulator.drain();
                        log::debug!(
                            "Summary window: {} masked, {} unmasked",
                            totals.masked,
                            totals.unmasked
                        );
                        publish(format_summary(totals, interval));
                        published += 1;
                    }
                    recv(signal.receiver()) -> _ => break,
                }
            }
            published
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::time::Instant;

    #[test]
    fn test_drain_sums_then_resets() {
        let acc = SummaryAccumulator::new();
        acc.record(FrameCounts::new(1, 0));
        acc.record(FrameCounts::new(2, 3));

        assert_eq!(acc.drain(), FrameCounts::new(3, 3));
        assert_eq!(acc.drain(), FrameCounts::default());
    }

    #[test]
    fn test_clones_share_totals() {
        let acc = SummaryAccumulator::new();
        let writer = acc.clone();
        writer.record(FrameCounts::new(0, 4));
        assert_eq!(acc.drain(), FrameCounts::new(0, 4));
    }

    #[test]
    fn test_format_summary() {
        let text = format_summary(FrameCounts::new(12, 3), Duration::from_secs(5));
        assert_eq!(text, "Summary (last 5 sec):\nMasked: 12\nUnmasked: 3");
    }

    #[rstest]
    #[case(Duration::from_millis(500), "Summary (last 500 ms):")]
    #[case(Duration::from_millis(1500), "Summary (last 1500 ms):")]
    #[case(Duration::from_secs(10), "Summary (last 10 sec):")]
    fn test_summary_window_label(#[case] interval: Duration, #[case] heading: &str) {
        let text = format_summary(FrameCounts::default(), interval);
        assert_eq!(text.lines().next(), Some(heading));
    }

    #[test]
    fn test_task_publishes_zero_summaries_when_idle() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let task = SummaryTask::spawn(
            SummaryAccumulator::new(),
            Duration::from_millis(20),
            move |text| {
                let _ = tx.send(text);
            },
        )
        .unwrap();

        let first = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(first.ends_with("Masked: 0\nUnmasked: 0"));
        assert!(task.stop().unwrap() >= 1);
    }

    #[test]
    fn test_task_publishes_recorded_counts_and_resets() {
        let acc = SummaryAccumulator::new();
        acc.record(FrameCounts::new(2, 1));
        let (tx, rx) = crossbeam_channel::unbounded();
        let task = SummaryTask::spawn(acc.clone(), Duration::from_millis(20), move |text| {
            let _ = tx.send(text);
        })
        .unwrap();

        let first = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(first.contains("Masked: 2\nUnmasked: 1"));
        let second = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(second.contains("Masked: 0\nUnmasked: 0"));
        drop(task);
    }

    #[test]
    fn test_stop_is_prompt_with_long_interval() {
        let task = SummaryTask::spawn(
            SummaryAccumulator::new(),
            Duration::from_secs(3600),
            |_| {},
        )
        .unwrap();
        let start = Instant::now();
        assert_eq!(task.stop(), Some(0));
        assert!(start.elapsed() < Duration::from_secs(5));
    }
}
