use std::collections::BTreeMap;
use std::time::Instant;

/// Cross-cutting logger for watch-loop events.
///
/// Keeps the loop free of output concerns: the CLI reports stage timings,
/// tests and embedders can stay silent.
pub trait PipelineLogger: Send {
    /// Called after every completed cycle with the running cycle count.
    fn progress(&mut self, cycles: usize);

    /// How long a named stage (`capture`, `detect`, `annotate`) took for one cycle.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// A point-in-time measurement such as the number of faces in a frame.
    fn metric(&mut self, name: &str, value: f64);

    fn info(&mut self, message: &str);

    /// End-of-run report. Default: no-op.
    fn summary(&self) {}
}

/// Discards all events.
pub struct NullPipelineLogger;

impl PipelineLogger for NullPipelineLogger {
    fn progress(&mut self, _cycles: usize) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
    fn info(&mut self, _message: &str) {}
}

#[derive(Default)]
struct Samples {
    count: usize,
    total: f64,
    max: f64,
}

impl Samples {
    fn push(&mut self, value: f64) {
        self.count += 1;
        self.total += value;
        self.max = self.max.max(value);
    }

    fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total / self.count as f64
        }
    }
}

/// Logs periodic progress through the `log` crate and prints per-stage
/// timings when the run ends.
pub struct StdoutPipelineLogger {
    report_every: usize,
    timings: BTreeMap<String, Samples>,
    metrics: BTreeMap<String, Samples>,
    started: Instant,
    cycles: usize,
}

impl StdoutPipelineLogger {
    pub fn new(report_every: usize) -> Self {
        Self {
            report_every: report_every.max(1),
            timings: BTreeMap::new(),
            metrics: BTreeMap::new(),
            started: Instant::now(),
            cycles: 0,
        }
    }

    /// Formatted report, or `None` if nothing was recorded.
    pub fn summary_string(&self) -> Option<String> {
        if self.timings.is_empty() && self.metrics.is_empty() {
            return None;
        }

        let elapsed_s = self.started.elapsed().as_secs_f64();
        let mut lines = vec![format!(
            "Watch summary ({} cycles in {elapsed_s:.1}s):",
            self.cycles
        )];

        for (stage, samples) in &self.timings {
            lines.push(format!(
                "  {stage:10} avg {:6.1}ms  max {:6.1}ms",
                samples.mean(),
                samples.max
            ));
        }
        for (name, samples) in &self.metrics {
            lines.push(format!(
                "  {name:10} avg {:.1}  max {:.0}",
                samples.mean(),
                samples.max
            ));
        }
        if self.cycles > 0 && elapsed_s > 0.0 {
            lines.push(format!(
                "  rate       {:.1} cycles/s",
                self.cycles as f64 / elapsed_s
            ));
        }

        Some(lines.join("\n"))
    }

    pub fn timing_mean(&self, stage: &str) -> Option<f64> {
        self.timings.get(stage).map(Samples::mean)
    }

    pub fn metric_mean(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).map(Samples::mean)
    }
}

impl Default for StdoutPipelineLogger {
    fn default() -> Self {
        Self::new(50)
    }
}

impl PipelineLogger for StdoutPipelineLogger {
    fn progress(&mut self, cycles: usize) {
        self.cycles = cycles;
        if cycles % self.report_every == 0 {
            log::info!("Watched {cycles} cycles");
        }
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        self.timings.entry(stage.to_string()).or_default().push(duration_ms);
    }

    fn metric(&mut self, name: &str, value: f64) {
        self.metrics.entry(name.to_string()).or_default().push(value);
    }

    fn info(&mut self, message: &str) {
        log::info!("{message}");
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n{text}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_null_logger_accepts_everything() {
        let mut logger = NullPipelineLogger;
        logger.progress(1);
        logger.timing("detect", 5.0);
        logger.metric("faces", 2.0);
        logger.info("hello");
        logger.summary();
    }

    #[test]
    fn test_timing_mean_per_stage() {
        let mut logger = StdoutPipelineLogger::new(10);
        logger.timing("detect", 20.0);
        logger.timing("detect", 40.0);
        logger.timing("capture", 5.0);

        assert_relative_eq!(logger.timing_mean("detect").unwrap(), 30.0);
        assert_relative_eq!(logger.timing_mean("capture").unwrap(), 5.0);
        assert!(logger.timing_mean("annotate").is_none());
    }

    #[test]
    fn test_metric_mean() {
        let mut logger = StdoutPipelineLogger::new(10);
        logger.metric("faces", 1.0);
        logger.metric("faces", 2.0);
        assert_relative_eq!(logger.metric_mean("faces").unwrap(), 1.5);
    }

    #[test]
    fn test_summary_lists_stages_and_metrics() {
        let mut logger = StdoutPipelineLogger::new(10);
        logger.progress(4);
        logger.timing("detect", 12.0);
        logger.timing("annotate", 1.0);
        logger.metric("faces", 3.0);

        let summary = logger.summary_string().unwrap();
        assert!(summary.starts_with("Watch summary (4 cycles"));
        assert!(summary.contains("detect"));
        assert!(summary.contains("annotate"));
        assert!(summary.contains("faces"));
    }

    #[test]
    fn test_empty_summary_is_none() {
        assert!(StdoutPipelineLogger::default().summary_string().is_none());
    }

    #[test]
    fn test_report_interval_never_zero() {
        let mut logger = StdoutPipelineLogger::new(0);
        logger.progress(1);
        assert_eq!(logger.report_every, 1);
        assert_eq!(logger.cycles, 1);
    }
}
