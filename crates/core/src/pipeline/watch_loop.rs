use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crossbeam_channel::{SendTimeoutError, Sender};

use crate::annotation::domain::annotator::annotate;
use crate::capture::domain::capture_source::{CaptureError, CaptureSource};
use crate::pipeline::detection_strategy::DetectionStrategy;
use crate::pipeline::pipeline_executor::PipelineConfig;
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::pipeline::pipeline_state::{PipelineState, StateCell};
use crate::shared::frame::Frame;

/// Shortest wait between cancellation checks while the hand-off is full.
const MIN_HANDOFF_PATIENCE: Duration = Duration::from_millis(10);
/// How long a terminal notification may wait for room in the hand-off.
const TERMINAL_NOTICE_TIMEOUT: Duration = Duration::from_secs(1);

/// An annotated frame ready for display.
#[derive(Clone, Debug)]
pub struct DisplayUpdate {
    pub frame: Frame,
    pub summary: String,
    pub face_count: usize,
}

/// Everything the producer tells the presentation side, in order.
#[derive(Clone, Debug)]
pub enum WatchMessage {
    /// Device open and producer running.
    Ready { device: String },
    Frame(DisplayUpdate),
    Faulted(String),
    Stopped,
}

/// What a finished run looked like.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PipelineReport {
    pub final_state: PipelineState,
    pub cycles: usize,
    pub frames_delivered: usize,
    pub transient_failures: usize,
    pub fault: Option<String>,
}

impl PipelineReport {
    fn new() -> Self {
        Self {
            final_state: PipelineState::Running,
            cycles: 0,
            frames_delivered: 0,
            transient_failures: 0,
            fault: None,
        }
    }

    pub fn faulted(reason: impl Into<String>) -> Self {
        Self {
            final_state: PipelineState::Faulted,
            fault: Some(reason.into()),
            ..Self::new()
        }
    }
}

/// The device and detectors a run holds. Released exactly once, either
/// explicitly or when dropped.
pub struct PipelineResources {
    source: Box<dyn CaptureSource>,
    strategy: DetectionStrategy,
    released: bool,
}

impl PipelineResources {
    pub fn new(source: Box<dyn CaptureSource>, strategy: DetectionStrategy) -> Self {
        Self {
            source,
            strategy,
            released: false,
        }
    }

    pub fn source_mut(&mut self) -> &mut dyn CaptureSource {
        self.source.as_mut()
    }

    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.source.close();
        self.strategy.release();
        log::debug!("Released capture device and detectors");
    }
}

impl Drop for PipelineResources {
    fn drop(&mut self) {
        self.release();
    }
}

enum Delivery {
    Sent,
    Cancelled,
    Disconnected,
}

/// Runs capture → detect → annotate → deliver until cancelled, the source
/// ends, or the source fails for good. Blocks the calling thread.
pub fn run_watch_loop(
    mut resources: PipelineResources,
    config: &PipelineConfig,
    tx: &Sender<WatchMessage>,
    cancelled: &AtomicBool,
    state: &StateCell,
    logger: &mut dyn PipelineLogger,
) -> PipelineReport {
    let mut report = PipelineReport::new();
    let patience = config.interval.max(MIN_HANDOFF_PATIENCE);
    let mode = resources.strategy.mode();

    let ready = WatchMessage::Ready {
        device: resources.source.describe(),
    };
    let mut final_state = match deliver(tx, ready, cancelled, patience) {
        Delivery::Sent => None,
        Delivery::Cancelled | Delivery::Disconnected => Some(PipelineState::Stopped),
    };
    let mut consecutive_failures: u32 = 0;

    while final_state.is_none() {
        if cancelled.load(Ordering::SeqCst) {
            log::info!("Cancellation observed after {} cycles", report.cycles);
            final_state = Some(PipelineState::Stopped);
            break;
        }
        report.cycles += 1;

        let started = Instant::now();
        let frame = match resources.source.next_frame() {
            Ok(frame) => {
                consecutive_failures = 0;
                frame
            }
            Err(e) if e.is_transient() => {
                consecutive_failures += 1;
                report.transient_failures += 1;
                if consecutive_failures > config.max_consecutive_failures {
                    let reason = format!("{consecutive_failures} consecutive capture failures, last: {e}");
                    log::error!("{reason}");
                    report.fault = Some(reason);
                    final_state = Some(PipelineState::Faulted);
                    break;
                }
                log::warn!("Skipping cycle {}: {e}", report.cycles);
                std::thread::sleep(config.interval);
                continue;
            }
            Err(CaptureError::EndOfStream) => {
                log::info!("Capture source has no more frames");
                final_state = Some(PipelineState::Stopped);
                break;
            }
            Err(e) => {
                log::error!("Capture failed: {e}");
                report.fault = Some(e.to_string());
                final_state = Some(PipelineState::Faulted);
                break;
            }
        };
        logger.timing("capture", elapsed_ms(started));

        let started = Instant::now();
        let result = resources.strategy.detect(&frame);
        logger.timing("detect", elapsed_ms(started));
        logger.metric("faces", result.count() as f64);

        let started = Instant::now();
        let mut frame = frame;
        let summary = annotate(&mut frame, &result, mode);
        logger.timing("annotate", elapsed_ms(started));
        log::debug!("Frame {}: {summary}", frame.index());

        let update = DisplayUpdate {
            frame,
            summary,
            face_count: result.count(),
        };
        match deliver(tx, WatchMessage::Frame(update), cancelled, patience) {
            Delivery::Sent => report.frames_delivered += 1,
            Delivery::Cancelled => {
                final_state = Some(PipelineState::Stopped);
                break;
            }
            Delivery::Disconnected => {
                log::info!("Presentation side disconnected, stopping");
                final_state = Some(PipelineState::Stopped);
                break;
            }
        }
        logger.progress(report.cycles);

        if config
            .max_frames
            .is_some_and(|max| report.frames_delivered >= max)
        {
            log::info!("Delivered {} frames, stopping", report.frames_delivered);
            final_state = Some(PipelineState::Stopped);
            break;
        }

        std::thread::sleep(config.interval);
    }

    let final_state = final_state.unwrap_or(PipelineState::Stopped);
    resources.release();
    state.set(final_state);
    report.final_state = final_state;

    let notice = match &report.fault {
        Some(reason) => WatchMessage::Faulted(reason.clone()),
        None => WatchMessage::Stopped,
    };
    let _ = tx.send_timeout(notice, TERMINAL_NOTICE_TIMEOUT);

    logger.summary();
    report
}

/// Sends `message`, waiting for room while the run is still wanted.
fn deliver(
    tx: &Sender<WatchMessage>,
    message: WatchMessage,
    cancelled: &AtomicBool,
    patience: Duration,
) -> Delivery {
    let mut message = message;
    loop {
        match tx.send_timeout(message, patience) {
            Ok(()) => return Delivery::Sent,
            Err(SendTimeoutError::Disconnected(_)) => return Delivery::Disconnected,
            Err(SendTimeoutError::Timeout(returned)) => {
                if cancelled.load(Ordering::SeqCst) {
                    return Delivery::Cancelled;
                }
                message = returned;
            }
        }
    }
}

fn elapsed_ms(since: Instant) -> f64 {
    since.elapsed().as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::domain::capture_source::DeviceSelector;
    use crate::pipeline::pipeline_logger::{NullPipelineLogger, StdoutPipelineLogger};
    use crate::pipeline::test_support::{Counters, StubDetector, StubSource, WhenExhausted};
    use crate::shared::region::Region;

    fn config() -> PipelineConfig {
        PipelineConfig {
            interval: Duration::ZERO,
            ..Default::default()
        }
    }

    fn resources(mut source: StubSource, faces: Vec<Region>, counters: &Counters) -> PipelineResources {
        source.open(&DeviceSelector::Any).unwrap();
        let strategy = DetectionStrategy::single(Box::new(StubDetector::new(faces, counters.clone())));
        PipelineResources::new(Box::new(source), strategy)
    }

    fn run(resources: PipelineResources, config: &PipelineConfig) -> (PipelineReport, Vec<WatchMessage>, StateCell) {
        let (tx, rx) = crossbeam_channel::unbounded();
        let cancelled = AtomicBool::new(false);
        let state = StateCell::new(PipelineState::Running);
        let report = run_watch_loop(resources, config, &tx, &cancelled, &state, &mut NullPipelineLogger);
        drop(tx);
        (report, rx.iter().collect(), state)
    }

    fn frames(messages: &[WatchMessage]) -> Vec<&DisplayUpdate> {
        messages
            .iter()
            .filter_map(|m| match m {
                WatchMessage::Frame(update) => Some(update),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_delivers_frames_in_capture_order_then_stops() {
        let counters = Counters::default();
        let source = StubSource::frames(3, counters.clone());
        let (report, messages, state) = run(resources(source, vec![], &counters), &config());

        assert!(matches!(messages.first(), Some(WatchMessage::Ready { .. })));
        assert!(matches!(messages.last(), Some(WatchMessage::Stopped)));
        let indices: Vec<_> = frames(&messages).iter().map(|u| u.frame.index()).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(report.final_state, PipelineState::Stopped);
        assert_eq!(report.frames_delivered, 3);
        assert_eq!(state.get(), PipelineState::Stopped);
    }

    #[test]
    fn test_transient_failures_are_skipped_and_retried() {
        let counters = Counters::default();
        let script = vec![
            Err(CaptureError::Timeout),
            Err(CaptureError::EmptyFrame),
            Err(CaptureError::FrameDropped("corrupt".into())),
            Ok(()),
        ];
        let source = StubSource::new(script, WhenExhausted::EndOfStream, counters.clone());
        let (report, messages, _) = run(resources(source, vec![], &counters), &config());

        assert_eq!(report.transient_failures, 3);
        assert_eq!(report.frames_delivered, 1);
        assert_eq!(report.final_state, PipelineState::Stopped);
        assert!(report.fault.is_none());
        assert!(!messages.iter().any(|m| matches!(m, WatchMessage::Faulted(_))));
    }

    #[test]
    fn test_terminal_failure_faults_and_releases_once() {
        let counters = Counters::default();
        let script = vec![Ok(()), Err(CaptureError::DeviceLost("unplugged".into()))];
        let source = StubSource::new(script, WhenExhausted::Repeat, counters.clone());
        let (report, messages, state) = run(resources(source, vec![], &counters), &config());

        assert_eq!(report.final_state, PipelineState::Faulted);
        assert_eq!(state.get(), PipelineState::Faulted);
        assert!(report.fault.as_deref().unwrap().contains("unplugged"));
        assert!(matches!(messages.last(), Some(WatchMessage::Faulted(_))));
        assert_eq!(Counters::get(&counters.closes), 1);
        assert_eq!(Counters::get(&counters.releases), 1);
    }

    #[test]
    fn test_too_many_consecutive_transient_failures_fault() {
        let counters = Counters::default();
        let script = (0..5).map(|_| Err(CaptureError::Timeout)).collect();
        let source = StubSource::new(script, WhenExhausted::Repeat, counters.clone());
        let config = PipelineConfig {
            max_consecutive_failures: 3,
            ..config()
        };
        let (report, _, _) = run(resources(source, vec![], &counters), &config);

        assert_eq!(report.final_state, PipelineState::Faulted);
        assert_eq!(report.transient_failures, 4);
        assert_eq!(report.frames_delivered, 0);
    }

    #[test]
    fn test_success_resets_consecutive_failure_count() {
        let counters = Counters::default();
        let script = vec![
            Err(CaptureError::Timeout),
            Err(CaptureError::Timeout),
            Ok(()),
            Err(CaptureError::Timeout),
            Err(CaptureError::Timeout),
            Ok(()),
        ];
        let source = StubSource::new(script, WhenExhausted::EndOfStream, counters.clone());
        let config = PipelineConfig {
            max_consecutive_failures: 2,
            ..config()
        };
        let (report, _, _) = run(resources(source, vec![], &counters), &config);

        assert_eq!(report.final_state, PipelineState::Stopped);
        assert_eq!(report.frames_delivered, 2);
    }

    #[test]
    fn test_summary_reports_face_count() {
        let counters = Counters::default();
        let source = StubSource::frames(1, counters.clone());
        let faces = vec![Region::new(2, 2, 10, 10), Region::new(15, 15, 10, 10)];
        let (_, messages, _) = run(resources(source, faces, &counters), &config());

        let updates = frames(&messages);
        assert_eq!(updates[0].summary, "2 faces detected");
        assert_eq!(updates[0].face_count, 2);
    }

    #[test]
    fn test_nested_mode_delivers_translated_eye_ring() {
        let counters = Counters::default();
        let mut source = StubSource::frames(1, counters.clone());
        source.open(&DeviceSelector::Any).unwrap();
        let faces = StubDetector::new(vec![Region::new(4, 4, 24, 24)], counters.clone());
        // Reported in the face crop's coordinates: lands at (10, 10) in the frame.
        let eyes = StubDetector::new(vec![Region::new(6, 6, 8, 8)], counters.clone());
        let strategy = DetectionStrategy::nested(Box::new(faces), Box::new(eyes));
        let resources = PipelineResources::new(Box::new(source), strategy);

        let (report, messages, _) = run(resources, &config());

        assert_eq!(report.frames_delivered, 1);
        let update = frames(&messages)[0];
        assert_eq!(update.summary, "1 faces detected");
        assert_eq!(update.face_count, 1);
        // Eye center (14, 14), radius 4: ring passes 4 px right of center.
        assert_eq!(update.frame.pixel_rgb(18, 14), Some((0, 0, 255)));
        assert_eq!(update.frame.pixel_rgb(14, 14), Some((10, 10, 10)));
        // Face ellipse centered at (16, 16) with 12 px half-axes.
        assert_eq!(update.frame.pixel_rgb(16, 4), Some((255, 0, 255)));
        assert_eq!(Counters::get(&counters.releases), 2);
    }

    #[test]
    fn test_zero_faces_delivers_unmodified_frame() {
        let counters = Counters::default();
        let source = StubSource::frames(1, counters.clone());
        let (_, messages, _) = run(resources(source, vec![], &counters), &config());

        let update = frames(&messages)[0];
        assert_eq!(update.summary, "0 faces detected");
        assert!(update.frame.data().iter().all(|&b| b == 10));
    }

    #[test]
    fn test_cancel_before_first_cycle_reads_nothing() {
        let counters = Counters::default();
        let source = StubSource::endless(counters.clone());
        let res = resources(source, vec![], &counters);
        let (tx, rx) = crossbeam_channel::unbounded();
        let cancelled = AtomicBool::new(true);
        let state = StateCell::new(PipelineState::CancelRequested);

        let report = run_watch_loop(res, &config(), &tx, &cancelled, &state, &mut NullPipelineLogger);

        assert_eq!(report.final_state, PipelineState::Stopped);
        assert_eq!(report.cycles, 0);
        assert_eq!(Counters::get(&counters.reads), 0);
        assert_eq!(state.get(), PipelineState::Stopped);
        assert!(matches!(rx.try_iter().last(), Some(WatchMessage::Stopped)));
    }

    #[test]
    fn test_dropped_receiver_stops_the_loop() {
        let counters = Counters::default();
        let source = StubSource::endless(counters.clone());
        let res = resources(source, vec![], &counters);
        let (tx, rx) = crossbeam_channel::bounded(1);
        drop(rx);
        let cancelled = AtomicBool::new(false);
        let state = StateCell::new(PipelineState::Running);

        let report = run_watch_loop(res, &config(), &tx, &cancelled, &state, &mut NullPipelineLogger);

        assert_eq!(report.final_state, PipelineState::Stopped);
        assert_eq!(Counters::get(&counters.closes), 1);
    }

    #[test]
    fn test_max_frames_limits_the_run() {
        let counters = Counters::default();
        let source = StubSource::endless(counters.clone());
        let config = PipelineConfig {
            max_frames: Some(5),
            ..config()
        };
        let (report, messages, _) = run(resources(source, vec![], &counters), &config);

        assert_eq!(report.frames_delivered, 5);
        assert_eq!(frames(&messages).len(), 5);
        assert_eq!(report.final_state, PipelineState::Stopped);
    }

    #[test]
    fn test_stage_timings_reach_logger() {
        let counters = Counters::default();
        let res = resources(StubSource::frames(2, counters.clone()), vec![], &counters);
        let (tx, _rx) = crossbeam_channel::unbounded();
        let cancelled = AtomicBool::new(false);
        let state = StateCell::new(PipelineState::Running);
        let mut logger = StdoutPipelineLogger::new(1);

        run_watch_loop(res, &config(), &tx, &cancelled, &state, &mut logger);

        assert!(logger.timing_mean("capture").is_some());
        assert!(logger.timing_mean("detect").is_some());
        assert!(logger.timing_mean("annotate").is_some());
        assert_eq!(logger.metric_mean("faces"), Some(0.0));
    }

    #[test]
    fn test_resources_release_exactly_once() {
        let counters = Counters::default();
        let mut res = resources(StubSource::frames(0, counters.clone()), vec![], &counters);
        res.release();
        res.release();
        drop(res);
        assert_eq!(Counters::get(&counters.closes), 1);
        assert_eq!(Counters::get(&counters.releases), 1);
    }
}
