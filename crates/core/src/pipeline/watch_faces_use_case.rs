use crate::capture::domain::capture_source::{CaptureSource, DeviceSelector};
use crate::pipeline::detection_strategy::DetectionStrategy;
use crate::pipeline::pipeline_executor::{PipelineConfig, PipelineExecutor, PipelineHandle};
use crate::pipeline::pipeline_logger::{NullPipelineLogger, PipelineLogger};
use crate::pipeline::pipeline_state::{PipelineError, PipelineState, StateCell};
use crate::pipeline::watch_loop::PipelineResources;

/// Wires a capture source and detectors into a live watch run.
///
/// Single-use: `start` consumes the owned components, so a second call
/// fails with [`PipelineError::AlreadyStarted`].
pub struct WatchFacesUseCase {
    source: Option<Box<dyn CaptureSource>>,
    strategy: Option<DetectionStrategy>,
    executor: Box<dyn PipelineExecutor>,
    selector: DeviceSelector,
    config: PipelineConfig,
    logger: Option<Box<dyn PipelineLogger>>,
    state: StateCell,
}

impl WatchFacesUseCase {
    pub fn new(
        source: Box<dyn CaptureSource>,
        strategy: DetectionStrategy,
        executor: Box<dyn PipelineExecutor>,
        selector: DeviceSelector,
        config: PipelineConfig,
        logger: Option<Box<dyn PipelineLogger>>,
    ) -> Self {
        Self {
            source: Some(source),
            strategy: Some(strategy),
            executor,
            selector,
            config,
            logger,
            state: StateCell::default(),
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state.get()
    }

    /// Opens the device and hands everything to the executor.
    ///
    /// If the device cannot be opened the run never starts, the state stays
    /// `Idle` and the detectors are released.
    pub fn start(&mut self) -> Result<PipelineHandle, PipelineError> {
        let source = self.source.take().ok_or(PipelineError::AlreadyStarted)?;
        let strategy = self.strategy.take().ok_or(PipelineError::AlreadyStarted)?;
        let mut resources = PipelineResources::new(source, strategy);

        if let Err(e) = resources.source_mut().open(&self.selector) {
            log::error!("Could not open capture device {}: {e}", self.selector);
            return Err(PipelineError::Unavailable(e));
        }
        log::info!("Watching {}", resources.source_mut().describe());

        let logger = self
            .logger
            .take()
            .unwrap_or_else(|| Box::new(NullPipelineLogger));
        self.executor
            .start(resources, self.config.clone(), logger, self.state.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use crate::capture::domain::capture_source::CaptureError;
    use crate::pipeline::infrastructure::threaded_pipeline_executor::ThreadedPipelineExecutor;
    use crate::pipeline::test_support::{Counters, StubDetector, StubSource, WhenExhausted};
    use crate::pipeline::watch_loop::WatchMessage;

    /// Records every state the run was seen in from the host side.
    fn observe_states(handle: &PipelineHandle) -> Arc<Mutex<Vec<PipelineState>>> {
        let seen = Arc::new(Mutex::new(vec![handle.state()]));
        for message in handle.messages().iter() {
            seen.lock().unwrap().push(handle.state());
            if matches!(message, WatchMessage::Stopped | WatchMessage::Faulted(_)) {
                break;
            }
        }
        seen
    }

    fn use_case(source: StubSource, counters: &Counters) -> WatchFacesUseCase {
        let strategy = DetectionStrategy::single(Box::new(StubDetector::new(vec![], counters.clone())));
        WatchFacesUseCase::new(
            Box::new(source),
            strategy,
            Box::new(ThreadedPipelineExecutor::new()),
            DeviceSelector::Index(0),
            PipelineConfig {
                interval: Duration::ZERO,
                ..Default::default()
            },
            None,
        )
    }

    #[test]
    fn test_unopenable_device_never_runs() {
        let counters = Counters::default();
        let mut uc = use_case(StubSource::unopenable(counters.clone()), &counters);

        let err = uc.start().err().unwrap();
        assert!(matches!(
            err,
            PipelineError::Unavailable(CaptureError::Unavailable { .. })
        ));
        assert_eq!(uc.state(), PipelineState::Idle);
        assert_eq!(Counters::get(&counters.reads), 0);
        assert_eq!(Counters::get(&counters.releases), 1);
    }

    #[test]
    fn test_transient_failures_never_fault_the_run() {
        let counters = Counters::default();
        let script = vec![
            Err(CaptureError::Timeout),
            Err(CaptureError::Timeout),
            Err(CaptureError::Timeout),
            Ok(()),
            Ok(()),
        ];
        let source = StubSource::new(script, WhenExhausted::EndOfStream, counters.clone());
        let mut uc = use_case(source, &counters);

        let handle = uc.start().unwrap();
        let seen = observe_states(&handle);
        let report = handle.wait();

        assert!(!seen.lock().unwrap().contains(&PipelineState::Faulted));
        assert_eq!(report.transient_failures, 3);
        assert_eq!(report.frames_delivered, 2);
        assert_eq!(report.final_state, PipelineState::Stopped);
    }

    #[test]
    fn test_second_start_is_rejected() {
        let counters = Counters::default();
        let mut uc = use_case(StubSource::frames(1, counters.clone()), &counters);

        let handle = uc.start().unwrap();
        assert!(matches!(uc.start(), Err(PipelineError::AlreadyStarted)));
        handle.wait();
    }

    #[test]
    fn test_open_is_attempted_once_with_selector() {
        let counters = Counters::default();
        let mut uc = use_case(StubSource::frames(0, counters.clone()), &counters);

        let report = uc.start().unwrap().wait();
        assert_eq!(Counters::get(&counters.opens), 1);
        assert_eq!(Counters::get(&counters.closes), 1);
        assert_eq!(report.final_state, PipelineState::Stopped);
        assert_eq!(uc.state(), PipelineState::Stopped);
    }
}
