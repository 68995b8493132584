use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::pipeline::pipeline_executor::{
    CancelToken, PipelineConfig, PipelineExecutor, PipelineHandle,
};
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::pipeline::pipeline_state::{PipelineError, PipelineState, StateCell};
use crate::pipeline::watch_loop::{run_watch_loop, PipelineResources, WatchMessage};

const PRODUCER_THREAD_NAME: &str = "facewatch-producer";

/// Runs the watch loop on a dedicated producer thread.
///
/// Layout: `producer [capture → detect → annotate] → bounded hand-off → host`
///
/// The host drains the hand-off from its own thread, so nothing the
/// presentation side owns is touched by the producer.
pub struct ThreadedPipelineExecutor;

impl ThreadedPipelineExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ThreadedPipelineExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineExecutor for ThreadedPipelineExecutor {
    fn start(
        &self,
        resources: PipelineResources,
        config: PipelineConfig,
        mut logger: Box<dyn PipelineLogger>,
        state: StateCell,
    ) -> Result<PipelineHandle, PipelineError> {
        let (tx, rx) = crossbeam_channel::bounded::<WatchMessage>(config.handoff_capacity.max(1));
        let cancelled = Arc::new(AtomicBool::new(false));
        let token = CancelToken::new(cancelled.clone(), state.clone());

        state.set(PipelineState::Running);
        let producer_state = state.clone();
        let spawned = std::thread::Builder::new()
            .name(PRODUCER_THREAD_NAME.to_string())
            .spawn(move || {
                run_watch_loop(
                    resources,
                    &config,
                    &tx,
                    &cancelled,
                    &producer_state,
                    logger.as_mut(),
                )
            });

        match spawned {
            Ok(worker) => Ok(PipelineHandle::new(rx, token, worker)),
            Err(e) => {
                state.set(PipelineState::Faulted);
                Err(PipelineError::Spawn(e))
            }
        }
    }
}
