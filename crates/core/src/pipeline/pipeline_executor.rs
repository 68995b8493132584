use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::Receiver;

use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::pipeline::pipeline_state::{PipelineError, PipelineState, StateCell};
use crate::pipeline::watch_loop::{PipelineReport, PipelineResources, WatchMessage};
use crate::shared::constants::{
    DEFAULT_CYCLE_INTERVAL_MS, DEFAULT_HANDOFF_CAPACITY, DEFAULT_MAX_CONSECUTIVE_FAILURES,
};

const JOIN_POLL: Duration = Duration::from_millis(10);

/// Scheduling knobs for a watch run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Pause after every cycle, including skipped ones.
    pub interval: Duration,
    /// Transient capture failures tolerated in a row before the run faults.
    pub max_consecutive_failures: u32,
    /// Frames that may wait for the presentation side before the producer blocks.
    pub handoff_capacity: usize,
    /// Stop after this many delivered frames.
    pub max_frames: Option<usize>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(DEFAULT_CYCLE_INTERVAL_MS),
            max_consecutive_failures: DEFAULT_MAX_CONSECUTIVE_FAILURES,
            handoff_capacity: DEFAULT_HANDOFF_CAPACITY,
            max_frames: None,
        }
    }
}

/// Abstracts where the watch loop runs.
///
/// This is a port: infrastructure decides the threading, callers only see
/// the returned [`PipelineHandle`].
pub trait PipelineExecutor: Send {
    /// Starts the loop over already-opened resources. `state` must read
    /// [`PipelineState::Running`] once this returns `Ok`.
    fn start(
        &self,
        resources: PipelineResources,
        config: PipelineConfig,
        logger: Box<dyn PipelineLogger>,
        state: StateCell,
    ) -> Result<PipelineHandle, PipelineError>;
}

/// Requests cancellation of a run from any thread.
#[derive(Clone, Debug)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    state: StateCell,
}

impl CancelToken {
    pub fn new(flag: Arc<AtomicBool>, state: StateCell) -> Self {
        Self { flag, state }
    }

    /// Asks the loop to stop at its next cycle boundary. Safe to call repeatedly.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
        self.state
            .transition(PipelineState::Running, PipelineState::CancelRequested);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Host-side view of a running pipeline.
///
/// Dropping the handle cancels the run and waits for the producer.
pub struct PipelineHandle {
    messages: Receiver<WatchMessage>,
    token: CancelToken,
    worker: Option<JoinHandle<PipelineReport>>,
}

impl PipelineHandle {
    pub fn new(
        messages: Receiver<WatchMessage>,
        token: CancelToken,
        worker: JoinHandle<PipelineReport>,
    ) -> Self {
        Self {
            messages,
            token,
            worker: Some(worker),
        }
    }

    pub fn messages(&self) -> &Receiver<WatchMessage> {
        &self.messages
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.token.clone()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn state(&self) -> PipelineState {
        self.token.state.get()
    }

    /// Waits for the run to end on its own.
    pub fn wait(mut self) -> PipelineReport {
        self.join()
    }

    /// Cancels, then waits for the in-flight cycle to finish.
    pub fn shutdown(mut self) -> PipelineReport {
        self.token.cancel();
        self.join()
    }

    /// Discards undelivered messages while waiting so a producer blocked on
    /// a full hand-off can always finish.
    fn join(&mut self) -> PipelineReport {
        let Some(worker) = self.worker.take() else {
            return PipelineReport::faulted("pipeline already joined");
        };
        while !worker.is_finished() {
            let _ = self.messages.recv_timeout(JOIN_POLL);
        }
        match worker.join() {
            Ok(report) => report,
            Err(_) => {
                log::error!("Producer thread panicked");
                self.token.state.set(PipelineState::Faulted);
                PipelineReport::faulted("producer thread panicked")
            }
        }
    }
}

impl Drop for PipelineHandle {
    fn drop(&mut self) {
        if self.worker.is_some() {
            self.token.cancel();
            self.join();
        }
    }
}
