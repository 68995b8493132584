use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use thiserror::Error;

use crate::capture::domain::capture_source::CaptureError;
use crate::detection::domain::object_detector::ModelLoadError;

/// Lifecycle of a watch run. Only the loop moves between states; callers
/// can start a run and request cancellation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Running,
    CancelRequested,
    Stopped,
    Faulted,
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Stopped | PipelineState::Faulted)
    }

    fn to_u8(self) -> u8 {
        match self {
            PipelineState::Idle => 0,
            PipelineState::Running => 1,
            PipelineState::CancelRequested => 2,
            PipelineState::Stopped => 3,
            PipelineState::Faulted => 4,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => PipelineState::Running,
            2 => PipelineState::CancelRequested,
            3 => PipelineState::Stopped,
            4 => PipelineState::Faulted,
            _ => PipelineState::Idle,
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Idle => "idle",
            PipelineState::Running => "running",
            PipelineState::CancelRequested => "cancel requested",
            PipelineState::Stopped => "stopped",
            PipelineState::Faulted => "faulted",
        };
        f.write_str(name)
    }
}

/// Pipeline state shared between the producer and whoever holds the handle.
#[derive(Clone, Debug)]
pub struct StateCell(Arc<AtomicU8>);

impl StateCell {
    pub fn new(state: PipelineState) -> Self {
        Self(Arc::new(AtomicU8::new(state.to_u8())))
    }

    pub fn get(&self) -> PipelineState {
        PipelineState::from_u8(self.0.load(Ordering::SeqCst))
    }

    pub fn set(&self, state: PipelineState) {
        self.0.store(state.to_u8(), Ordering::SeqCst);
    }

    /// Moves `from` to `to` only if the current state is still `from`.
    pub fn transition(&self, from: PipelineState, to: PipelineState) -> bool {
        self.0
            .compare_exchange(from.to_u8(), to.to_u8(), Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new(PipelineState::Idle)
    }
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Unavailable(#[from] CaptureError),
    #[error(transparent)]
    ModelLoad(#[from] ModelLoadError),
    #[error("pipeline already started")]
    AlreadyStarted,
    #[error("failed to spawn producer thread: {0}")]
    Spawn(#[source] std::io::Error),
}
