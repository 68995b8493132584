use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

use crate::shared::frame::Frame;

/// Which device a [`CaptureSource`] should open.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeviceSelector {
    /// First device that responds.
    Any,
    Index(u32),
    /// Device node or, for replay sources, a directory of images.
    Path(PathBuf),
}

impl FromStr for DeviceSelector {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("any") {
            return Ok(DeviceSelector::Any);
        }
        match trimmed.parse::<u32>() {
            Ok(index) => Ok(DeviceSelector::Index(index)),
            Err(_) => Ok(DeviceSelector::Path(PathBuf::from(trimmed))),
        }
    }
}

impl fmt::Display for DeviceSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceSelector::Any => write!(f, "any"),
            DeviceSelector::Index(i) => write!(f, "{i}"),
            DeviceSelector::Path(p) => write!(f, "{}", p.display()),
        }
    }
}

/// How the pipeline should react to a failed capture.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureSeverity {
    /// Skip this cycle and try again after the usual pause.
    Transient,
    /// The source is gone; the run cannot continue.
    Terminal,
}

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("capture device {selector} is unavailable: {reason}")]
    Unavailable { selector: String, reason: String },
    #[error("timed out waiting for a frame")]
    Timeout,
    #[error("device returned an empty frame")]
    EmptyFrame,
    #[error("frame dropped: {0}")]
    FrameDropped(String),
    #[error("capture device lost: {0}")]
    DeviceLost(String),
    #[error("capture source has no more frames")]
    EndOfStream,
}

impl CaptureError {
    pub fn unavailable(selector: &DeviceSelector, reason: impl Into<String>) -> Self {
        CaptureError::Unavailable {
            selector: selector.to_string(),
            reason: reason.into(),
        }
    }

    pub fn severity(&self) -> FailureSeverity {
        match self {
            CaptureError::Timeout | CaptureError::EmptyFrame | CaptureError::FrameDropped(_) => {
                FailureSeverity::Transient
            }
            CaptureError::Unavailable { .. }
            | CaptureError::DeviceLost(_)
            | CaptureError::EndOfStream => FailureSeverity::Terminal,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.severity() == FailureSeverity::Transient
    }
}

/// A camera-like source of frames.
///
/// The pipeline owns the source exclusively while running, hence `&mut self`
/// and `Send` without `Sync`.
pub trait CaptureSource: Send {
    /// Acquires the device. Holds it until [`CaptureSource::close`].
    fn open(&mut self, selector: &DeviceSelector) -> Result<(), CaptureError>;

    /// Blocks until the next frame is available, in capture order.
    fn next_frame(&mut self) -> Result<Frame, CaptureError>;

    /// Releases the device. Must be idempotent and safe on a never-opened source.
    fn close(&mut self);

    fn is_open(&self) -> bool;

    /// Human-readable name of the opened device, for logs.
    fn describe(&self) -> String;
}
