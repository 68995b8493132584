use opencv::core::{Mat, MatTraitConst, MatTraitConstManual};
use opencv::videoio::{self, VideoCapture, VideoCaptureTrait, VideoCaptureTraitConst};

use crate::capture::domain::capture_source::{CaptureError, CaptureSource, DeviceSelector};
use crate::shared::constants::MAX_DEVICE_PROBE;
use crate::shared::frame::{Frame, PixelFormat};

/// Captures frames through OpenCV's `VideoCapture` with backend auto-selection.
///
/// OpenCV already delivers 8-bit BGR, so frames are copied out without
/// conversion.
pub struct OpenCvCamera {
    capture: Option<VideoCapture>,
    name: String,
    frame_index: usize,
}

impl OpenCvCamera {
    pub fn new() -> Self {
        Self {
            capture: None,
            name: String::new(),
            frame_index: 0,
        }
    }

    fn try_open(selector: &DeviceSelector) -> opencv::Result<Option<(VideoCapture, String)>> {
        let attempts: Vec<(Option<i32>, String)> = match selector {
            DeviceSelector::Any => (0..MAX_DEVICE_PROBE)
                .map(|i| (Some(i as i32), format!("camera {i}")))
                .collect(),
            DeviceSelector::Index(i) => vec![(Some(*i as i32), format!("camera {i}"))],
            DeviceSelector::Path(p) => vec![(None, p.to_string_lossy().into_owned())],
        };

        for (index, name) in attempts {
            let capture = match index {
                Some(i) => VideoCapture::new(i, videoio::CAP_ANY)?,
                None => VideoCapture::from_file(&name, videoio::CAP_ANY)?,
            };
            if capture.is_opened()? {
                return Ok(Some((capture, name)));
            }
            log::debug!("OpenCV could not open {name}");
        }
        Ok(None)
    }
}

impl Default for OpenCvCamera {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureSource for OpenCvCamera {
    fn open(&mut self, selector: &DeviceSelector) -> Result<(), CaptureError> {
        match Self::try_open(selector) {
            Ok(Some((capture, name))) => {
                log::info!("Opened {name} via OpenCV");
                self.capture = Some(capture);
                self.name = name;
                self.frame_index = 0;
                Ok(())
            }
            Ok(None) => Err(CaptureError::unavailable(selector, "no device responded")),
            Err(e) => Err(CaptureError::unavailable(selector, e.to_string())),
        }
    }

    fn next_frame(&mut self) -> Result<Frame, CaptureError> {
        let capture = self
            .capture
            .as_mut()
            .ok_or_else(|| CaptureError::DeviceLost("camera is not open".into()))?;

        if !capture.is_opened().unwrap_or(false) {
            return Err(CaptureError::DeviceLost(format!("{} disconnected", self.name)));
        }

        let mut mat = Mat::default();
        let grabbed = capture
            .read(&mut mat)
            .map_err(|e| CaptureError::DeviceLost(e.to_string()))?;
        if !grabbed {
            return Err(CaptureError::Timeout);
        }
        if mat.empty() {
            return Err(CaptureError::EmptyFrame);
        }
        if mat.channels() != 3 {
            return Err(CaptureError::FrameDropped(format!(
                "expected 3 channels, got {}",
                mat.channels()
            )));
        }

        let width = mat.cols() as u32;
        let height = mat.rows() as u32;
        let data = if mat.is_continuous() {
            mat.data_bytes()
                .map_err(|e| CaptureError::FrameDropped(e.to_string()))?
                .to_vec()
        } else {
            let cloned = mat
                .try_clone()
                .map_err(|e| CaptureError::FrameDropped(e.to_string()))?;
            cloned
                .data_bytes()
                .map_err(|e| CaptureError::FrameDropped(e.to_string()))?
                .to_vec()
        };

        let frame = Frame::new(data, width, height, PixelFormat::Bgr, self.frame_index);
        self.frame_index += 1;
        Ok(frame)
    }

    fn close(&mut self) {
        if let Some(mut capture) = self.capture.take() {
            if let Err(e) = capture.release() {
                log::warn!("Releasing {} failed: {e}", self.name);
            } else {
                log::info!("Closed {}", self.name);
            }
        }
    }

    fn is_open(&self) -> bool {
        self.capture.is_some()
    }

    fn describe(&self) -> String {
        if self.capture.is_some() {
            format!("{} (OpenCV)", self.name)
        } else {
            "OpenCV camera (closed)".to_string()
        }
    }
}
