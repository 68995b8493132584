use std::fs;
use std::io::Cursor;
use std::path::Path;

use crate::detection::domain::detection_params::DetectionParams;
use crate::detection::domain::object_detector::{ModelLoadError, ObjectDetector};
use crate::shared::frame::Frame;
use crate::shared::region::Region;

/// Smallest window the SeetaFace funnel cascade can evaluate.
const SEETA_MIN_WINDOW: u32 = 20;
const SCORE_THRESHOLD: f64 = 2.0;
const WINDOW_STEP: u32 = 4;
/// rustface rejects pyramid factors outside (0, 1).
const MAX_PYRAMID_FACTOR: f32 = 0.99;

/// Frontal face detector backed by the `rustface` crate (SeetaFace engine).
///
/// The engine merges overlapping windows internally, so `min_neighbors`
/// has no counterpart here.
pub struct SeetaFaceDetector {
    model: Option<rustface::Model>,
    name: String,
    params: DetectionParams,
}

impl SeetaFaceDetector {
    pub fn load(path: &Path, params: DetectionParams) -> Result<Self, ModelLoadError> {
        let bytes = fs::read(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ModelLoadError::NotFound(path.to_path_buf()),
            _ => ModelLoadError::Malformed {
                path: path.to_path_buf(),
                reason: e.to_string(),
            },
        })?;
        Self::from_bytes(&bytes, path, params)
    }

    fn from_bytes(bytes: &[u8], path: &Path, params: DetectionParams) -> Result<Self, ModelLoadError> {
        params.validate().map_err(ModelLoadError::InvalidParams)?;
        let model = rustface::read_model(Cursor::new(bytes)).map_err(|e| ModelLoadError::Malformed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        if params.min_neighbors > 0 {
            log::debug!(
                "SeetaFace merges candidate windows itself; min_neighbors={} is ignored",
                params.min_neighbors
            );
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        log::info!("Loaded SeetaFace model {name}");

        Ok(Self {
            model: Some(model),
            name,
            params,
        })
    }

    fn configure(&self, detector: &mut dyn rustface::Detector) {
        detector.set_min_face_size(min_face_size(&self.params));
        if let Some((max_w, max_h)) = self.params.max_size {
            detector.set_max_face_size(max_w.max(max_h).max(SEETA_MIN_WINDOW));
        }
        detector.set_pyramid_scale_factor(pyramid_factor(self.params.scale_factor));
        detector.set_score_thresh(SCORE_THRESHOLD);
        detector.set_slide_window_step(WINDOW_STEP, WINDOW_STEP);
    }
}

impl ObjectDetector for SeetaFaceDetector {
    fn detect_frame(&mut self, frame: &Frame) -> Result<Vec<Region>, Box<dyn std::error::Error>> {
        let model = self.model.as_ref().ok_or("detector has been released")?;
        if frame.width() < SEETA_MIN_WINDOW || frame.height() < SEETA_MIN_WINDOW {
            return Ok(Vec::new());
        }

        let mut detector = rustface::create_detector_with_model(model.clone());
        self.configure(detector.as_mut());

        let gray = frame.to_grayscale();
        let faces = detector.detect(&rustface::ImageData::new(&gray, frame.width(), frame.height()));

        Ok(faces
            .iter()
            .map(|face| {
                let bbox = face.bbox();
                Region::new(bbox.x(), bbox.y(), bbox.width() as i32, bbox.height() as i32)
            })
            .collect())
    }

    fn model_name(&self) -> &str {
        &self.name
    }

    fn release(&mut self) {
        if self.model.take().is_some() {
            log::debug!("Released SeetaFace model {}", self.name);
        }
    }
}

fn min_face_size(params: &DetectionParams) -> u32 {
    params.min_size.0.min(params.min_size.1).max(SEETA_MIN_WINDOW)
}

/// SeetaFace shrinks the image by this factor per level; cascades grow the
/// window by `scale_factor`, so the two are reciprocal.
fn pyramid_factor(scale_factor: f64) -> f32 {
    ((1.0 / scale_factor) as f32).min(MAX_PYRAMID_FACTOR)
}
