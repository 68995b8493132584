use std::path::Path;

use opencv::core::{Mat, Rect, Size, Vector};
use opencv::objdetect::{self, CascadeClassifier};
use opencv::prelude::*;

use crate::detection::domain::detection_params::DetectionParams;
use crate::detection::domain::object_detector::{ModelLoadError, ObjectDetector};
use crate::shared::frame::Frame;
use crate::shared::region::Region;

/// Haar/LBP cascade detector using OpenCV's `CascadeClassifier`.
pub struct CascadeClassifierDetector {
    classifier: Option<CascadeClassifier>,
    name: String,
    params: DetectionParams,
}

impl CascadeClassifierDetector {
    pub fn load(path: &Path, params: DetectionParams) -> Result<Self, ModelLoadError> {
        if !path.exists() {
            return Err(ModelLoadError::NotFound(path.to_path_buf()));
        }
        params.validate().map_err(ModelLoadError::InvalidParams)?;

        let malformed = |reason: String| ModelLoadError::Malformed {
            path: path.to_path_buf(),
            reason,
        };
        let path_str = path
            .to_str()
            .ok_or_else(|| malformed("path is not valid UTF-8".into()))?;
        let classifier = CascadeClassifier::new(path_str).map_err(|e| malformed(e.to_string()))?;
        if classifier.empty().map_err(|e| malformed(e.to_string()))? {
            return Err(malformed("classifier contains no stages".into()));
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path_str.to_string());
        log::info!("Loaded cascade {name}");

        Ok(Self {
            classifier: Some(classifier),
            name,
            params,
        })
    }
}

impl ObjectDetector for CascadeClassifierDetector {
    fn detect_frame(&mut self, frame: &Frame) -> Result<Vec<Region>, Box<dyn std::error::Error>> {
        let classifier = self
            .classifier
            .as_mut()
            .ok_or("detector has been released")?;

        let gray = frame.to_grayscale();
        let gray_mat = Mat::new_rows_cols_with_data(frame.height() as i32, frame.width() as i32, &gray)?;

        let min_size = Size::new(self.params.min_size.0 as i32, self.params.min_size.1 as i32);
        let max_size = self
            .params
            .max_size
            .map(|(w, h)| Size::new(w as i32, h as i32))
            .unwrap_or_default();

        let mut objects = Vector::<Rect>::new();
        classifier.detect_multi_scale(
            &*gray_mat,
            &mut objects,
            self.params.scale_factor,
            self.params.min_neighbors as i32,
            objdetect::CASCADE_SCALE_IMAGE,
            min_size,
            max_size,
        )?;

        Ok(objects
            .iter()
            .map(|r| Region::new(r.x, r.y, r.width, r.height))
            .collect())
    }

    fn model_name(&self) -> &str {
        &self.name
    }

    fn release(&mut self) {
        if self.classifier.take().is_some() {
            log::debug!("Released cascade {}", self.name);
        }
    }
}
