use std::path::PathBuf;

use thiserror::Error;

use crate::shared::frame::Frame;
use crate::shared::region::Region;

#[derive(Error, Debug)]
pub enum ModelLoadError {
    #[error("model file not found: {0}")]
    NotFound(PathBuf),
    #[error("model file {path} could not be loaded: {reason}")]
    Malformed { path: PathBuf, reason: String },
    #[error("model format of {path} is not supported by this build: {reason}")]
    UnsupportedFormat { path: PathBuf, reason: String },
    #[error("invalid detection parameters: {0}")]
    InvalidParams(String),
}

/// Domain interface for a trained multi-scale object detector.
///
/// Backends implement [`ObjectDetector::detect_frame`]; callers use
/// [`ObjectDetector::detect`], which adds sub-region search and keeps every
/// returned region inside the searched area. Detectors are driven by one
/// thread at a time, hence `&mut self` and `Send` without `Sync`.
pub trait ObjectDetector: Send {
    /// Runs the backend over the whole of `frame`. Coordinates are frame-local.
    fn detect_frame(&mut self, frame: &Frame) -> Result<Vec<Region>, Box<dyn std::error::Error>>;

    /// Identity of the loaded model, for logs and results.
    fn model_name(&self) -> &str;

    /// Drops backend resources. Called once when the pipeline finishes.
    fn release(&mut self) {}

    /// Detects objects in `frame`, or only inside `search_region` if given.
    ///
    /// With a search region the results are relative to that region's
    /// top-left corner. Backend failures are logged and produce no regions.
    fn detect(&mut self, frame: &Frame, search_region: Option<&Region>) -> Vec<Region> {
        let cropped;
        let target = match search_region {
            Some(region) => match frame.crop(region) {
                Some(sub) => {
                    cropped = sub;
                    &cropped
                }
                None => return Vec::new(),
            },
            None => frame,
        };

        match self.detect_frame(target) {
            Ok(regions) => regions
                .iter()
                .filter_map(|r| r.clip_to(target.width(), target.height()))
                .collect(),
            Err(e) => {
                log::warn!("{} detection failed: {e}", self.model_name());
                Vec::new()
            }
        }
    }
}
